//! Named style definitions and the per-viewport pen/brush cache.
//!
//! The cache is created with the viewport and handed to the render
//! pipeline. Style changes go through [`StyleCache::apply`], which drops
//! exactly the cached entries the change can affect.

use crate::canvas::{Brush, Pen};
use dv_core::{Color, StyleKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapStyle {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    /// Name of a color style.
    pub color: String,
    pub width: f64,
    #[serde(default)]
    pub dashed: bool,
    #[serde(default)]
    pub cap: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillStyle {
    /// Name of a color style.
    pub color: String,
    /// Second color style for a vertical gradient.
    #[serde(default)]
    pub gradient_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterStyle {
    pub font_family: String,
    pub size: f64,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParagraphStyle {
    pub alignment: Alignment,
    pub padding: i32,
}

/// A set of named styles shapes refer to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Design {
    pub colors: HashMap<String, Color>,
    pub caps: HashMap<String, CapStyle>,
    pub lines: HashMap<String, LineStyle>,
    pub fills: HashMap<String, FillStyle>,
    pub characters: HashMap<String, CharacterStyle>,
    pub paragraphs: HashMap<String, ParagraphStyle>,
}

/// One style definition, tagged by family.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleChange {
    Color(String, Color),
    Cap(String, CapStyle),
    Line(String, LineStyle),
    Fill(String, FillStyle),
    Character(String, CharacterStyle),
    Paragraph(String, ParagraphStyle),
}

impl StyleChange {
    pub fn kind(&self) -> StyleKind {
        match self {
            StyleChange::Color(..) => StyleKind::Color,
            StyleChange::Cap(..) => StyleKind::Cap,
            StyleChange::Line(..) => StyleKind::Line,
            StyleChange::Fill(..) => StyleKind::Fill,
            StyleChange::Character(..) => StyleKind::Character,
            StyleChange::Paragraph(..) => StyleKind::Paragraph,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StyleChange::Color(n, _)
            | StyleChange::Cap(n, _)
            | StyleChange::Line(n, _)
            | StyleChange::Fill(n, _)
            | StyleChange::Character(n, _)
            | StyleChange::Paragraph(n, _) => n,
        }
    }
}

pub const DEFAULT_LINE_COLOR: Color = Color::BLACK;
pub const DEFAULT_FILL_COLOR: Color = Color::rgb(0xFA, 0xFA, 0xFA);

#[derive(Debug, Default)]
pub struct StyleCache {
    design: Design,
    pens: HashMap<String, Pen>,
    brushes: HashMap<String, Brush>,
    misses: usize,
}

impl StyleCache {
    pub fn new(design: Design) -> Self {
        Self {
            design,
            ..Self::default()
        }
    }

    pub fn design(&self) -> &Design {
        &self.design
    }

    /// Replace the whole design and drop everything cached.
    pub fn set_design(&mut self, design: Design) {
        self.design = design;
        self.clear();
    }

    pub fn clear(&mut self) {
        self.pens.clear();
        self.brushes.clear();
    }

    /// Number of pens/brushes built since creation.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Update one style definition and invalidate what depends on it.
    /// Returns the family that changed.
    pub fn apply(&mut self, change: StyleChange) -> StyleKind {
        let kind = change.kind();
        let name = change.name().to_string();
        match change {
            StyleChange::Color(n, c) => {
                self.design.colors.insert(n, c);
            }
            StyleChange::Cap(n, c) => {
                self.design.caps.insert(n, c);
            }
            StyleChange::Line(n, l) => {
                self.design.lines.insert(n, l);
            }
            StyleChange::Fill(n, f) => {
                self.design.fills.insert(n, f);
            }
            StyleChange::Character(n, c) => {
                self.design.characters.insert(n, c);
            }
            StyleChange::Paragraph(n, p) => {
                self.design.paragraphs.insert(n, p);
            }
        }
        self.invalidate(kind, &name);
        kind
    }

    /// Drop cached pens/brushes affected by a change to style `name`.
    pub fn invalidate(&mut self, kind: StyleKind, name: &str) {
        match kind {
            // Colors and caps are shared by reference; anything may use them.
            StyleKind::Color => self.clear(),
            StyleKind::Cap => self.pens.clear(),
            StyleKind::Line => {
                self.pens.remove(name);
            }
            StyleKind::Fill => {
                self.brushes.remove(name);
            }
            // Text is not rendered through pens or brushes.
            StyleKind::Character | StyleKind::Paragraph => {}
        }
        log::debug!("style cache invalidated for {kind:?} `{name}`");
    }

    fn color(&self, name: &str, fallback: Color) -> Color {
        self.design.colors.get(name).copied().unwrap_or(fallback)
    }

    /// Pen for a line style; unknown names get a 1-unit black pen.
    pub fn pen(&mut self, name: Option<&str>) -> Pen {
        let Some(name) = name else {
            return Pen::solid(DEFAULT_LINE_COLOR, 1.0);
        };
        if let Some(pen) = self.pens.get(name) {
            return *pen;
        }
        self.misses += 1;
        let pen = match self.design.lines.get(name) {
            Some(line) => Pen {
                color: self.color(&line.color, DEFAULT_LINE_COLOR),
                width: line.width,
                dashed: line.dashed,
            },
            None => Pen::solid(DEFAULT_LINE_COLOR, 1.0),
        };
        self.pens.insert(name.to_string(), pen);
        pen
    }

    /// Brush for a fill style; unknown names get the default fill.
    pub fn brush(&mut self, name: Option<&str>) -> Brush {
        let Some(name) = name else {
            return Brush::Solid(DEFAULT_FILL_COLOR);
        };
        if let Some(brush) = self.brushes.get(name) {
            return *brush;
        }
        self.misses += 1;
        let brush = match self.design.fills.get(name) {
            Some(fill) => {
                let top = self.color(&fill.color, DEFAULT_FILL_COLOR);
                match &fill.gradient_to {
                    Some(to) => Brush::VerticalGradient {
                        top,
                        bottom: self.color(to, top),
                    },
                    None => Brush::Solid(top),
                }
            }
            None => Brush::Solid(DEFAULT_FILL_COLOR),
        };
        self.brushes.insert(name.to_string(), brush);
        brush
    }

    pub fn cap(&self, line: &str) -> CapStyle {
        self.design
            .lines
            .get(line)
            .and_then(|l| l.cap.as_deref())
            .and_then(|c| self.design.caps.get(c))
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn design() -> Design {
        let mut d = Design::default();
        d.colors.insert("ink".into(), Color::rgb(10, 20, 30));
        d.colors.insert("paper".into(), Color::WHITE);
        d.lines.insert(
            "thin".into(),
            LineStyle {
                color: "ink".into(),
                width: 1.5,
                dashed: false,
                cap: None,
            },
        );
        d.fills.insert(
            "plain".into(),
            FillStyle {
                color: "paper".into(),
                gradient_to: None,
            },
        );
        d
    }

    #[test]
    fn pens_are_cached_until_their_style_changes() {
        let mut cache = StyleCache::new(design());
        let pen = cache.pen(Some("thin"));
        assert_eq!(pen, Pen::solid(Color::rgb(10, 20, 30), 1.5));
        cache.pen(Some("thin"));
        assert_eq!(cache.misses(), 1);

        cache.apply(StyleChange::Line(
            "thin".into(),
            LineStyle {
                color: "ink".into(),
                width: 3.0,
                dashed: true,
                cap: None,
            },
        ));
        assert_eq!(cache.pen(Some("thin")), Pen::dashed(Color::rgb(10, 20, 30), 3.0));
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn color_change_drops_dependent_brushes() {
        let mut cache = StyleCache::new(design());
        assert_eq!(cache.brush(Some("plain")), Brush::Solid(Color::WHITE));
        cache.apply(StyleChange::Color("paper".into(), Color::rgb(1, 1, 1)));
        assert_eq!(cache.brush(Some("plain")), Brush::Solid(Color::rgb(1, 1, 1)));
    }

    #[test]
    fn design_loads_from_json() {
        let json = r#"{
            "colors": { "ink": { "r": 0, "g": 0, "b": 0, "a": 255 } },
            "caps": { "round": "round" },
            "lines": { "thin": { "color": "ink", "width": 1.0, "cap": "round" } }
        }"#;
        let design: Design = serde_json::from_str(json).unwrap();
        let cache = StyleCache::new(design);
        assert_eq!(cache.cap("thin"), CapStyle::Round);
        assert_eq!(cache.cap("missing"), CapStyle::Butt);
    }
}
