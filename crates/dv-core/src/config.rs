//! Viewport configuration.
//!
//! Every field has a default, so a partial JSON document is a valid
//! configuration. Call [`ViewportConfig::validate`] after loading.

use crate::error::CoreError;
use crate::model::Color;
use crate::transform::MAX_ZOOM_LEVEL;
use serde::{Deserialize, Serialize};

/// Fill for the area outside the diagram sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Background {
    Solid { color: Color },
    /// Vertical two-stop gradient, `top` to `bottom`.
    Gradient { top: Color, bottom: Color },
}

impl Default for Background {
    fn default() -> Self {
        Self::Gradient {
            top: Color::rgb(0xF0, 0xF0, 0xF0),
            bottom: Color::rgb(0xC8, 0xC8, 0xD2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Zoom level in percent on first show.
    pub zoom_level: u32,
    /// Grid spacing in diagram units.
    pub grid_size: i32,
    pub show_grid: bool,
    pub snap_to_grid: bool,
    /// Snap when a coordinate is within this many diagram units of a
    /// grid line.
    pub snap_distance: i32,
    /// Grip radius in pixels.
    pub grip_size: i32,
    /// Extra pixels around invalidated shapes to cover grips.
    pub handle_margin: i32,
    /// Diagram units added around the shapes' bounds for scrolling.
    pub scroll_area_margin: i32,
    /// Pixels from the edge that trigger auto-scroll during a drag.
    pub auto_scroll_margin: i32,
    /// Diagram units scrolled per auto-scroll tick.
    pub auto_scroll_step: i32,
    /// Timer interval for auto and universal scrolling.
    pub scroll_interval_ms: u64,
    /// Pixels around the universal-scroll origin that do not scroll.
    pub universal_scroll_dead_zone: i32,
    /// Divisor applied to the pointer offset per universal-scroll tick.
    pub universal_scroll_speed: i32,
    /// Grid lines closer than this many pixels are thinned out.
    pub min_grid_spacing_px: i32,
    /// Draw resize grips over connection points when both coincide.
    pub resize_grip_priority: bool,
    pub background: Background,
    pub sheet_color: Color,
    pub grid_color: Color,
    pub selection_color: Color,
    pub outline_color: Color,
    pub grip_color: Color,
    pub highlight_color: Color,
    pub inactive_color: Color,
    pub connection_color: Color,
    /// Previews above this many pixels need user confirmation.
    pub max_preview_pixels: u64,
    /// Zoom step in percent for zoom in/out.
    pub zoom_step: u32,
    pub undo_depth: usize,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            zoom_level: 100,
            grid_size: 20,
            show_grid: true,
            snap_to_grid: true,
            snap_distance: 5,
            grip_size: 3,
            handle_margin: 3,
            scroll_area_margin: 40,
            auto_scroll_margin: 16,
            auto_scroll_step: 10,
            scroll_interval_ms: 50,
            universal_scroll_dead_zone: 8,
            universal_scroll_speed: 4,
            min_grid_spacing_px: 6,
            resize_grip_priority: true,
            background: Background::default(),
            sheet_color: Color::WHITE,
            grid_color: Color::rgba(0x80, 0x80, 0x80, 0x60),
            selection_color: Color::rgb(0x1E, 0x6F, 0xD9),
            outline_color: Color::rgb(0x1E, 0x6F, 0xD9),
            grip_color: Color::WHITE,
            highlight_color: Color::rgb(0xFF, 0xA5, 0x00),
            inactive_color: Color::rgb(0xA0, 0xA0, 0xA0),
            connection_color: Color::rgb(0x2E, 0xB8, 0x4E),
            max_preview_pixels: 64_000_000,
            zoom_step: 25,
            undo_depth: 256,
        }
    }
}

impl ViewportConfig {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.zoom_level > MAX_ZOOM_LEVEL {
            return Err(CoreError::OutOfRange {
                name: "zoom_level",
                value: self.zoom_level.into(),
                min: 0,
                max: MAX_ZOOM_LEVEL.into(),
            });
        }
        positive("grid_size", self.grid_size)?;
        positive("grip_size", self.grip_size)?;
        positive("universal_scroll_speed", self.universal_scroll_speed)?;
        non_negative("snap_distance", self.snap_distance)?;
        non_negative("handle_margin", self.handle_margin)?;
        non_negative("scroll_area_margin", self.scroll_area_margin)?;
        non_negative("auto_scroll_margin", self.auto_scroll_margin)?;
        non_negative("auto_scroll_step", self.auto_scroll_step)?;
        non_negative("universal_scroll_dead_zone", self.universal_scroll_dead_zone)?;
        non_negative("min_grid_spacing_px", self.min_grid_spacing_px)?;
        if self.undo_depth == 0 {
            return Err(CoreError::NonPositive {
                name: "undo_depth",
                value: 0,
            });
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: i32) -> Result<(), CoreError> {
    if value <= 0 {
        return Err(CoreError::NonPositive {
            name,
            value: value.into(),
        });
    }
    Ok(())
}

fn non_negative(name: &'static str, value: i32) -> Result<(), CoreError> {
    if value < 0 {
        return Err(CoreError::OutOfRange {
            name,
            value: value.into(),
            min: 0,
            max: i32::MAX.into(),
        });
    }
    Ok(())
}
