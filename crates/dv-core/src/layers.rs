//! Layer visibility and activation.
//!
//! A shape belongs to at most one home layer and any number of
//! supplemental (combinable) layers. It is drawn when *any* of its layers
//! is visible; shapes without layers are always drawn.

use crate::id::{LayerId, LayerIds};
use crate::model::Layer;
use std::collections::BTreeSet;

/// Hidden/active layer state owned by one viewport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerVisibility {
    hidden: BTreeSet<LayerId>,
    active_home: Option<LayerId>,
    active_supplemental: LayerIds,
}

impl LayerVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bitmask of hidden combinable layers.
    fn hidden_mask(&self) -> LayerIds {
        self.hidden.iter().copied().collect()
    }

    pub fn is_layer_hidden(&self, layer: LayerId) -> bool {
        self.hidden.contains(&layer)
    }

    pub fn hidden_layers(&self) -> impl Iterator<Item = LayerId> + Clone + '_ {
        self.hidden.iter().copied()
    }

    /// Visibility of a layer assignment, ignoring zoom thresholds.
    pub fn is_visible(&self, home: LayerId, supplemental: LayerIds) -> bool {
        if home.is_none() && supplemental.is_empty() {
            return true;
        }
        let home_visible = !home.is_none() && !self.hidden.contains(&home);
        home_visible || supplemental.intersects(!self.hidden_mask())
    }

    /// Layers of `layers` that are drawn at `zoom_level`: not hidden and
    /// within the layer's zoom thresholds. The sequence is lazy and can be
    /// cloned to enumerate it again.
    pub fn visible_layer_ids<'a>(
        &'a self,
        layers: &'a [Layer],
        zoom_level: u32,
    ) -> impl Iterator<Item = LayerId> + Clone + 'a {
        layers
            .iter()
            .filter(move |l| !self.hidden.contains(&l.id) && l.shown_at(zoom_level))
            .map(|l| l.id)
    }

    /// Resolve the per-frame visibility snapshot.
    pub fn resolve(&self, layers: &[Layer], zoom_level: u32) -> VisibleLayers {
        let mut excluded: BTreeSet<LayerId> = self.hidden.clone();
        excluded.extend(
            layers
                .iter()
                .filter(|l| !l.shown_at(zoom_level))
                .map(|l| l.id),
        );
        let excluded_mask = excluded.iter().copied().collect();
        VisibleLayers {
            ids: self.visible_layer_ids(layers, zoom_level).collect(),
            excluded,
            excluded_mask,
        }
    }

    /// Hide or show layers. Returns true if anything changed.
    pub fn set_visibility<I>(&mut self, layers: I, visible: bool) -> bool
    where
        I: IntoIterator<Item = LayerId>,
    {
        let mut changed = false;
        for layer in layers {
            changed |= if visible {
                self.hidden.remove(&layer)
            } else {
                self.hidden.insert(layer)
            };
        }
        changed
    }

    /// Activate or deactivate layers for newly created shapes.
    ///
    /// Combinable layers accumulate in the supplemental mask. Only one
    /// non-combinable (home) layer can be active; the last one in `layers`
    /// wins.
    pub fn set_active<I>(&mut self, layers: I, active: bool) -> bool
    where
        I: IntoIterator<Item = LayerId>,
    {
        let before = (self.active_home, self.active_supplemental);
        let mut home = None;
        for layer in layers {
            if layer.is_none() {
                continue;
            }
            if layer.is_combinable() {
                if active {
                    self.active_supplemental |= layer.as_bits();
                } else {
                    self.active_supplemental = self.active_supplemental & !layer.as_bits();
                }
            } else {
                home = Some(layer);
            }
        }
        if let Some(home) = home {
            if active {
                self.active_home = Some(home);
            } else if self.active_home == Some(home) {
                self.active_home = None;
            }
        }
        before != (self.active_home, self.active_supplemental)
    }

    pub fn active_home_layer(&self) -> Option<LayerId> {
        self.active_home
    }

    pub fn active_supplemental_layers(&self) -> LayerIds {
        self.active_supplemental
    }

    pub fn is_layer_active(&self, layer: LayerId) -> bool {
        self.active_home == Some(layer) || self.active_supplemental.contains(layer)
    }

    /// Layer assignment for a shape created right now.
    pub fn active_assignment(&self) -> (LayerId, LayerIds) {
        (
            self.active_home.unwrap_or(LayerId::NONE),
            self.active_supplemental,
        )
    }
}

/// Visible layers resolved once for a frame or a pruning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleLayers {
    ids: Vec<LayerId>,
    excluded: BTreeSet<LayerId>,
    excluded_mask: LayerIds,
}

impl VisibleLayers {
    /// Everything visible; used when no layer state applies.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[LayerId] {
        &self.ids
    }

    /// Whether a shape with this assignment is drawn. Layers missing from
    /// the diagram's layer table have no zoom gate.
    pub fn shows(&self, home: LayerId, supplemental: LayerIds) -> bool {
        if home.is_none() && supplemental.is_empty() {
            return true;
        }
        let home_visible = !home.is_none() && !self.excluded.contains(&home);
        home_visible || supplemental.intersects(!self.excluded_mask)
    }
}
