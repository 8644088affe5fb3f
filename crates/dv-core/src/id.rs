use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::sync::LazyLock;

/// Global string interner for shape IDs. Cheap to compare and copy.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for shapes in a diagram.
/// Internally a `Spur` index (4 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(Spur);

impl ShapeId {
    /// Intern a new string as a ShapeId, or return existing if already interned.
    pub fn intern(s: &str) -> Self {
        ShapeId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Generate a unique ID with a type prefix (e.g. `box_1`, `polyline_2`).
    /// Used for pasted copies and tool-created shapes.
    pub fn with_prefix(prefix: &str) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        loop {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{prefix}_{n}");
            // Skip names a caller already interned explicitly.
            if INTERNER.get(&candidate).is_none() {
                return Self::intern(&candidate);
            }
        }
    }
}

impl fmt::Debug for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl Serialize for ShapeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ShapeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ShapeId::intern(&s))
    }
}

// ─── Layers ──────────────────────────────────────────────────────────────

/// Identifier of a diagram layer. `LayerId::NONE` (0) means "no layer".
///
/// Ids `1..=32` are *combinable*: they have a bit in [`LayerIds`] and may be
/// used as supplemental layers. Higher ids can only be a shape's home layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u32);

impl LayerId {
    pub const NONE: LayerId = LayerId(0);
    pub const MAX_COMBINABLE: u32 = 32;

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn is_combinable(self) -> bool {
        (1..=Self::MAX_COMBINABLE).contains(&self.0)
    }

    /// The bitmask for this layer, or empty if it is not combinable.
    pub fn as_bits(self) -> LayerIds {
        if self.is_combinable() {
            LayerIds(1 << (self.0 - 1))
        } else {
            LayerIds::NONE
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer:{}", self.0)
    }
}

/// Bitmask of combinable (supplemental) layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LayerIds(pub u32);

impl LayerIds {
    pub const NONE: LayerIds = LayerIds(0);
    pub const ALL: LayerIds = LayerIds(u32::MAX);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, layer: LayerId) -> bool {
        !(self & layer.as_bits()).is_empty()
    }

    pub fn intersects(self, other: LayerIds) -> bool {
        !(self & other).is_empty()
    }

    /// Iterate the layer ids whose bit is set, lowest first.
    pub fn iter(self) -> impl Iterator<Item = LayerId> + Clone {
        (1..=LayerId::MAX_COMBINABLE)
            .map(LayerId)
            .filter(move |l| self.contains(*l))
    }
}

impl BitOr for LayerIds {
    type Output = LayerIds;
    fn bitor(self, rhs: LayerIds) -> LayerIds {
        LayerIds(self.0 | rhs.0)
    }
}

impl BitOrAssign for LayerIds {
    fn bitor_assign(&mut self, rhs: LayerIds) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LayerIds {
    type Output = LayerIds;
    fn bitand(self, rhs: LayerIds) -> LayerIds {
        LayerIds(self.0 & rhs.0)
    }
}

impl Not for LayerIds {
    type Output = LayerIds;
    fn not(self) -> LayerIds {
        LayerIds(!self.0)
    }
}

impl FromIterator<LayerId> for LayerIds {
    fn from_iter<I: IntoIterator<Item = LayerId>>(iter: I) -> Self {
        iter.into_iter()
            .fold(LayerIds::NONE, |acc, l| acc | l.as_bits())
    }
}

// ─── Control points ──────────────────────────────────────────────────────

/// Identifier of a control point within one shape.
///
/// Real control points are numbered from 1. `REFERENCE` stands for the
/// shape as a whole (a glue point attached to the outline rather than to a
/// specific point). `ANY` is a query wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlPointId(pub i32);

impl ControlPointId {
    pub const ANY: ControlPointId = ControlPointId(0);
    pub const REFERENCE: ControlPointId = ControlPointId(-1);

    pub fn is_reference(self) -> bool {
        self == Self::REFERENCE
    }
}

impl fmt::Display for ControlPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::REFERENCE => f.write_str("reference"),
            Self::ANY => f.write_str("any"),
            ControlPointId(n) => write!(f, "cp{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = ShapeId::intern("connector");
        let b = ShapeId::intern("connector");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "connector");
    }

    #[test]
    fn prefixed_ids_are_unique() {
        let a = ShapeId::with_prefix("box");
        let b = ShapeId::with_prefix("box");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("box_"));
    }

    #[test]
    fn combinable_layers_map_to_bits() {
        assert_eq!(LayerId(1).as_bits(), LayerIds(0b1));
        assert_eq!(LayerId(5).as_bits(), LayerIds(0b1_0000));
        assert_eq!(LayerId(33).as_bits(), LayerIds::NONE);
        assert_eq!(LayerId::NONE.as_bits(), LayerIds::NONE);
    }

    #[test]
    fn layer_mask_iterates_set_bits() {
        let mask: LayerIds = [LayerId(2), LayerId(7)].into_iter().collect();
        let ids: Vec<LayerId> = mask.iter().collect();
        assert_eq!(ids, vec![LayerId(2), LayerId(7)]);
        assert!(mask.contains(LayerId(7)));
        assert!(!mask.contains(LayerId(3)));
    }
}
