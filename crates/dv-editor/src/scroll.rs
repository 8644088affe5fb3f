//! Timer-driven scrolling.
//!
//! Auto-scroll runs while a tool drags near the viewport edge. Universal
//! scroll runs while the middle button is held: the pointer's offset from
//! where it was pressed sets direction and speed. Both advance only on
//! [`ScrollTimers::tick`], which the host calls every
//! `scroll_interval_ms`.

use dv_core::{Point, Rect};

/// Universal-scroll direction, shown as the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Center,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl ScrollDirection {
    /// Direction of the offset `(dx, dy)`; `Center` inside the dead zone.
    pub fn of(dx: i32, dy: i32, dead_zone: i32) -> Self {
        let h = if dx > dead_zone {
            1
        } else if dx < -dead_zone {
            -1
        } else {
            0
        };
        let v = if dy > dead_zone {
            1
        } else if dy < -dead_zone {
            -1
        } else {
            0
        };
        match (h, v) {
            (0, -1) => Self::North,
            (1, -1) => Self::NorthEast,
            (1, 0) => Self::East,
            (1, 1) => Self::SouthEast,
            (0, 1) => Self::South,
            (-1, 1) => Self::SouthWest,
            (-1, 0) => Self::West,
            (-1, -1) => Self::NorthWest,
            _ => Self::Center,
        }
    }
}

/// Scroll step for a pointer at viewport position `at`, or `None` when
/// it is not within `margin` pixels of an edge of `bounds`.
pub fn auto_scroll_delta(at: Point, bounds: Rect, margin: i32, step: i32) -> Option<(i32, i32)> {
    let axis = |p: i32, lo: i32, hi: i32| {
        if p < lo + margin {
            -step
        } else if p > hi - margin {
            step
        } else {
            0
        }
    };
    let dx = axis(at.x, bounds.left(), bounds.right());
    let dy = axis(at.y, bounds.top(), bounds.bottom());
    (dx != 0 || dy != 0).then_some((dx, dy))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AutoScroll {
    delta: (i32, i32),
    pointer: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UniversalScroll {
    origin: Point,
    current: Point,
}

/// One timer step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTick {
    /// Scroll by diagram units, then replay a move at `pointer` so the
    /// active drag follows.
    Auto { dx: i32, dy: i32, pointer: Point },
    /// Scroll by viewport pixels.
    Universal { dx: i32, dy: i32 },
}

#[derive(Debug, Default)]
pub struct ScrollTimers {
    auto: Option<AutoScroll>,
    universal: Option<UniversalScroll>,
    detached: bool,
}

impl ScrollTimers {
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn is_running(&self) -> bool {
        self.auto.is_some() || self.universal.is_some()
    }

    pub fn is_auto_scrolling(&self) -> bool {
        self.auto.is_some()
    }

    pub fn is_universal_scrolling(&self) -> bool {
        self.universal.is_some()
    }

    pub fn start_auto(&mut self, delta: (i32, i32), pointer: Point) {
        if self.detached {
            return;
        }
        if self.auto.is_none() {
            log::debug!("auto-scroll started {delta:?}");
        }
        self.auto = Some(AutoScroll { delta, pointer });
    }

    pub fn stop_auto(&mut self) {
        if self.auto.take().is_some() {
            log::debug!("auto-scroll stopped");
        }
    }

    pub fn start_universal(&mut self, origin: Point) {
        if self.detached {
            return;
        }
        self.universal = Some(UniversalScroll {
            origin,
            current: origin,
        });
    }

    pub fn update_universal(&mut self, at: Point) {
        if let Some(u) = self.universal.as_mut() {
            u.current = at;
        }
    }

    pub fn stop_universal(&mut self) {
        self.universal = None;
    }

    /// Cursor direction of a running universal scroll.
    pub fn universal_direction(&self, dead_zone: i32) -> Option<ScrollDirection> {
        self.universal.map(|u| {
            ScrollDirection::of(u.current.x - u.origin.x, u.current.y - u.origin.y, dead_zone)
        })
    }

    /// Stop everything and ignore further ticks until [`attach`](Self::attach).
    pub fn detach(&mut self) {
        self.auto = None;
        self.universal = None;
        self.detached = true;
    }

    pub fn attach(&mut self) {
        self.detached = false;
    }

    /// Advance the timers by one interval.
    pub fn tick(&self, dead_zone: i32, speed: i32) -> Vec<ScrollTick> {
        if self.detached {
            return Vec::new();
        }
        let mut out = Vec::new();
        if let Some(a) = self.auto {
            out.push(ScrollTick::Auto {
                dx: a.delta.0,
                dy: a.delta.1,
                pointer: a.pointer,
            });
        }
        if let Some(u) = self.universal {
            let speed = speed.max(1);
            let step = |offset: i32| {
                if offset.abs() <= dead_zone {
                    0
                } else {
                    (offset - offset.signum() * dead_zone) / speed
                }
            };
            let dx = step(u.current.x - u.origin.x);
            let dy = step(u.current.y - u.origin.y);
            if dx != 0 || dy != 0 {
                out.push(ScrollTick::Universal { dx, dy });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn edge_margin_triggers_auto_scroll() {
        let bounds = Rect::new(0, 0, 400, 300);
        assert_eq!(auto_scroll_delta(Point::new(200, 150), bounds, 16, 10), None);
        assert_eq!(
            auto_scroll_delta(Point::new(395, 5), bounds, 16, 10),
            Some((10, -10))
        );
    }

    #[test]
    fn universal_scroll_respects_dead_zone() {
        let mut timers = ScrollTimers::default();
        timers.start_universal(Point::new(100, 100));
        timers.update_universal(Point::new(105, 96));
        assert!(timers.tick(8, 4).is_empty());
        assert_eq!(timers.universal_direction(8), Some(ScrollDirection::Center));

        timers.update_universal(Point::new(140, 100));
        assert_eq!(timers.tick(8, 4), vec![ScrollTick::Universal { dx: 8, dy: 0 }]);
        assert_eq!(timers.universal_direction(8), Some(ScrollDirection::East));
    }

    #[test]
    fn detached_timers_never_fire() {
        let mut timers = ScrollTimers::default();
        timers.start_auto((0, 10), Point::new(1, 1));
        timers.detach();
        assert!(timers.tick(8, 4).is_empty());
        timers.start_auto((0, 10), Point::new(1, 1));
        assert!(!timers.is_running());
    }
}
