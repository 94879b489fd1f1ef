//! Tap position to navigation region.

use pagewise_core::{ReadingDirection, TapZoneLayout};

use crate::direction::{DirectionOffset, PageSide, offset_for_side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapZoneRegionType {
    Previous,
    Next,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhysicalRegion {
    Side(PageSide),
    Menu,
}

/// Region hit by a tap at normalized viewport coordinates (`0.0..=1.0`).
pub fn region_at(
    layout: TapZoneLayout,
    x: f32,
    y: f32,
    invert: bool,
    direction: ReadingDirection,
) -> TapZoneRegionType {
    let column = third(x);
    let row = third(y);
    let physical = match layout {
        TapZoneLayout::LeftRight => match column {
            0 => PhysicalRegion::Side(PageSide::Left),
            1 => PhysicalRegion::Menu,
            _ => PhysicalRegion::Side(PageSide::Right),
        },
        TapZoneLayout::Kindle => match (row, column) {
            (0, _) => PhysicalRegion::Menu,
            (_, 0) => PhysicalRegion::Side(PageSide::Left),
            _ => PhysicalRegion::Side(PageSide::Right),
        },
        TapZoneLayout::LShaped => match (row, column) {
            (1, 1) => PhysicalRegion::Menu,
            (0, _) | (1, 0) => PhysicalRegion::Side(PageSide::Left),
            _ => PhysicalRegion::Side(PageSide::Right),
        },
    };

    match physical {
        PhysicalRegion::Menu => TapZoneRegionType::Menu,
        PhysicalRegion::Side(side) => {
            let side = if invert { opposite(side) } else { side };
            match offset_for_side(side, direction) {
                DirectionOffset::Previous => TapZoneRegionType::Previous,
                DirectionOffset::Next => TapZoneRegionType::Next,
            }
        }
    }
}

fn third(value: f32) -> u8 {
    let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    if value < 1.0 / 3.0 {
        0
    } else if value < 2.0 / 3.0 {
        1
    } else {
        2
    }
}

fn opposite(side: PageSide) -> PageSide {
    match side {
        PageSide::Left => PageSide::Right,
        PageSide::Right => PageSide::Left,
    }
}
