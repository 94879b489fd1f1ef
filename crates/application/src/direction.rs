//! Reading direction and scroll axis to physical sign mapping.

use pagewise_core::{ReadingDirection, ScrollDirection};

/// Logical scroll step relative to reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOffset {
    Backward,
    Forward,
}

/// Logical page/chapter step relative to reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionOffset {
    Previous,
    Next,
}

/// Physical side of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSide {
    Left,
    Right,
}

impl From<ScrollOffset> for DirectionOffset {
    fn from(offset: ScrollOffset) -> Self {
        match offset {
            ScrollOffset::Backward => DirectionOffset::Previous,
            ScrollOffset::Forward => DirectionOffset::Next,
        }
    }
}

/// Returns `if_ltr` under left-to-right reading and `if_rtl` under the mirrored direction.
pub fn option_for_direction<T>(if_ltr: T, if_rtl: T, direction: ReadingDirection) -> T {
    match direction {
        ReadingDirection::Ltr => if_ltr,
        ReadingDirection::Rtl => if_rtl,
    }
}

/// Physical sign (+1 towards right/bottom, -1 towards left/top) of a logical scroll step.
///
/// Vertical scrolling does not depend on the reading direction; `XY` behaves as `Y`.
pub fn scroll_sign(
    scroll_direction: ScrollDirection,
    offset: ScrollOffset,
    direction: ReadingDirection,
) -> i32 {
    let forward = match offset {
        ScrollOffset::Backward => -1,
        ScrollOffset::Forward => 1,
    };
    match scroll_direction {
        ScrollDirection::X => option_for_direction(forward, -forward, direction),
        ScrollDirection::Y | ScrollDirection::XY => forward,
    }
}

pub fn offset_for_side(side: PageSide, direction: ReadingDirection) -> DirectionOffset {
    match side {
        PageSide::Left => {
            option_for_direction(DirectionOffset::Previous, DirectionOffset::Next, direction)
        }
        PageSide::Right => {
            option_for_direction(DirectionOffset::Next, DirectionOffset::Previous, direction)
        }
    }
}
