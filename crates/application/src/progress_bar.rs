//! Pointer coordinates on the progress track to page indices and back.

use pagewise_core::{Page, ReadingDirection};

use crate::direction::option_for_direction;
use crate::layout::page_position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOrientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackBounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl TrackBounds {
    fn fraction(&self, pointer: PointerPosition, orientation: TrackOrientation) -> f32 {
        let (offset, length) = match orientation {
            TrackOrientation::Horizontal => (pointer.x - self.left, self.width),
            TrackOrientation::Vertical => (pointer.y - self.top, self.height),
        };
        if length <= 0.0 || !offset.is_finite() {
            return 0.0;
        }
        (offset / length).clamp(0.0, 1.0)
    }
}

/// Fraction along the track in reading order. Horizontal tracks run right to left under RTL.
fn reading_fraction(
    physical: f32,
    orientation: TrackOrientation,
    direction: ReadingDirection,
) -> f32 {
    match orientation {
        TrackOrientation::Horizontal => option_for_direction(physical, 1.0 - physical, direction),
        TrackOrientation::Vertical => physical,
    }
}

/// Raw page index under the pointer, or `None` for an empty chapter.
///
/// Unless `full_segment_clicks` is set, the half of a double page segment
/// that was hit decides between its primary and secondary image.
pub fn page_for_pointer(
    pointer: PointerPosition,
    track: &TrackBounds,
    pages: &[Page],
    orientation: TrackOrientation,
    full_segment_clicks: bool,
    direction: ReadingDirection,
) -> Option<usize> {
    if pages.is_empty() {
        return None;
    }
    let fraction = reading_fraction(track.fraction(pointer, orientation), orientation, direction);
    let scaled = fraction * pages.len() as f32;
    let position = (scaled.floor() as usize).min(pages.len() - 1);
    let page = &pages[position];

    if full_segment_clicks {
        return Some(page.primary.index);
    }
    match &page.secondary {
        Some(secondary) if scaled - position as f32 >= 0.5 => Some(secondary.index),
        _ => Some(page.primary.index),
    }
}

pub fn index_from_page(page: &Page) -> usize {
    page.last_index()
}

/// Normalized physical centre of the segment holding `raw_index`.
pub fn position_for_page(
    pages: &[Page],
    raw_index: usize,
    orientation: TrackOrientation,
    direction: ReadingDirection,
) -> Option<f32> {
    let position = page_position(pages, raw_index)?;
    let centre = (position as f32 + 0.5) / pages.len() as f32;
    Some(reading_fraction(centre, orientation, direction))
}

/// Fraction of the chapter read once the page holding `raw_index` is shown.
pub fn progress_for_page(pages: &[Page], raw_index: usize) -> f32 {
    match page_position(pages, raw_index) {
        Some(position) => (position + 1) as f32 / pages.len() as f32,
        None => 0.0,
    }
}
