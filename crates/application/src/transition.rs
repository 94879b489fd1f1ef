//! Chapter resolution and the consistency check guarding chapter transitions.

use std::collections::BTreeSet;

use log::debug;
use pagewise_core::{Chapter, ChapterId, ReaderSettings};

use crate::direction::DirectionOffset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterTarget {
    Previous,
    Next,
    Id(ChapterId),
}

impl From<DirectionOffset> for ChapterTarget {
    fn from(offset: DirectionOffset) -> Self {
        match offset {
            DirectionOffset::Previous => ChapterTarget::Previous,
            DirectionOffset::Next => ChapterTarget::Next,
        }
    }
}

/// Where a freshly opened chapter starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    FirstUnread,
    LastPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
}

/// A resolved chapter transition that has not been applied yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransition {
    pub from: ChapterId,
    pub target: ChapterId,
    pub resume: ResumeMode,
    pub confirmation: Option<ConfirmationRequest>,
}

impl PendingTransition {
    pub fn needs_confirmation(&self) -> bool {
        self.confirmation.is_some()
    }
}

/// Resolves `target` relative to `current` in a list sorted by source order.
pub fn resolve_chapter<'a>(
    chapters: &'a [Chapter],
    current: &Chapter,
    target: ChapterTarget,
    skip_duplicates: bool,
) -> Option<&'a Chapter> {
    let neighbours: Vec<&Chapter> = match target {
        ChapterTarget::Id(id) => return chapters.iter().find(|chapter| chapter.id == id),
        ChapterTarget::Next => chapters
            .iter()
            .filter(|chapter| chapter.source_order > current.source_order)
            .collect(),
        ChapterTarget::Previous => chapters
            .iter()
            .rev()
            .filter(|chapter| chapter.source_order < current.source_order)
            .collect(),
    };

    if !skip_duplicates {
        return neighbours.first().copied();
    }

    let first = neighbours
        .iter()
        .copied()
        .find(|chapter| !same_number(chapter, current))?;
    let same_scanlator = neighbours
        .iter()
        .copied()
        .filter(|chapter| same_number(chapter, first))
        .find(|chapter| chapter.scanlator == current.scanlator);
    Some(same_scanlator.unwrap_or(first))
}

fn same_number(a: &Chapter, b: &Chapter) -> bool {
    a.chapter_number >= 0.0 && a.chapter_number == b.chapter_number
}

/// Count of whole chapter numbers strictly between `a` and `b` that no known chapter carries.
pub fn chapter_gap(chapters: &[Chapter], a: &Chapter, b: &Chapter) -> u32 {
    if a.chapter_number < 0.0 || b.chapter_number < 0.0 {
        return 0;
    }
    let low = a.chapter_number.min(b.chapter_number).floor() as i64;
    let high = a.chapter_number.max(b.chapter_number).floor() as i64;
    if high - low <= 1 {
        return 0;
    }
    let present: BTreeSet<i64> = chapters
        .iter()
        .filter(|chapter| chapter.chapter_number >= 0.0)
        .map(|chapter| chapter.chapter_number.floor() as i64)
        .filter(|number| *number > low && *number < high)
        .collect();
    let missing = (high - low - 1) - present.len() as i64;
    u32::try_from(missing).unwrap_or(u32::MAX)
}

/// Builds the confirmation needed before moving from `current` to `target`, if any.
pub fn check_consistency(
    chapters: &[Chapter],
    current: &Chapter,
    target: &Chapter,
    settings: &ReaderSettings,
) -> Option<ConfirmationRequest> {
    let gap = if settings.warn_on_chapter_gap {
        chapter_gap(chapters, current, target)
    } else {
        0
    };
    let scanlator_changed =
        settings.warn_on_scanlator_change && current.scanlator != target.scanlator;

    let mut reasons = Vec::new();
    if gap > 0 {
        let noun = if gap == 1 { "chapter is" } else { "chapters are" };
        reasons.push(format!(
            "{gap} {noun} missing between chapter {} and chapter {}.",
            current.chapter_number, target.chapter_number
        ));
    }
    if scanlator_changed {
        reasons.push(format!(
            "Chapter {} is from {} instead of {}.",
            target.chapter_number,
            scanlator_label(target),
            scanlator_label(current)
        ));
    }

    let title = match (gap > 0, scanlator_changed) {
        (false, false) => return None,
        (true, false) => "Missing chapters",
        (false, true) => "Different scanlator",
        (true, true) => "Continue reading?",
    };
    debug!(
        "transition check: chapter {} -> {} gap={gap} scanlator_changed={scanlator_changed}",
        current.id, target.id
    );
    Some(ConfirmationRequest {
        title: title.to_string(),
        message: reasons.join("\n"),
        confirm_label: "Continue".to_string(),
    })
}

fn scanlator_label(chapter: &Chapter) -> &str {
    chapter.scanlator.as_deref().unwrap_or("an unknown scanlator")
}

/// Resolves a transition without applying it. `None` when there is nowhere to go.
pub fn plan_transition(
    chapters: &[Chapter],
    current: &Chapter,
    target: ChapterTarget,
    do_transition_check: bool,
    settings: &ReaderSettings,
) -> Option<PendingTransition> {
    let resolved = resolve_chapter(chapters, current, target, settings.skip_duplicate_chapters)?;
    if resolved.id == current.id {
        return None;
    }
    let resume = match target {
        ChapterTarget::Previous => ResumeMode::LastPage,
        ChapterTarget::Next | ChapterTarget::Id(_) => ResumeMode::FirstUnread,
    };
    let confirmation = if do_transition_check {
        check_consistency(chapters, current, resolved, settings)
    } else {
        None
    };
    Some(PendingTransition {
        from: current.id,
        target: resolved.id,
        resume,
        confirmation,
    })
}
