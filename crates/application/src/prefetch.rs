//! Decides which chapters to download ahead and which neighbour to materialize.

use std::collections::HashSet;

use log::debug;
use pagewise_core::{Chapter, ChapterId, ReaderSettings, VisibleChaptersWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEdge {
    Leading,
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Materialization {
    pub chapter_id: ChapterId,
    pub edge: WindowEdge,
    pub window: VisibleChaptersWindow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchPlan {
    pub downloads: Vec<ChapterId>,
    pub materialize: Option<Materialization>,
}

impl PrefetchPlan {
    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty() && self.materialize.is_none()
    }
}

/// Snapshot handed to the coordinator on every page index change.
#[derive(Debug, Clone, Copy)]
pub struct PrefetchContext<'a> {
    pub current: &'a Chapter,
    /// Neighbours in source order. Duplicates are not skipped here since every chapter
    /// inside the window range gets materialized.
    pub previous: Option<&'a Chapter>,
    pub next: Option<&'a Chapter>,
    /// Chapters following the current one, in reading order.
    pub next_chapters: &'a [Chapter],
    pub page_index: usize,
    pub page_count: usize,
    pub window: VisibleChaptersWindow,
    pub settings: &'a ReaderSettings,
}

impl PrefetchContext<'_> {
    fn remaining_pages(&self) -> usize {
        self.page_count
            .saturating_sub(1)
            .saturating_sub(self.page_index)
    }
}

/// Remembers which downloads were already requested so repeated page changes stay quiet.
#[derive(Debug, Default)]
pub struct PrefetchCoordinator {
    requested_downloads: HashSet<ChapterId>,
}

impl PrefetchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&mut self, ctx: &PrefetchContext<'_>) -> PrefetchPlan {
        let plan = PrefetchPlan {
            downloads: self.plan_downloads(ctx),
            materialize: plan_materialization(ctx),
        };
        if !plan.is_empty() {
            debug!(
                "prefetch: chapter={} page={}/{} downloads={:?} materialize={:?}",
                ctx.current.id,
                ctx.page_index + 1,
                ctx.page_count,
                plan.downloads,
                plan.materialize
            );
        }
        plan
    }

    pub fn forget(&mut self, chapter_id: ChapterId) {
        self.requested_downloads.remove(&chapter_id);
    }

    fn plan_downloads(&mut self, ctx: &PrefetchContext<'_>) -> Vec<ChapterId> {
        let limit = ctx.settings.download_ahead_limit;
        if limit == 0 || ctx.page_count == 0 {
            return Vec::new();
        }
        if ctx.remaining_pages() > ctx.settings.download_ahead_threshold {
            return Vec::new();
        }
        let mut downloads = Vec::new();
        for chapter in ctx.next_chapters.iter().take(limit) {
            if chapter.is_downloaded || !self.requested_downloads.insert(chapter.id) {
                continue;
            }
            downloads.push(chapter.id);
        }
        downloads
    }
}

/// Extends the window by one neighbour when the reader nears a chapter edge.
fn plan_materialization(ctx: &PrefetchContext<'_>) -> Option<Materialization> {
    if !ctx.settings.reading_mode.is_continuous() || ctx.page_count == 0 {
        return None;
    }
    let edge_pages = ctx.settings.preload_edge_pages;

    if ctx.remaining_pages() < edge_pages
        && let Some(next) = ctx.next
        && !ctx.window.contains(next.source_order)
    {
        return Some(Materialization {
            chapter_id: next.id,
            edge: WindowEdge::Trailing,
            window: ctx.window.extended_to(next.source_order),
        });
    }

    if ctx.page_index < edge_pages
        && let Some(previous) = ctx.previous
        && !ctx.window.contains(previous.source_order)
    {
        return Some(Materialization {
            chapter_id: previous.id,
            edge: WindowEdge::Leading,
            window: ctx.window.extended_to(previous.source_order),
        });
    }
    None
}
