//! Navigation state machine: current page, transition pages and chapter crossing.

use std::collections::HashMap;

use log::{debug, info, warn};
use pagewise_core::{
    Chapter, ChapterId, Page, RawPage, ReaderSettings, ScrollDirection, TransitionPageMode,
    VisibleChaptersWindow,
};

use crate::NavigationError;
use crate::direction::{DirectionOffset, PageSide, ScrollOffset, offset_for_side, scroll_sign};
use crate::layout::{
    PageLayoutMode, compute_pages, is_spread_page, page_position, page_urls, raw_page_count,
};
use crate::prefetch::{PrefetchContext, PrefetchCoordinator};
use crate::progress_bar::index_from_page;
use crate::tap_zone::{TapZoneRegionType, region_at};
use crate::transition::{
    ChapterTarget, ConfirmationRequest, PendingTransition, ResumeMode, plan_transition,
};

pub const READ_STATE_DEBOUNCE_MS: u64 = 1_000;

const EDGE_TOLERANCE_PX: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTarget {
    Index(usize),
    Previous,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPhase {
    Idle,
    AtBoundary(DirectionOffset),
    TransitionVisible(DirectionOffset),
    CrossingChapter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadStateWrite {
    pub chapter_id: ChapterId,
    pub last_page_read: u32,
}

/// Work the controller asks its surroundings to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    LoadChapterPages { chapter_id: ChapterId },
    RequestConfirmation(ConfirmationRequest),
    PersistReadState(ReadStateWrite),
    EnqueueDownload(ChapterId),
    ScrollBy { dx: f32, dy: f32 },
    ToggleMenu,
}

/// Pages of the active chapter. `current_page_index` addresses raw pages, not `pages`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagesState {
    pub pages: Vec<Page>,
    pub current_page_index: usize,
    pub transition_page_mode: TransitionPageMode,
}

impl PagesState {
    pub fn page_count(&self) -> usize {
        raw_page_count(&self.pages)
    }

    pub fn current_position(&self) -> Option<usize> {
        page_position(&self.pages, self.current_page_index)
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.current_position().map(|position| &self.pages[position])
    }
}

/// Scroll container geometry; positions are measured from the left/top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    pub scroll_left: f32,
    pub scroll_top: f32,
    pub scroll_width: f32,
    pub scroll_height: f32,
    pub client_width: f32,
    pub client_height: f32,
}

impl ViewportMetrics {
    fn is_at_edge(&self, axis: ScrollDirection, sign: i32) -> bool {
        let (position, content, client) = match axis {
            ScrollDirection::X => (self.scroll_left, self.scroll_width, self.client_width),
            ScrollDirection::Y | ScrollDirection::XY => {
                (self.scroll_top, self.scroll_height, self.client_height)
            }
        };
        if sign < 0 {
            position <= EDGE_TOLERANCE_PX
        } else {
            position + client >= content - EDGE_TOLERANCE_PX
        }
    }
}

#[derive(Debug, Clone)]
struct PendingWrite {
    write: ReadStateWrite,
    due_at_ms: u64,
}

#[derive(Debug, Clone)]
struct ChapterLayout {
    urls: Vec<String>,
    spread_flags: Vec<bool>,
    pages: Vec<Page>,
}

impl ChapterLayout {
    fn new(raw_pages: &[RawPage], settings: &ReaderSettings) -> Self {
        let urls = page_urls(raw_pages);
        let spread_flags = vec![false; urls.len()];
        let mut layout = Self {
            urls,
            spread_flags,
            pages: Vec::new(),
        };
        layout.relayout(settings);
        layout
    }

    fn relayout(&mut self, settings: &ReaderSettings) {
        let mode = if settings.reading_mode.is_double_page() {
            PageLayoutMode::Double
        } else {
            PageLayoutMode::Single
        };
        self.pages = compute_pages(
            &self.urls,
            &self.spread_flags,
            mode,
            settings.offset_double_spreads,
            settings.reading_direction,
        );
    }
}

#[derive(Debug)]
pub struct NavigationController {
    settings: ReaderSettings,
    /// Sorted by source order.
    chapters: Vec<Chapter>,
    current: usize,
    pages: PagesState,
    layouts: HashMap<ChapterId, ChapterLayout>,
    window: VisibleChaptersWindow,
    phase: NavigationPhase,
    pending_transition: Option<PendingTransition>,
    pending_resume: Option<ResumeMode>,
    pending_write: Option<PendingWrite>,
    prefetch: PrefetchCoordinator,
}

impl NavigationController {
    /// Opens `chapter_id`; its pages arrive later through [`Self::load_chapter_pages`].
    pub fn open(
        mut settings: ReaderSettings,
        mut chapters: Vec<Chapter>,
        chapter_id: ChapterId,
    ) -> Result<(Self, Vec<Effect>), NavigationError> {
        settings.normalize();
        chapters.sort_by_key(|chapter| chapter.source_order);
        let current = chapters
            .iter()
            .position(|chapter| chapter.id == chapter_id)
            .ok_or(NavigationError::ChapterNotFound(chapter_id))?;
        info!("reader: open chapter {chapter_id}");

        let controller = Self {
            window: VisibleChaptersWindow::single(chapters[current].source_order),
            settings,
            chapters,
            current,
            pages: PagesState::default(),
            layouts: HashMap::new(),
            phase: NavigationPhase::CrossingChapter,
            pending_transition: None,
            pending_resume: Some(ResumeMode::FirstUnread),
            pending_write: None,
            prefetch: PrefetchCoordinator::new(),
        };
        Ok((controller, vec![Effect::LoadChapterPages { chapter_id }]))
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn current_chapter(&self) -> &Chapter {
        &self.chapters[self.current]
    }

    pub fn pages(&self) -> &PagesState {
        &self.pages
    }

    pub fn window(&self) -> VisibleChaptersWindow {
        self.window
    }

    pub fn phase(&self) -> NavigationPhase {
        self.phase
    }

    pub fn pending_transition(&self) -> Option<&PendingTransition> {
        self.pending_transition.as_ref()
    }

    pub fn pending_write(&self) -> Option<&ReadStateWrite> {
        self.pending_write.as_ref().map(|pending| &pending.write)
    }

    pub fn next_write_due_at(&self) -> Option<u64> {
        self.pending_write.as_ref().map(|pending| pending.due_at_ms)
    }

    /// Laid out pages of any loaded chapter, including materialized neighbours.
    pub fn chapter_pages(&self, chapter_id: ChapterId) -> Option<&[Page]> {
        self.layouts
            .get(&chapter_id)
            .map(|layout| layout.pages.as_slice())
    }

    /// Replaces the chapter list. Ignored when the active chapter is missing from it.
    pub fn set_chapters(&mut self, mut chapters: Vec<Chapter>) -> bool {
        chapters.sort_by_key(|chapter| chapter.source_order);
        let current_id = self.current_chapter().id;
        let Some(current) = chapters.iter().position(|chapter| chapter.id == current_id) else {
            warn!("reader: chapter list no longer contains active chapter {current_id}");
            return false;
        };
        self.chapters = chapters;
        self.current = current;
        let chapters = &self.chapters;
        self.layouts
            .retain(|id, _| chapters.iter().any(|chapter| chapter.id == *id));
        true
    }

    pub fn update_settings(&mut self, mut settings: ReaderSettings) {
        settings.normalize();
        self.settings = settings;
        for layout in self.layouts.values_mut() {
            layout.relayout(&self.settings);
        }
        if let Some(layout) = self.layouts.get(&self.chapters[self.current].id) {
            self.pages.pages = layout.pages.clone();
        }
        if !self.settings.show_transition_page || self.settings.reading_mode.is_continuous() {
            self.pages.transition_page_mode = TransitionPageMode::None;
        }
        self.refresh_phase();
    }

    pub fn load_chapter_pages(
        &mut self,
        chapter_id: ChapterId,
        raw_pages: Vec<RawPage>,
    ) -> Vec<Effect> {
        let Some(position) = self.chapters.iter().position(|c| c.id == chapter_id) else {
            debug!("reader: pages for unknown chapter {chapter_id} ignored");
            return Vec::new();
        };
        let mut layout = ChapterLayout::new(&raw_pages, &self.settings);
        if let Some(existing) = self.layouts.get(&chapter_id)
            && existing.urls == layout.urls
        {
            layout.spread_flags = existing.spread_flags.clone();
            layout.relayout(&self.settings);
        }
        debug!(
            "reader: chapter {chapter_id} loaded with {} images in {} pages",
            layout.urls.len(),
            layout.pages.len()
        );
        self.chapters[position].page_count = u32::try_from(layout.urls.len()).unwrap_or(u32::MAX);
        let pages = layout.pages.clone();
        self.layouts.insert(chapter_id, layout);

        if position != self.current {
            return Vec::new();
        }
        self.pages.pages = pages;
        let page_count = self.pages.page_count();
        match self.pending_resume.take() {
            Some(mode) => {
                self.pages.current_page_index =
                    resume_index(&self.chapters[self.current], mode, page_count);
                self.pages.transition_page_mode = TransitionPageMode::None;
                self.refresh_phase();
                debug!(
                    "nav: resume chapter {chapter_id} at page {} ({mode:?})",
                    self.pages.current_page_index + 1
                );
                self.run_prefetch()
            }
            None => {
                self.pages.current_page_index = self
                    .pages
                    .current_page_index
                    .min(page_count.saturating_sub(1));
                self.refresh_phase();
                Vec::new()
            }
        }
    }

    /// Records the size of a loaded image; a newly detected spread re-runs the layout.
    pub fn set_page_dimensions(
        &mut self,
        chapter_id: ChapterId,
        index: usize,
        width: u32,
        height: u32,
    ) -> bool {
        let spread = is_spread_page(width, height);
        let active = self.chapters[self.current].id == chapter_id;
        let Some(layout) = self.layouts.get_mut(&chapter_id) else {
            return false;
        };
        let Some(flag) = layout.spread_flags.get_mut(index) else {
            return false;
        };
        if *flag == spread {
            return false;
        }
        *flag = spread;
        layout.relayout(&self.settings);
        debug!("layout: chapter {chapter_id} page {} spread={spread}", index + 1);
        if active {
            self.pages.pages = layout.pages.clone();
            self.refresh_phase();
        }
        true
    }

    pub fn open_page(&mut self, target: PageTarget, now_ms: u64) -> Vec<Effect> {
        match target {
            PageTarget::Index(index) => {
                if index >= self.pages.page_count() {
                    debug!("nav: page {index} out of range ignored");
                    return Vec::new();
                }
                self.pages.transition_page_mode = TransitionPageMode::None;
                if index == self.pages.current_page_index {
                    self.refresh_phase();
                    return Vec::new();
                }
                self.apply_page_index(index, true, false, now_ms)
            }
            PageTarget::Previous => self.step(DirectionOffset::Previous, now_ms),
            PageTarget::Next => self.step(DirectionOffset::Next, now_ms),
        }
    }

    /// Turns the page towards a physical side of the screen.
    pub fn open_page_at_side(&mut self, side: PageSide, now_ms: u64) -> Vec<Effect> {
        let offset = offset_for_side(side, self.settings.reading_direction);
        self.step(offset, now_ms)
    }

    pub fn tap(&mut self, x: f32, y: f32, now_ms: u64) -> Vec<Effect> {
        let region = region_at(
            self.settings.tap_zone_layout,
            x,
            y,
            self.settings.invert_tap_zones,
            self.settings.reading_direction,
        );
        match region {
            TapZoneRegionType::Previous => self.step(DirectionOffset::Previous, now_ms),
            TapZoneRegionType::Next => self.step(DirectionOffset::Next, now_ms),
            TapZoneRegionType::Menu => vec![Effect::ToggleMenu],
        }
    }

    pub fn scroll(
        &mut self,
        offset: ScrollOffset,
        viewport: &ViewportMetrics,
        now_ms: u64,
    ) -> Vec<Effect> {
        let axis = self.settings.reading_mode.scroll_direction();
        let sign = scroll_sign(axis, offset, self.settings.reading_direction);

        if viewport.is_at_edge(axis, sign) {
            let offset = DirectionOffset::from(offset);
            if self.settings.reading_mode.is_continuous() {
                debug!("nav: scrolled to {offset:?} edge, crossing chapter");
                return self.open_chapter(offset.into(), true);
            }
            return self.step(offset, now_ms);
        }

        let amount = f32::from(self.settings.scroll_amount) / 100.0 * sign as f32;
        let effect = match axis {
            ScrollDirection::X => Effect::ScrollBy {
                dx: viewport.client_width * amount,
                dy: 0.0,
            },
            ScrollDirection::Y | ScrollDirection::XY => Effect::ScrollBy {
                dx: 0.0,
                dy: viewport.client_height * amount,
            },
        };
        vec![effect]
    }

    /// Moves to another chapter, asking for confirmation first when the check flags it.
    pub fn open_chapter(
        &mut self,
        target: ChapterTarget,
        do_transition_check: bool,
    ) -> Vec<Effect> {
        let Some(pending) = self.prepare_transition(target, do_transition_check) else {
            debug!("nav: no chapter for {target:?}");
            return Vec::new();
        };
        match pending.confirmation.clone() {
            Some(request) => {
                debug!(
                    "nav: transition {} -> {} awaits confirmation",
                    pending.from, pending.target
                );
                self.pending_transition = Some(pending);
                vec![Effect::RequestConfirmation(request)]
            }
            None => self.commit(pending),
        }
    }

    pub fn prepare_transition(
        &self,
        target: ChapterTarget,
        do_transition_check: bool,
    ) -> Option<PendingTransition> {
        plan_transition(
            &self.chapters,
            self.current_chapter(),
            target,
            do_transition_check,
            &self.settings,
        )
    }

    pub fn commit_transition(&mut self) -> Result<Vec<Effect>, NavigationError> {
        let pending = self
            .pending_transition
            .take()
            .ok_or(NavigationError::NoPendingTransition)?;
        Ok(self.commit(pending))
    }

    /// Drops the pending transition; nothing else changes.
    pub fn abort_transition(&mut self) -> Option<PendingTransition> {
        let pending = self.pending_transition.take();
        if let Some(pending) = &pending {
            debug!("nav: transition {} -> {} aborted", pending.from, pending.target);
        }
        pending
    }

    /// Sets the current raw page index as reported by the viewport.
    pub fn update_current_page_index(
        &mut self,
        page_index: usize,
        debounce: bool,
        end_reached: bool,
        now_ms: u64,
    ) -> Vec<Effect> {
        if page_index == self.pages.current_page_index && !end_reached {
            return Vec::new();
        }
        if page_index >= self.pages.page_count() {
            debug!("nav: page index {page_index} out of range ignored");
            return Vec::new();
        }
        self.apply_page_index(page_index, debounce, end_reached, now_ms)
    }

    /// Emits the pending read-state write once its debounce delay has passed.
    pub fn poll_timers(&mut self, now_ms: u64) -> Vec<Effect> {
        match &self.pending_write {
            Some(pending) if now_ms >= pending.due_at_ms => self.flush_pending_write(),
            _ => Vec::new(),
        }
    }

    /// Lets a later page change request `chapter_id` again after its enqueue failed.
    pub fn download_failed(&mut self, chapter_id: ChapterId) {
        self.prefetch.forget(chapter_id);
    }

    pub fn flush_pending_write(&mut self) -> Vec<Effect> {
        self.pending_write
            .take()
            .map(|pending| Effect::PersistReadState(pending.write))
            .into_iter()
            .collect()
    }

    fn step(&mut self, offset: DirectionOffset, now_ms: u64) -> Vec<Effect> {
        match (self.pages.transition_page_mode, offset) {
            (TransitionPageMode::Next, DirectionOffset::Previous)
            | (TransitionPageMode::Previous, DirectionOffset::Next) => {
                debug!("nav: hide transition page");
                self.pages.transition_page_mode = TransitionPageMode::None;
                self.refresh_phase();
                return Vec::new();
            }
            (TransitionPageMode::Next, DirectionOffset::Next)
            | (TransitionPageMode::Previous, DirectionOffset::Previous) => {
                return self.open_chapter(offset.into(), true);
            }
            (TransitionPageMode::None, _) => {}
        }

        let Some(position) = self.pages.current_position() else {
            return Vec::new();
        };
        let neighbour = match offset {
            DirectionOffset::Previous => position.checked_sub(1),
            DirectionOffset::Next => Some(position + 1).filter(|p| *p < self.pages.pages.len()),
        };
        if let Some(neighbour) = neighbour {
            let index = self.pages.pages[neighbour].primary.index;
            return self.apply_page_index(index, true, false, now_ms);
        }

        if self.settings.show_transition_page && !self.settings.reading_mode.is_continuous() {
            self.pages.transition_page_mode = match offset {
                DirectionOffset::Previous => TransitionPageMode::Previous,
                DirectionOffset::Next => TransitionPageMode::Next,
            };
            debug!("nav: show {offset:?} transition page");
            self.refresh_phase();
            return Vec::new();
        }
        self.open_chapter(offset.into(), true)
    }

    fn apply_page_index(
        &mut self,
        page_index: usize,
        debounce: bool,
        end_reached: bool,
        now_ms: u64,
    ) -> Vec<Effect> {
        if page_index != self.pages.current_page_index {
            self.pages.transition_page_mode = TransitionPageMode::None;
        }
        self.pages.current_page_index = page_index;
        self.refresh_phase();

        let mut effects = self.run_prefetch();

        let page_count = self.pages.page_count();
        let actual = if end_reached {
            page_count.saturating_sub(1)
        } else {
            self.pages.current_page().map_or(page_index, index_from_page)
        };
        let last_page_read = u32::try_from(actual).unwrap_or(u32::MAX);
        let chapter = &mut self.chapters[self.current];
        chapter.last_page_read = last_page_read;
        if actual + 1 == page_count {
            chapter.is_read = true;
        }
        debug!(
            "nav: chapter {} page {}/{} (read up to {})",
            chapter.id,
            page_index + 1,
            page_count,
            actual + 1
        );

        let write = ReadStateWrite {
            chapter_id: chapter.id,
            last_page_read,
        };
        if debounce {
            self.pending_write = Some(PendingWrite {
                write,
                due_at_ms: now_ms.saturating_add(READ_STATE_DEBOUNCE_MS),
            });
        } else {
            self.pending_write = None;
            effects.push(Effect::PersistReadState(write));
        }
        effects
    }

    fn commit(&mut self, pending: PendingTransition) -> Vec<Effect> {
        self.pending_transition = None;
        if self.current_chapter().id != pending.from {
            debug!("nav: stale transition from {} ignored", pending.from);
            return Vec::new();
        }
        let Some(target) = self.chapters.iter().position(|c| c.id == pending.target) else {
            return Vec::new();
        };
        let mut effects = self.flush_pending_write();

        let source_order = self.chapters[target].source_order;
        if self.settings.reading_mode.is_continuous() && self.touches_window(source_order) {
            self.window = self.window.extended_to(source_order);
        } else {
            self.window = VisibleChaptersWindow::single(source_order);
            let window = self.window;
            let chapters = &self.chapters;
            self.layouts.retain(|id, _| {
                chapters
                    .iter()
                    .any(|chapter| chapter.id == *id && window.contains(chapter.source_order))
            });
        }
        info!(
            "reader: open chapter {} ({:?}) window={}..={}",
            pending.target,
            pending.resume,
            self.window.last_leading_source_order,
            self.window.last_trailing_source_order
        );

        self.current = target;
        self.pages = PagesState::default();
        match self.layouts.get(&pending.target) {
            Some(layout) => {
                self.pages.pages = layout.pages.clone();
                self.pending_resume = None;
                self.pages.current_page_index = resume_index(
                    &self.chapters[target],
                    pending.resume,
                    self.pages.page_count(),
                );
                self.refresh_phase();
                effects.extend(self.run_prefetch());
            }
            None => {
                self.pending_resume = Some(pending.resume);
                self.refresh_phase();
                effects.push(Effect::LoadChapterPages {
                    chapter_id: pending.target,
                });
            }
        }
        effects
    }

    /// Whether `source_order` lies inside the window or is the chapter right next to it.
    fn touches_window(&self, source_order: i32) -> bool {
        if self.window.contains(source_order) {
            return true;
        }
        let before = self
            .chapters
            .iter()
            .rev()
            .find(|chapter| chapter.source_order < self.window.last_leading_source_order);
        let after = self
            .chapters
            .iter()
            .find(|chapter| chapter.source_order > self.window.last_trailing_source_order);
        before.is_some_and(|chapter| chapter.source_order == source_order)
            || after.is_some_and(|chapter| chapter.source_order == source_order)
    }

    fn run_prefetch(&mut self) -> Vec<Effect> {
        let ctx = PrefetchContext {
            current: &self.chapters[self.current],
            previous: self
                .current
                .checked_sub(1)
                .map(|index| &self.chapters[index]),
            next: self.chapters.get(self.current + 1),
            next_chapters: &self.chapters[self.current + 1..],
            page_index: self.pages.current_page_index,
            page_count: self.pages.page_count(),
            window: self.window,
            settings: &self.settings,
        };
        let plan = self.prefetch.plan(&ctx);

        let mut effects: Vec<Effect> = plan
            .downloads
            .into_iter()
            .map(Effect::EnqueueDownload)
            .collect();
        if let Some(materialize) = plan.materialize {
            debug!(
                "nav: materialize chapter {} at {:?} edge",
                materialize.chapter_id, materialize.edge
            );
            self.window = materialize.window;
            if !self.layouts.contains_key(&materialize.chapter_id) {
                effects.push(Effect::LoadChapterPages {
                    chapter_id: materialize.chapter_id,
                });
            }
        }
        effects
    }

    fn refresh_phase(&mut self) {
        self.phase = match self.pages.transition_page_mode {
            TransitionPageMode::Previous => {
                NavigationPhase::TransitionVisible(DirectionOffset::Previous)
            }
            TransitionPageMode::Next => NavigationPhase::TransitionVisible(DirectionOffset::Next),
            TransitionPageMode::None if self.pending_resume.is_some() => {
                NavigationPhase::CrossingChapter
            }
            TransitionPageMode::None => match self.pages.current_position() {
                Some(position) if position + 1 == self.pages.pages.len() => {
                    NavigationPhase::AtBoundary(DirectionOffset::Next)
                }
                Some(0) => NavigationPhase::AtBoundary(DirectionOffset::Previous),
                _ => NavigationPhase::Idle,
            },
        };
    }
}

fn resume_index(chapter: &Chapter, mode: ResumeMode, page_count: usize) -> usize {
    let last = page_count.saturating_sub(1);
    match mode {
        ResumeMode::LastPage => last,
        ResumeMode::FirstUnread if chapter.is_read => 0,
        ResumeMode::FirstUnread => (chapter.last_page_read as usize).min(last),
    }
}
