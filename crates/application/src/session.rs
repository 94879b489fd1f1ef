//! Runs controller effects against the chapter source and the other collaborators.

use std::collections::VecDeque;

use anyhow::Context as _;
use log::{debug, info, warn};
use pagewise_core::{Chapter, ChapterId, MangaId, RawPage, ReaderSettings};
use thiserror::Error;

use crate::navigation::{Effect, NavigationController, ReadStateWrite};
use crate::transition::ConfirmationRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterReadStateUpdate {
    pub last_page_read: u32,
    /// `None` leaves the stored flag alone.
    pub is_read: Option<bool>,
    pub is_bookmarked: Option<bool>,
}

pub trait ChapterSource {
    fn chapters(&self, manga_id: MangaId) -> anyhow::Result<Vec<Chapter>>;

    fn chapter(&self, chapter_id: ChapterId) -> anyhow::Result<Option<Chapter>>;

    fn chapter_pages(&self, chapter_id: ChapterId) -> anyhow::Result<Vec<RawPage>>;

    fn update_chapter_read_state(
        &mut self,
        chapter_id: ChapterId,
        update: &ChapterReadStateUpdate,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("chapter transition declined")]
pub struct ConfirmationDeclined;

pub trait Confirmer {
    fn confirm(&mut self, request: &ConfirmationRequest) -> Result<(), ConfirmationDeclined>;
}

pub trait DownloadQueue {
    fn enqueue_chapter_download(&mut self, chapter_id: ChapterId) -> anyhow::Result<()>;

    fn is_chapter_downloaded(&self, chapter_id: ChapterId) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

pub trait Notifier {
    fn notify(&mut self, message: &str, level: NotificationLevel);
}

/// A controller wired to its collaborators. Effects the session cannot execute itself
/// (scrolling, menu toggles) are handed back to the caller.
#[derive(Debug)]
pub struct ReaderSession<S, C, D, N> {
    controller: NavigationController,
    source: S,
    confirmer: C,
    downloads: D,
    notifier: N,
}

impl<S, C, D, N> ReaderSession<S, C, D, N>
where
    S: ChapterSource,
    C: Confirmer,
    D: DownloadQueue,
    N: Notifier,
{
    pub fn open(
        settings: ReaderSettings,
        chapter_id: ChapterId,
        source: S,
        confirmer: C,
        downloads: D,
        notifier: N,
    ) -> anyhow::Result<Self> {
        let chapter = source
            .chapter(chapter_id)?
            .with_context(|| format!("chapter {chapter_id} not found"))?;
        let chapters = source
            .chapters(chapter.manga_id)
            .with_context(|| format!("list chapters of manga {}", chapter.manga_id))?;
        let (controller, effects) = NavigationController::open(settings, chapters, chapter_id)?;

        let mut session = Self {
            controller,
            source,
            confirmer,
            downloads,
            notifier,
        };
        let ui = session.dispatch(effects);
        debug!("session: open produced {} ui effects", ui.len());
        Ok(session)
    }

    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn confirmer(&self) -> &C {
        &self.confirmer
    }

    pub fn downloads(&self) -> &D {
        &self.downloads
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Runs a controller operation and executes the effects it produces.
    pub fn apply<F>(&mut self, operation: F) -> Vec<Effect>
    where
        F: FnOnce(&mut NavigationController) -> Vec<Effect>,
    {
        let effects = operation(&mut self.controller);
        self.dispatch(effects)
    }

    pub fn tick(&mut self, now_ms: u64) -> Vec<Effect> {
        let effects = self.controller.poll_timers(now_ms);
        self.dispatch(effects)
    }

    /// Writes any debounced read state before the reader goes away.
    pub fn close(mut self) -> S {
        let effects = self.controller.flush_pending_write();
        self.dispatch(effects);
        info!("session: closed on chapter {}", self.controller.current_chapter().id);
        self.source
    }

    pub fn reload_chapters(&mut self) -> anyhow::Result<bool> {
        let manga_id = self.controller.current_chapter().manga_id;
        let chapters = self.source.chapters(manga_id)?;
        Ok(self.controller.set_chapters(chapters))
    }

    pub fn dispatch(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut queue = VecDeque::from(effects);
        let mut ui = Vec::new();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::LoadChapterPages { chapter_id } => {
                    match self.source.chapter_pages(chapter_id) {
                        Ok(pages) => {
                            queue.extend(self.controller.load_chapter_pages(chapter_id, pages));
                        }
                        Err(err) => {
                            warn!("session: load pages of chapter {chapter_id}: {err:#}");
                            self.notifier.notify(
                                &format!("Could not load chapter {chapter_id}: {err}"),
                                NotificationLevel::Error,
                            );
                        }
                    }
                }
                Effect::RequestConfirmation(request) => match self.confirmer.confirm(&request) {
                    Ok(()) => match self.controller.commit_transition() {
                        Ok(effects) => queue.extend(effects),
                        Err(err) => warn!("session: commit transition: {err}"),
                    },
                    Err(ConfirmationDeclined) => {
                        self.controller.abort_transition();
                    }
                },
                Effect::PersistReadState(write) => self.persist(write),
                Effect::EnqueueDownload(chapter_id) => self.enqueue(chapter_id),
                effect @ (Effect::ScrollBy { .. } | Effect::ToggleMenu) => ui.push(effect),
            }
        }
        ui
    }

    fn persist(&mut self, write: ReadStateWrite) {
        if let Err(err) = self.try_persist(write) {
            warn!(
                "session: persist read state of chapter {}: {err:#}",
                write.chapter_id
            );
            self.notifier.notify(
                &format!("Could not save reading progress: {err}"),
                NotificationLevel::Error,
            );
        }
    }

    fn try_persist(&mut self, write: ReadStateWrite) -> anyhow::Result<()> {
        let stored = self
            .source
            .chapter(write.chapter_id)?
            .with_context(|| format!("chapter {} not found", write.chapter_id))?;
        let reached_end =
            stored.page_count > 0 && write.last_page_read.saturating_add(1) >= stored.page_count;
        let update = ChapterReadStateUpdate {
            last_page_read: write.last_page_read,
            is_read: reached_end.then_some(true),
            is_bookmarked: None,
        };
        debug!(
            "session: persist chapter {} last_page_read={} is_read={:?}",
            write.chapter_id, update.last_page_read, update.is_read
        );
        self.source
            .update_chapter_read_state(write.chapter_id, &update)
    }

    fn enqueue(&mut self, chapter_id: ChapterId) {
        let result = self
            .downloads
            .is_chapter_downloaded(chapter_id)
            .and_then(|downloaded| {
                if downloaded {
                    debug!("session: chapter {chapter_id} already downloaded");
                    return Ok(());
                }
                self.downloads.enqueue_chapter_download(chapter_id)
            });
        if let Err(err) = result {
            warn!("session: enqueue download of chapter {chapter_id}: {err:#}");
            self.controller.download_failed(chapter_id);
            self.notifier.notify(
                &format!("Could not queue chapter {chapter_id} for download: {err}"),
                NotificationLevel::Warning,
            );
        }
    }
}
