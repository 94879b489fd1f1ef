//! Test helpers and fixtures.

use std::collections::{HashMap, HashSet, VecDeque};

use pagewise_application::{
    ChapterReadStateUpdate, ChapterSource, ConfirmationDeclined, ConfirmationRequest, Confirmer,
    DownloadQueue, NotificationLevel, Notifier,
};
use pagewise_core::{
    Chapter, ChapterId, MangaId, RawPage, ReaderSettings, ReadingDirection, ReadingMode,
};

pub const MANGA: MangaId = MangaId(1);

pub fn make_settings(reading_mode: ReadingMode, reading_direction: ReadingDirection) -> ReaderSettings {
    ReaderSettings {
        reading_mode,
        reading_direction,
        ..ReaderSettings::default()
    }
}

pub fn make_chapter(id: i64, chapter_number: f64, page_count: u32) -> Chapter {
    Chapter {
        id: ChapterId(id),
        manga_id: MANGA,
        source_order: id as i32,
        chapter_number,
        scanlator: None,
        name: format!("Chapter {chapter_number}"),
        page_count,
        is_read: false,
        is_bookmarked: false,
        is_downloaded: false,
        last_page_read: 0,
    }
}

/// Chapters `1..=count`, numbered like their ids.
pub fn make_chapters(count: i64, page_count: u32) -> Vec<Chapter> {
    (1..=count)
        .map(|id| make_chapter(id, id as f64, page_count))
        .collect()
}

pub fn raw_pages(count: usize) -> Vec<RawPage> {
    (0..count)
        .map(|index| RawPage {
            url: format!("https://img.example/{index:03}.webp"),
            index,
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct FakeSource {
    pub chapters: Vec<Chapter>,
    pub pages: HashMap<ChapterId, Vec<RawPage>>,
    pub writes: Vec<(ChapterId, ChapterReadStateUpdate)>,
    pub fail_writes: bool,
}

impl FakeSource {
    /// Every chapter gets as many pages as its `page_count` says.
    pub fn new(chapters: Vec<Chapter>) -> Self {
        let pages = chapters
            .iter()
            .map(|chapter| (chapter.id, raw_pages(chapter.page_count as usize)))
            .collect();
        Self {
            chapters,
            pages,
            ..Self::default()
        }
    }
}

impl ChapterSource for FakeSource {
    fn chapters(&self, manga_id: MangaId) -> anyhow::Result<Vec<Chapter>> {
        Ok(self
            .chapters
            .iter()
            .filter(|chapter| chapter.manga_id == manga_id)
            .cloned()
            .collect())
    }

    fn chapter(&self, chapter_id: ChapterId) -> anyhow::Result<Option<Chapter>> {
        Ok(self
            .chapters
            .iter()
            .find(|chapter| chapter.id == chapter_id)
            .cloned())
    }

    fn chapter_pages(&self, chapter_id: ChapterId) -> anyhow::Result<Vec<RawPage>> {
        self.pages
            .get(&chapter_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no pages for chapter {chapter_id}"))
    }

    fn update_chapter_read_state(
        &mut self,
        chapter_id: ChapterId,
        update: &ChapterReadStateUpdate,
    ) -> anyhow::Result<()> {
        if self.fail_writes {
            anyhow::bail!("server unavailable");
        }
        self.writes.push((chapter_id, *update));
        Ok(())
    }
}

/// Answers confirmations from a script; an exhausted script declines.
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    pub answers: VecDeque<bool>,
    pub requests: Vec<ConfirmationRequest>,
}

impl ScriptedConfirmer {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            requests: Vec::new(),
        }
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&mut self, request: &ConfirmationRequest) -> Result<(), ConfirmationDeclined> {
        self.requests.push(request.clone());
        if self.answers.pop_front().unwrap_or(false) {
            Ok(())
        } else {
            Err(ConfirmationDeclined)
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingDownloads {
    pub downloaded: HashSet<ChapterId>,
    pub queued: Vec<ChapterId>,
    /// Number of upcoming enqueue calls that fail.
    pub failing_enqueues: usize,
}

impl DownloadQueue for RecordingDownloads {
    fn enqueue_chapter_download(&mut self, chapter_id: ChapterId) -> anyhow::Result<()> {
        if self.failing_enqueues > 0 {
            self.failing_enqueues -= 1;
            anyhow::bail!("download queue unavailable");
        }
        self.queued.push(chapter_id);
        Ok(())
    }

    fn is_chapter_downloaded(&self, chapter_id: ChapterId) -> anyhow::Result<bool> {
        Ok(self.downloaded.contains(&chapter_id))
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub messages: Vec<(String, NotificationLevel)>,
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, message: &str, level: NotificationLevel) {
        self.messages.push((message.to_string(), level));
    }
}

#[cfg(test)]
mod tests {
    use pagewise_application::{
        ChapterTarget, Effect, PageTarget, ReaderSession, ScrollOffset, ViewportMetrics,
    };
    use pagewise_core::VisibleChaptersWindow;
    use pagewise_storage::Storage;

    use super::*;

    type FakeSession = ReaderSession<FakeSource, ScriptedConfirmer, RecordingDownloads, RecordingNotifier>;

    fn open_fake(
        settings: ReaderSettings,
        source: FakeSource,
        confirmer: ScriptedConfirmer,
        downloads: RecordingDownloads,
        chapter: i64,
    ) -> FakeSession {
        ReaderSession::open(
            settings,
            ChapterId(chapter),
            source,
            confirmer,
            downloads,
            RecordingNotifier::default(),
        )
        .unwrap()
    }

    #[test]
    fn builds_settings() {
        let settings = make_settings(ReadingMode::Webtoon, ReadingDirection::Rtl);
        assert_eq!(settings.reading_mode, ReadingMode::Webtoon);
        assert!(settings.show_transition_page);
    }

    #[test]
    fn rapid_page_changes_persist_once() {
        let settings = make_settings(ReadingMode::SinglePage, ReadingDirection::Ltr);
        let source = FakeSource::new(make_chapters(2, 10));
        let mut session = open_fake(
            settings,
            source,
            ScriptedConfirmer::default(),
            RecordingDownloads::default(),
            1,
        );
        assert_eq!(session.controller().pages().pages.len(), 10);

        session.apply(|nav| nav.open_page(PageTarget::Next, 0));
        session.apply(|nav| nav.open_page(PageTarget::Next, 100));
        session.apply(|nav| nav.open_page(PageTarget::Next, 200));
        assert!(session.tick(900).is_empty());
        assert!(session.source().writes.is_empty());

        session.tick(1_200);
        let writes = &session.source().writes;
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, ChapterId(1));
        assert_eq!(writes[0].1.last_page_read, 3);
        assert_eq!(writes[0].1.is_read, None);

        session.tick(5_000);
        assert_eq!(session.source().writes.len(), 1);
    }

    #[test]
    fn reaching_the_last_page_marks_chapter_read() {
        let settings = make_settings(ReadingMode::SinglePage, ReadingDirection::Ltr);
        let mut session = open_fake(
            settings,
            FakeSource::new(make_chapters(1, 4)),
            ScriptedConfirmer::default(),
            RecordingDownloads::default(),
            1,
        );
        session.apply(|nav| nav.update_current_page_index(3, false, false, 0));
        let writes = &session.source().writes;
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1.last_page_read, 3);
        assert_eq!(writes[0].1.is_read, Some(true));
    }

    #[test]
    fn read_flag_uses_stored_page_count() {
        let settings = make_settings(ReadingMode::SinglePage, ReadingDirection::Ltr);
        let mut source = FakeSource::new(make_chapters(1, 10));
        source.chapters[0].page_count = 6;
        let mut session = open_fake(
            settings,
            source,
            ScriptedConfirmer::default(),
            RecordingDownloads::default(),
            1,
        );
        session.apply(|nav| nav.update_current_page_index(5, false, false, 0));
        assert_eq!(session.source().writes[0].1.is_read, Some(true));
    }

    #[test]
    fn failed_write_notifies_without_rollback() {
        let settings = make_settings(ReadingMode::SinglePage, ReadingDirection::Ltr);
        let mut source = FakeSource::new(make_chapters(1, 10));
        source.fail_writes = true;
        let mut session = open_fake(
            settings,
            source,
            ScriptedConfirmer::default(),
            RecordingDownloads::default(),
            1,
        );
        session.apply(|nav| nav.open_page(PageTarget::Index(4), 0));
        session.tick(2_000);

        let messages = &session.notifier().messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1, NotificationLevel::Error);
        assert_eq!(session.controller().pages().current_page_index, 4);
        assert_eq!(session.controller().current_chapter().last_page_read, 4);
    }

    #[test]
    fn declined_chapter_gap_keeps_reader_in_place() {
        let settings = make_settings(ReadingMode::SinglePage, ReadingDirection::Ltr);
        let chapters = vec![make_chapter(1, 1.0, 5), make_chapter(2, 5.0, 5)];
        let mut session = open_fake(
            settings,
            FakeSource::new(chapters),
            ScriptedConfirmer::new([false, true]),
            RecordingDownloads::default(),
            1,
        );
        session.apply(|nav| nav.open_page(PageTarget::Index(4), 0));
        let window = session.controller().window();

        session.apply(|nav| nav.open_chapter(ChapterTarget::Next, true));
        let controller = session.controller();
        assert_eq!(controller.current_chapter().id, ChapterId(1));
        assert_eq!(controller.pages().current_page_index, 4);
        assert_eq!(controller.window(), window);
        assert!(controller.pending_transition().is_none());

        session.apply(|nav| nav.open_chapter(ChapterTarget::Next, true));
        let controller = session.controller();
        assert_eq!(controller.current_chapter().id, ChapterId(2));
        assert_eq!(controller.pages().current_page_index, 0);
        assert_eq!(controller.window(), VisibleChaptersWindow::single(2));

        let writes = &session.source().writes;
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1.last_page_read, 4);
        let requests = &session.confirmer().requests;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].title, "Missing chapters");
    }

    #[test]
    fn downloads_ahead_skip_chapters_already_on_disk() {
        let mut settings = make_settings(ReadingMode::SinglePage, ReadingDirection::Ltr);
        settings.download_ahead_limit = 2;
        settings.download_ahead_threshold = 2;
        let mut downloads = RecordingDownloads::default();
        downloads.downloaded.insert(ChapterId(2));
        let mut session = open_fake(
            settings,
            FakeSource::new(make_chapters(4, 10)),
            ScriptedConfirmer::default(),
            downloads,
            1,
        );

        session.apply(|nav| nav.open_page(PageTarget::Index(5), 0));
        assert!(session.downloads().queued.is_empty());
        session.apply(|nav| nav.open_page(PageTarget::Index(8), 0));
        assert_eq!(session.downloads().queued, vec![ChapterId(3)]);
        session.apply(|nav| nav.open_page(PageTarget::Index(9), 0));
        assert_eq!(session.downloads().queued, vec![ChapterId(3)]);
    }

    #[test]
    fn failed_download_is_requested_again() {
        let mut settings = make_settings(ReadingMode::SinglePage, ReadingDirection::Ltr);
        settings.download_ahead_limit = 1;
        settings.download_ahead_threshold = 3;
        let downloads = RecordingDownloads {
            failing_enqueues: 1,
            ..RecordingDownloads::default()
        };
        let mut session = open_fake(
            settings,
            FakeSource::new(make_chapters(2, 10)),
            ScriptedConfirmer::default(),
            downloads,
            1,
        );

        session.apply(|nav| nav.open_page(PageTarget::Index(7), 0));
        assert!(session.downloads().queued.is_empty());
        let messages = &session.notifier().messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1, NotificationLevel::Warning);

        session.apply(|nav| nav.open_page(PageTarget::Index(8), 0));
        session.apply(|nav| nav.open_page(PageTarget::Index(9), 0));
        assert_eq!(session.downloads().queued, vec![ChapterId(2)]);
        assert_eq!(session.notifier().messages.len(), 1);
    }

    #[test]
    fn missing_pages_are_reported() {
        let settings = make_settings(ReadingMode::SinglePage, ReadingDirection::Ltr);
        let mut source = FakeSource::new(make_chapters(2, 3));
        source.pages.remove(&ChapterId(2));
        let mut session = open_fake(
            settings,
            source,
            ScriptedConfirmer::default(),
            RecordingDownloads::default(),
            1,
        );
        session.apply(|nav| nav.open_chapter(ChapterTarget::Next, false));
        assert_eq!(session.controller().current_chapter().id, ChapterId(2));
        assert!(session.controller().pages().pages.is_empty());
        assert_eq!(session.notifier().messages.len(), 1);
    }

    #[test]
    fn scroll_effects_reach_the_caller() {
        let settings = make_settings(ReadingMode::ContinuousVertical, ReadingDirection::Ltr);
        let mut session = open_fake(
            settings,
            FakeSource::new(make_chapters(1, 10)),
            ScriptedConfirmer::default(),
            RecordingDownloads::default(),
            1,
        );
        let viewport = ViewportMetrics {
            scroll_left: 0.0,
            scroll_top: 0.0,
            scroll_width: 800.0,
            scroll_height: 10_000.0,
            client_width: 800.0,
            client_height: 1_000.0,
        };
        let effects = session.apply(|nav| nav.scroll(ScrollOffset::Forward, &viewport, 0));
        assert!(matches!(effects.as_slice(), [Effect::ScrollBy { dx, dy }] if *dx == 0.0 && *dy > 0.0));
        assert_eq!(session.apply(|nav| nav.tap(0.5, 0.5, 0)), vec![Effect::ToggleMenu]);
    }

    #[test]
    fn continuous_reading_against_storage() -> anyhow::Result<()> {
        let storage = Storage::open_in_memory()?;
        for chapter in make_chapters(3, 0) {
            storage.upsert_chapter(&chapter)?;
            storage.set_chapter_pages(chapter.id, &raw_pages(6))?;
        }
        let settings = make_settings(ReadingMode::Webtoon, ReadingDirection::Ltr);
        storage.save_settings(&settings)?;
        let settings = storage.load_settings()?;

        let mut session = ReaderSession::open(
            settings,
            ChapterId(1),
            storage,
            ScriptedConfirmer::default(),
            RecordingDownloads::default(),
            RecordingNotifier::default(),
        )?;
        assert_eq!(session.controller().pages().pages.len(), 6);

        session.apply(|nav| nav.update_current_page_index(4, true, false, 0));
        assert_eq!(session.controller().window().last_trailing_source_order, 2);
        assert!(session.controller().chapter_pages(ChapterId(2)).is_some());

        session.apply(|nav| nav.open_chapter(ChapterTarget::Next, true));
        assert_eq!(session.controller().current_chapter().id, ChapterId(2));
        assert_eq!(session.controller().window().last_leading_source_order, 1);
        assert_eq!(session.controller().pages().pages.len(), 6);

        session.apply(|nav| nav.update_current_page_index(5, true, true, 10));
        let storage = session.close();
        let first = storage.get_chapter(ChapterId(1))?;
        let second = storage.get_chapter(ChapterId(2))?;
        assert_eq!(first.as_ref().map(|c| c.last_page_read), Some(4));
        assert_eq!(first.as_ref().map(|c| c.is_read), Some(false));
        assert_eq!(second.as_ref().map(|c| c.last_page_read), Some(5));
        assert_eq!(second.as_ref().map(|c| c.is_read), Some(true));
        Ok(())
    }
}
