//! Sqlite-backed persistence.

use std::path::Path;

use anyhow::Context as _;
use log::debug;
use pagewise_application::{ChapterReadStateUpdate, ChapterSource, DownloadQueue};
use pagewise_core::{Chapter, ChapterId, MangaId, RawPage, ReaderSettings};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension as _, Row};

const CHAPTER_COLUMNS: &str = "id, manga_id, source_order, chapter_number, scanlator, name, \
     page_count, is_read, is_bookmarked, is_downloaded, last_page_read";

#[derive(Debug)]
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite db at {}", path.as_ref().display()))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1)
            );
            INSERT OR IGNORE INTO settings (id) VALUES (1);

            CREATE TABLE IF NOT EXISTS chapters (
                id INTEGER PRIMARY KEY,
                manga_id INTEGER NOT NULL,
                source_order INTEGER NOT NULL,
                chapter_number REAL NOT NULL,
                scanlator TEXT,
                name TEXT NOT NULL,
                page_count INTEGER NOT NULL DEFAULT 0,
                is_read INTEGER NOT NULL DEFAULT 0,
                is_bookmarked INTEGER NOT NULL DEFAULT 0,
                is_downloaded INTEGER NOT NULL DEFAULT 0,
                last_page_read INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            );
            CREATE INDEX IF NOT EXISTS chapters_by_manga ON chapters (manga_id, source_order);

            CREATE TABLE IF NOT EXISTS chapter_pages (
                chapter_id INTEGER NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
                page_index INTEGER NOT NULL,
                url TEXT NOT NULL,
                PRIMARY KEY (chapter_id, page_index)
            );

            CREATE TABLE IF NOT EXISTS download_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chapter_id INTEGER NOT NULL UNIQUE REFERENCES chapters(id) ON DELETE CASCADE,
                queued_at INTEGER NOT NULL DEFAULT (unixepoch())
            );
            "#,
        )?;

        self.add_column("settings", "reader_json TEXT NOT NULL DEFAULT '{}'")?;
        Ok(())
    }

    fn add_column(&self, table: &str, definition: &str) -> anyhow::Result<()> {
        match self
            .conn
            .execute(&format!("ALTER TABLE {table} ADD COLUMN {definition}"), [])
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let msg = err.to_string();
                if msg.contains("duplicate column name") {
                    Ok(())
                } else {
                    Err(err).with_context(|| format!("add {table} column {definition}"))
                }
            }
        }
    }

    pub fn load_settings(&self) -> anyhow::Result<ReaderSettings> {
        let json: Option<String> = self
            .conn
            .query_row("SELECT reader_json FROM settings WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let mut settings = json
            .and_then(|json| serde_json::from_str::<ReaderSettings>(&json).ok())
            .unwrap_or_default();
        settings.normalize();
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &ReaderSettings) -> anyhow::Result<()> {
        let mut settings = settings.clone();
        settings.normalize();
        let json = serde_json::to_string(&settings)?;
        self.conn
            .execute("UPDATE settings SET reader_json = ? WHERE id = 1", [json])?;
        Ok(())
    }

    pub fn upsert_chapter(&self, chapter: &Chapter) -> anyhow::Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO chapters (id, manga_id, source_order, chapter_number, scanlator, name,
                page_count, is_read, is_bookmarked, is_downloaded, last_page_read)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                manga_id = excluded.manga_id,
                source_order = excluded.source_order,
                chapter_number = excluded.chapter_number,
                scanlator = excluded.scanlator,
                name = excluded.name,
                page_count = excluded.page_count,
                is_read = excluded.is_read,
                is_bookmarked = excluded.is_bookmarked,
                is_downloaded = excluded.is_downloaded,
                last_page_read = excluded.last_page_read,
                updated_at = unixepoch()
            "#,
            rusqlite::params![
                chapter.id.0,
                chapter.manga_id.0,
                chapter.source_order,
                chapter.chapter_number,
                chapter.scanlator,
                chapter.name,
                chapter.page_count,
                chapter.is_read,
                chapter.is_bookmarked,
                chapter.is_downloaded,
                chapter.last_page_read,
            ],
        )?;
        Ok(())
    }

    /// Replaces the page list of a chapter and keeps its `page_count` in step.
    pub fn set_chapter_pages(&self, chapter_id: ChapterId, pages: &[RawPage]) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM chapter_pages WHERE chapter_id = ?", [chapter_id.0])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chapter_pages (chapter_id, page_index, url) VALUES (?, ?, ?)",
            )?;
            for page in pages {
                let index = i64::try_from(page.index).context("page index out of range")?;
                stmt.execute((chapter_id.0, index, &page.url))?;
            }
        }
        let updated = tx.execute(
            "UPDATE chapters SET page_count = ?, updated_at = unixepoch() WHERE id = ?",
            (pages.len() as i64, chapter_id.0),
        )?;
        if updated == 0 {
            anyhow::bail!("chapter {chapter_id} not found");
        }
        tx.commit()?;
        Ok(())
    }

    pub fn list_chapters(&self, manga_id: MangaId) -> anyhow::Result<Vec<Chapter>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE manga_id = ? ORDER BY source_order"
        ))?;
        let rows = stmt.query_map([manga_id.0], chapter_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_chapter(&self, chapter_id: ChapterId) -> anyhow::Result<Option<Chapter>> {
        let chapter = self
            .conn
            .query_row(
                &format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = ?"),
                [chapter_id.0],
                chapter_from_row,
            )
            .optional()?;
        Ok(chapter)
    }

    pub fn list_chapter_pages(&self, chapter_id: ChapterId) -> anyhow::Result<Vec<RawPage>> {
        let mut stmt = self.conn.prepare(
            "SELECT page_index, url FROM chapter_pages WHERE chapter_id = ? ORDER BY page_index",
        )?;
        let rows = stmt.query_map([chapter_id.0], |row| {
            let index: i64 = row.get(0)?;
            let index = usize::try_from(index).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(err))
            })?;
            Ok(RawPage {
                index,
                url: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_chapter_read_state(
        &self,
        chapter_id: ChapterId,
        update: &ChapterReadStateUpdate,
    ) -> anyhow::Result<()> {
        let updated = self.conn.execute(
            r#"
            UPDATE chapters SET
                last_page_read = ?,
                is_read = COALESCE(?, is_read),
                is_bookmarked = COALESCE(?, is_bookmarked),
                updated_at = unixepoch()
            WHERE id = ?
            "#,
            (
                update.last_page_read,
                update.is_read,
                update.is_bookmarked,
                chapter_id.0,
            ),
        )?;
        if updated == 0 {
            anyhow::bail!("chapter {chapter_id} not found");
        }
        debug!(
            "storage: chapter {chapter_id} last_page_read={} is_read={:?}",
            update.last_page_read, update.is_read
        );
        Ok(())
    }

    pub fn enqueue_download(&self, chapter_id: ChapterId) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO download_queue (chapter_id) VALUES (?)",
            [chapter_id.0],
        )?;
        Ok(())
    }

    pub fn mark_downloaded(&self, chapter_id: ChapterId) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE chapters SET is_downloaded = 1, updated_at = unixepoch() WHERE id = ?",
            [chapter_id.0],
        )?;
        tx.execute("DELETE FROM download_queue WHERE chapter_id = ?", [chapter_id.0])?;
        tx.commit()?;
        Ok(())
    }

    pub fn queued_downloads(&self) -> anyhow::Result<Vec<ChapterId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT chapter_id FROM download_queue ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok(ChapterId(row.get(0)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn chapter_from_row(row: &Row<'_>) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: ChapterId(row.get(0)?),
        manga_id: MangaId(row.get(1)?),
        source_order: row.get(2)?,
        chapter_number: row.get(3)?,
        scanlator: row.get(4)?,
        name: row.get(5)?,
        page_count: row.get(6)?,
        is_read: row.get(7)?,
        is_bookmarked: row.get(8)?,
        is_downloaded: row.get(9)?,
        last_page_read: row.get(10)?,
    })
}

impl ChapterSource for Storage {
    fn chapters(&self, manga_id: MangaId) -> anyhow::Result<Vec<Chapter>> {
        self.list_chapters(manga_id)
    }

    fn chapter(&self, chapter_id: ChapterId) -> anyhow::Result<Option<Chapter>> {
        self.get_chapter(chapter_id)
    }

    fn chapter_pages(&self, chapter_id: ChapterId) -> anyhow::Result<Vec<RawPage>> {
        self.list_chapter_pages(chapter_id)
    }

    fn update_chapter_read_state(
        &mut self,
        chapter_id: ChapterId,
        update: &ChapterReadStateUpdate,
    ) -> anyhow::Result<()> {
        Storage::update_chapter_read_state(self, chapter_id, update)
    }
}

impl DownloadQueue for Storage {
    fn enqueue_chapter_download(&mut self, chapter_id: ChapterId) -> anyhow::Result<()> {
        self.enqueue_download(chapter_id)
    }

    fn is_chapter_downloaded(&self, chapter_id: ChapterId) -> anyhow::Result<bool> {
        let downloaded = self
            .conn
            .query_row(
                "SELECT is_downloaded FROM chapters WHERE id = ?",
                [chapter_id.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(downloaded.unwrap_or(false))
    }
}
