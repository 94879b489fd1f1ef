use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context as _;
use directories::ProjectDirs;
use log::{error, info, warn};
use pagewise_application::progress_bar::{
    PointerPosition, TrackBounds, TrackOrientation, page_for_pointer, progress_for_page,
};
use pagewise_application::{
    ChapterTarget, ConfirmationDeclined, ConfirmationRequest, Confirmer, Effect,
    NavigationController, NotificationLevel, Notifier, PageSide, PageTarget, ReaderSession,
};
use pagewise_core::{Chapter, ChapterId, MangaId, RawPage, ReadingDirection, ReadingMode};
use pagewise_storage::Storage;

/// Width/height reported for a page flagged as a spread from the prompt.
const SPREAD_SIZE: (u32, u32) = (2000, 1400);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Seed {
        manga: MangaId,
        chapters: u32,
        pages: u32,
    },
    Read {
        manga: MangaId,
        chapter: Option<ChapterId>,
    },
}

#[derive(Debug, PartialEq)]
struct Args {
    db: Option<PathBuf>,
    command: Command,
}

#[derive(Debug, PartialEq)]
enum ReaderCommand {
    Next,
    Prev,
    Side(PageSide),
    Page(usize),
    Chapter(ChapterTarget),
    Spread(usize),
    Tap(f32, f32),
    Seek(f32),
    Mode(ReadingMode),
    Direction(ReadingDirection),
    Status,
    Quit,
}

fn run() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let db_path = match args.db {
        Some(path) => path,
        None => default_db_path()?,
    };

    match args.command {
        Command::Seed {
            manga,
            chapters,
            pages,
        } => seed(&Storage::open(&db_path)?, manga, chapters, pages),
        Command::Read { manga, chapter } => read(&db_path, manga, chapter),
    }
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("dev", "pagewise", "pagewise").context("resolve project dirs")?;
    let data_dir = project_dirs.data_dir();
    fs::create_dir_all(data_dir)
        .with_context(|| format!("create data dir {}", data_dir.display()))?;
    Ok(data_dir.join("pagewise.db"))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut args = args.into_iter().peekable();
    let mut db = None;
    if args.peek().map(String::as_str) == Some("--db") {
        args.next();
        db = Some(PathBuf::from(args.next().context("--db needs a path")?));
    }

    let usage = "usage: app [--db PATH] seed <manga> <chapters> <pages> | read <manga> [chapter]";
    let command = match args.next().as_deref() {
        Some("seed") => Command::Seed {
            manga: MangaId(next_number(&mut args, "manga")?),
            chapters: next_number(&mut args, "chapters")?,
            pages: next_number(&mut args, "pages")?,
        },
        Some("read") => Command::Read {
            manga: MangaId(next_number(&mut args, "manga")?),
            chapter: args
                .next()
                .map(|value| value.parse().map(ChapterId))
                .transpose()
                .context("chapter must be a number")?,
        },
        _ => anyhow::bail!(usage),
    };
    if let Some(extra) = args.next() {
        anyhow::bail!("unexpected argument {extra:?}; {usage}");
    }
    Ok(Args { db, command })
}

fn next_number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    name: &str,
) -> anyhow::Result<T> {
    let value = args.next().with_context(|| format!("missing <{name}>"))?;
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("<{name}> must be a number, got {value:?}"))
}

fn seed(storage: &Storage, manga: MangaId, chapters: u32, pages: u32) -> anyhow::Result<()> {
    for number in 1..=chapters {
        let chapter = Chapter {
            id: ChapterId(manga.0 * 10_000 + i64::from(number)),
            manga_id: manga,
            source_order: i32::try_from(number).context("too many chapters")?,
            chapter_number: f64::from(number),
            scanlator: None,
            name: format!("Chapter {number}"),
            page_count: 0,
            is_read: false,
            is_bookmarked: false,
            is_downloaded: false,
            last_page_read: 0,
        };
        storage.upsert_chapter(&chapter)?;
        let raw: Vec<RawPage> = (0..pages as usize)
            .map(|index| RawPage {
                url: format!("https://pages.invalid/{manga}/{number}/{index:03}.png"),
                index,
            })
            .collect();
        storage.set_chapter_pages(chapter.id, &raw)?;
    }
    info!("seeded manga {manga} with {chapters} chapters of {pages} pages");
    Ok(())
}

fn read(db_path: &Path, manga: MangaId, chapter: Option<ChapterId>) -> anyhow::Result<()> {
    let storage = Storage::open(db_path)?;
    let settings = storage.load_settings()?;
    let chapter_id = match chapter {
        Some(id) => id,
        None => {
            let chapters = storage.list_chapters(manga)?;
            chapters
                .iter()
                .find(|chapter| !chapter.is_read)
                .or_else(|| chapters.first())
                .map(|chapter| chapter.id)
                .with_context(|| format!("manga {manga} has no chapters; run seed first"))?
        }
    };
    let downloads = Storage::open(db_path)?;

    let mut session = ReaderSession::open(
        settings,
        chapter_id,
        storage,
        StdinConfirmer,
        downloads,
        LogNotifier,
    )?;
    let started = Instant::now();
    let now_ms = || u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    print_status(session.controller());
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        let now = now_ms();
        let effects = match command {
            ReaderCommand::Quit => break,
            ReaderCommand::Status => Vec::new(),
            ReaderCommand::Next => session.apply(|nav| nav.open_page(PageTarget::Next, now)),
            ReaderCommand::Prev => session.apply(|nav| nav.open_page(PageTarget::Previous, now)),
            ReaderCommand::Side(side) => session.apply(|nav| nav.open_page_at_side(side, now)),
            ReaderCommand::Page(index) => {
                session.apply(|nav| nav.open_page(PageTarget::Index(index), now))
            }
            ReaderCommand::Chapter(target) => {
                session.apply(|nav| nav.open_chapter(target, true))
            }
            ReaderCommand::Spread(index) => session.apply(|nav| {
                let chapter_id = nav.current_chapter().id;
                nav.set_page_dimensions(chapter_id, index, SPREAD_SIZE.0, SPREAD_SIZE.1);
                Vec::new()
            }),
            ReaderCommand::Tap(x, y) => session.apply(|nav| nav.tap(x, y, now)),
            ReaderCommand::Seek(fraction) => session.apply(|nav| {
                let settings = nav.settings();
                let track = TrackBounds {
                    left: 0.0,
                    top: 0.0,
                    width: 1.0,
                    height: 1.0,
                };
                let index = page_for_pointer(
                    PointerPosition {
                        x: fraction,
                        y: 0.5,
                    },
                    &track,
                    &nav.pages().pages,
                    TrackOrientation::Horizontal,
                    settings.full_segment_clicks,
                    settings.reading_direction,
                );
                match index {
                    Some(index) => nav.open_page(PageTarget::Index(index), now),
                    None => Vec::new(),
                }
            }),
            ReaderCommand::Mode(mode) => session.apply(|nav| {
                let mut settings = nav.settings().clone();
                settings.reading_mode = mode;
                nav.update_settings(settings);
                Vec::new()
            }),
            ReaderCommand::Direction(direction) => session.apply(|nav| {
                let mut settings = nav.settings().clone();
                settings.reading_direction = direction;
                nav.update_settings(settings);
                Vec::new()
            }),
        };
        for effect in effects.into_iter().chain(session.tick(now_ms())) {
            match effect {
                Effect::ScrollBy { dx, dy } => println!("scroll by ({dx:.0}, {dy:.0})"),
                Effect::ToggleMenu => println!("menu"),
                other => warn!("unhandled effect {other:?}"),
            }
        }
        print_status(session.controller());
    }

    let settings = session.controller().settings().clone();
    let storage = session.close();
    storage.save_settings(&settings)?;
    Ok(())
}

fn parse_command(line: &str) -> Result<Option<ReaderCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let mut arg = |name: &str| {
        words
            .next()
            .ok_or_else(|| format!("{word} needs <{name}>"))
    };
    let command = match word {
        "next" | "n" => ReaderCommand::Next,
        "prev" | "p" => ReaderCommand::Prev,
        "left" => ReaderCommand::Side(PageSide::Left),
        "right" => ReaderCommand::Side(PageSide::Right),
        "page" => ReaderCommand::Page(page_number(arg("page")?)?),
        "spread" => ReaderCommand::Spread(page_number(arg("page")?)?),
        "chapter" => ReaderCommand::Chapter(match arg("next|prev|id")? {
            "next" => ChapterTarget::Next,
            "prev" => ChapterTarget::Previous,
            id => ChapterTarget::Id(ChapterId(
                id.parse().map_err(|_| format!("bad chapter id {id:?}"))?,
            )),
        }),
        "tap" => {
            let x = fraction(arg("x")?)?;
            let y = fraction(arg("y")?)?;
            ReaderCommand::Tap(x, y)
        }
        "seek" => ReaderCommand::Seek(fraction(arg("fraction")?)?),
        "mode" => ReaderCommand::Mode(arg("mode")?.parse().map_err(str::to_string)?),
        "dir" => ReaderCommand::Direction(arg("ltr|rtl")?.parse().map_err(str::to_string)?),
        "status" => ReaderCommand::Status,
        "quit" | "q" => ReaderCommand::Quit,
        other => return Err(format!("unknown command {other:?}")),
    };
    Ok(Some(command))
}

/// One-based page number from the prompt to a raw page index.
fn page_number(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(number) if number > 0 => Ok(number - 1),
        _ => Err(format!("bad page number {value:?}")),
    }
}

fn fraction(value: &str) -> Result<f32, String> {
    value
        .parse::<f32>()
        .map_err(|_| format!("bad coordinate {value:?}"))
}

fn print_status(nav: &NavigationController) {
    let chapter = nav.current_chapter();
    let pages = nav.pages();
    let settings = nav.settings();
    let label = pages.current_page().map_or("-", |page| page.name.as_str());
    let progress = progress_for_page(&pages.pages, pages.current_page_index) * 100.0;
    println!(
        "{} | page {label} of {} ({progress:.0}%) | {:?} | {} {}",
        chapter.name,
        pages.page_count(),
        nav.phase(),
        settings.reading_mode,
        settings.reading_direction,
    );
}

struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&mut self, request: &ConfirmationRequest) -> Result<(), ConfirmationDeclined> {
        println!("{}\n{}", request.title, request.message);
        print!("{}? [y/N] ", request.confirm_label);
        if io::stdout().flush().is_err() {
            return Err(ConfirmationDeclined);
        }
        let mut answer = String::new();
        match io::stdin().read_line(&mut answer) {
            Ok(_) if matches!(answer.trim(), "y" | "Y" | "yes") => Ok(()),
            _ => Err(ConfirmationDeclined),
        }
    }
}

struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, message: &str, level: NotificationLevel) {
        match level {
            NotificationLevel::Info => info!("{message}"),
            NotificationLevel::Warning => warn!("{message}"),
            NotificationLevel::Error => error!("{message}"),
        }
    }
}
