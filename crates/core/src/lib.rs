//! Core domain types for Pagewise.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MangaId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChapterId(pub i64);

impl std::fmt::Display for MangaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ChapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a chapter as known to the reader. `source_order` is the
/// ordering key; ascending source order is reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub manga_id: MangaId,
    pub source_order: i32,
    pub chapter_number: f64,
    pub scanlator: Option<String>,
    pub name: String,
    pub page_count: u32,
    pub is_read: bool,
    pub is_bookmarked: bool,
    pub is_downloaded: bool,
    pub last_page_read: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPage {
    pub url: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub index: usize,
    pub alt: String,
    pub url: String,
}

/// One unit of navigation: a single image, or two images shown side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub name: String,
    pub primary: PageRef,
    pub secondary: Option<PageRef>,
}

impl Page {
    pub fn contains(&self, index: usize) -> bool {
        self.primary.index == index || self.secondary.as_ref().is_some_and(|s| s.index == index)
    }

    pub fn last_index(&self) -> usize {
        self.secondary
            .as_ref()
            .map_or(self.primary.index, |secondary| secondary.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPageMode {
    #[default]
    None,
    Previous,
    Next,
}

/// Inclusive range of source orders currently materialized for continuous rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleChaptersWindow {
    pub last_leading_source_order: i32,
    pub last_trailing_source_order: i32,
}

impl VisibleChaptersWindow {
    pub fn single(source_order: i32) -> Self {
        Self {
            last_leading_source_order: source_order,
            last_trailing_source_order: source_order,
        }
    }

    pub fn contains(&self, source_order: i32) -> bool {
        (self.last_leading_source_order..=self.last_trailing_source_order).contains(&source_order)
    }

    pub fn extended_to(self, source_order: i32) -> Self {
        Self {
            last_leading_source_order: self.last_leading_source_order.min(source_order),
            last_trailing_source_order: self.last_trailing_source_order.max(source_order),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingDirection {
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    X,
    Y,
    XY,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingMode {
    SinglePage,
    DoublePage,
    ContinuousVertical,
    ContinuousHorizontal,
    Webtoon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TapZoneLayout {
    LeftRight,
    Kindle,
    LShaped,
}

impl ReadingDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingDirection::Ltr => "ltr",
            ReadingDirection::Rtl => "rtl",
        }
    }

    pub fn mirrored(self) -> Self {
        match self {
            ReadingDirection::Ltr => ReadingDirection::Rtl,
            ReadingDirection::Rtl => ReadingDirection::Ltr,
        }
    }
}

impl std::fmt::Display for ReadingDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReadingDirection {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ltr" => Ok(ReadingDirection::Ltr),
            "rtl" => Ok(ReadingDirection::Rtl),
            _ => Err("unknown reading direction"),
        }
    }
}

impl ReadingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingMode::SinglePage => "single_page",
            ReadingMode::DoublePage => "double_page",
            ReadingMode::ContinuousVertical => "continuous_vertical",
            ReadingMode::ContinuousHorizontal => "continuous_horizontal",
            ReadingMode::Webtoon => "webtoon",
        }
    }

    pub fn is_continuous(&self) -> bool {
        match self {
            ReadingMode::SinglePage | ReadingMode::DoublePage => false,
            ReadingMode::ContinuousVertical
            | ReadingMode::ContinuousHorizontal
            | ReadingMode::Webtoon => true,
        }
    }

    pub fn scroll_direction(&self) -> ScrollDirection {
        match self {
            ReadingMode::SinglePage | ReadingMode::DoublePage => ScrollDirection::XY,
            ReadingMode::ContinuousVertical | ReadingMode::Webtoon => ScrollDirection::Y,
            ReadingMode::ContinuousHorizontal => ScrollDirection::X,
        }
    }

    pub fn is_double_page(&self) -> bool {
        matches!(self, ReadingMode::DoublePage)
    }
}

impl std::fmt::Display for ReadingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReadingMode {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "single" | "single_page" => Ok(ReadingMode::SinglePage),
            "double" | "double_page" => Ok(ReadingMode::DoublePage),
            "vertical" | "continuous_vertical" => Ok(ReadingMode::ContinuousVertical),
            "horizontal" | "continuous_horizontal" => Ok(ReadingMode::ContinuousHorizontal),
            "webtoon" => Ok(ReadingMode::Webtoon),
            _ => Err("unknown reading mode"),
        }
    }
}

impl TapZoneLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            TapZoneLayout::LeftRight => "left_right",
            TapZoneLayout::Kindle => "kindle",
            TapZoneLayout::LShaped => "l_shaped",
        }
    }
}

impl std::fmt::Display for TapZoneLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TapZoneLayout {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "left_right" => Ok(TapZoneLayout::LeftRight),
            "kindle" => Ok(TapZoneLayout::Kindle),
            "l_shaped" => Ok(TapZoneLayout::LShaped),
            _ => Err("unknown tap zone layout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub reading_mode: ReadingMode,
    pub reading_direction: ReadingDirection,
    pub offset_double_spreads: bool,
    pub show_transition_page: bool,
    /// Percentage of the viewport covered by one scroll step.
    pub scroll_amount: u8,
    pub warn_on_chapter_gap: bool,
    pub warn_on_scanlator_change: bool,
    pub skip_duplicate_chapters: bool,
    pub download_ahead_limit: usize,
    /// Remaining pages in a chapter at which downloading ahead starts.
    pub download_ahead_threshold: usize,
    /// Pages from a chapter edge at which the neighbouring chapter is materialized.
    pub preload_edge_pages: usize,
    pub full_segment_clicks: bool,
    pub tap_zone_layout: TapZoneLayout,
    pub invert_tap_zones: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            reading_mode: ReadingMode::SinglePage,
            reading_direction: ReadingDirection::Ltr,
            offset_double_spreads: false,
            show_transition_page: true,
            scroll_amount: 95,
            warn_on_chapter_gap: true,
            warn_on_scanlator_change: true,
            skip_duplicate_chapters: true,
            download_ahead_limit: 0,
            download_ahead_threshold: 5,
            preload_edge_pages: 5,
            full_segment_clicks: false,
            tap_zone_layout: TapZoneLayout::LeftRight,
            invert_tap_zones: false,
        }
    }
}

impl ReaderSettings {
    pub fn normalize(&mut self) {
        self.scroll_amount = self.scroll_amount.clamp(5, 100);
        self.download_ahead_limit = self.download_ahead_limit.min(10);
        self.download_ahead_threshold = self.download_ahead_threshold.clamp(1, 50);
        self.preload_edge_pages = self.preload_edge_pages.clamp(1, 50);
    }

    pub fn cycle_reading_mode(&mut self) {
        self.reading_mode = match self.reading_mode {
            ReadingMode::SinglePage => ReadingMode::DoublePage,
            ReadingMode::DoublePage => ReadingMode::ContinuousVertical,
            ReadingMode::ContinuousVertical => ReadingMode::ContinuousHorizontal,
            ReadingMode::ContinuousHorizontal => ReadingMode::Webtoon,
            ReadingMode::Webtoon => ReadingMode::SinglePage,
        };
    }

    pub fn toggle_reading_direction(&mut self) {
        self.reading_direction = self.reading_direction.mirrored();
    }
}
