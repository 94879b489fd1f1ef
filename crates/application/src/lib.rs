//! Reader navigation: page layout, direction mapping, chapter transitions and prefetching.

pub mod direction;
pub mod layout;
pub mod navigation;
pub mod prefetch;
pub mod progress_bar;
pub mod session;
pub mod tap_zone;
pub mod transition;

use pagewise_core::ChapterId;
use thiserror::Error;

pub use direction::{DirectionOffset, PageSide, ScrollOffset};
pub use navigation::{
    Effect, NavigationController, NavigationPhase, PageTarget, PagesState, READ_STATE_DEBOUNCE_MS,
    ReadStateWrite, ViewportMetrics,
};
pub use session::{
    ChapterReadStateUpdate, ChapterSource, ConfirmationDeclined, Confirmer, DownloadQueue,
    NotificationLevel, Notifier, ReaderSession,
};
pub use transition::{ChapterTarget, ConfirmationRequest, PendingTransition, ResumeMode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("chapter {0} is not part of the chapter list")]
    ChapterNotFound(ChapterId),
    #[error("no chapter transition is awaiting confirmation")]
    NoPendingTransition,
}
