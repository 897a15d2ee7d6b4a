use std::path::PathBuf;

pub mod app;
pub mod backend;
pub mod cli;
pub mod env;
pub mod files;
pub mod navigation;
pub mod preview;
pub mod session;
pub mod state;
pub mod thumbs;

pub use backend::{resolve_auto_mode, select_backend, BackendSelector, Mode, WallpaperBackend};
pub use cli::{Cli, Command, PickerArgs};
pub use env::Environment;
pub use files::{is_image_file, list_images, ImageEntry};
pub use navigation::NavigationState;
pub use preview::{PreviewDebouncer, PreviewRunner};
pub use session::{FrameInput, FrameOutcome, SelectionSession, SessionResult};
pub use state::SavedSelection;
pub use thumbs::{ThumbStatus, ThumbnailCache};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No supported wallpaper backend detected: {0}")]
    NoBackend(String),

    #[error("Backend '{0}' is not available in this environment")]
    BackendUnavailable(String),

    #[error("Not a directory: {0}")]
    InvalidDirectory(PathBuf),

    #[error("Backend command failed: {0}")]
    Backend(String),

    #[error("Failed to build thumbnail thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("State encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("No saved wallpaper selection found")]
    NoSavedSelection,
}

pub type Result<T> = std::result::Result<T, Error>;

pub const WINDOW_TITLE: &str = "wallpaper carousel";
