use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::backend::{BackendSelector, Mode};

pub const DEFAULT_VISIBLE_CARDS: usize = 5;
pub const MAX_VISIBLE_CARDS: usize = 15;
pub const DEFAULT_WINDOW_WIDTH: f32 = 1000.0;
pub const DEFAULT_WINDOW_HEIGHT: f32 = 260.0;

#[derive(Parser, Clone)]
#[command(name = "wallpaper-carousel")]
#[command(about = "Overlay carousel for previewing and picking a desktop wallpaper")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub picker: PickerArgs,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Reapply the last confirmed wallpaper
    Restore {
        /// Backend override for restore
        #[arg(long, value_enum, default_value_t = BackendSelector::Auto)]
        backend: BackendSelector,
    },
    /// Print environment and backend detection info
    Diagnose,
}

#[derive(clap::Args, Clone)]
pub struct PickerArgs {
    /// Directory containing wallpaper images (defaults to the current directory)
    pub directory: Option<PathBuf>,

    /// Wallpaper backend to use
    #[arg(long, value_enum, default_value_t = BackendSelector::Auto)]
    pub backend: BackendSelector,

    /// Wallpaper placement mode
    #[arg(long, value_enum, default_value_t = Mode::Auto)]
    pub mode: Mode,

    /// Overlay width in pixels
    #[arg(long, default_value_t = DEFAULT_WINDOW_WIDTH)]
    pub width: f32,

    /// Overlay height in pixels
    #[arg(long, default_value_t = DEFAULT_WINDOW_HEIGHT)]
    pub height: f32,

    /// Preset window position
    #[arg(long, value_enum, default_value_t = Position::Bottom)]
    pub position: Position,

    /// Manual center X in monitor coordinates (requires --y, overrides --position)
    #[arg(long, requires = "y")]
    pub x: Option<f32>,

    /// Manual center Y in monitor coordinates (requires --x, overrides --position)
    #[arg(long, requires = "x")]
    pub y: Option<f32>,

    /// Maximum cards shown at once (capped at 15, even values reduced by one)
    #[arg(long, default_value_t = DEFAULT_VISIBLE_CARDS)]
    pub visible_cards: usize,

    /// Disable wallpaper auto-preview while browsing
    #[arg(long)]
    pub no_preview: bool,

    /// Seconds to stay on a card before auto-preview applies
    #[arg(long, default_value_t = crate::preview::DEFAULT_PREVIEW_DELAY)]
    pub preview_delay: f32,

    /// Force a transparent window background
    #[arg(long, conflicts_with = "opaque")]
    pub transparent: bool,

    /// Force an opaque window background
    #[arg(long)]
    pub opaque: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Position {
    Bottom,
    Top,
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Position::Bottom => "bottom",
            Position::Top => "top",
            Position::Center => "center",
            Position::TopLeft => "top-left",
            Position::TopRight => "top-right",
            Position::BottomLeft => "bottom-left",
            Position::BottomRight => "bottom-right",
        };
        f.write_str(name)
    }
}

impl PickerArgs {
    pub fn directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Explicit transparency override, or `None` to follow the session type.
    pub fn transparency(&self) -> Option<bool> {
        if self.transparent {
            Some(true)
        } else if self.opaque {
            Some(false)
        } else {
            None
        }
    }

    pub fn effective_visible_cards(&self) -> usize {
        let mut cards = self.visible_cards.clamp(1, MAX_VISIBLE_CARDS);
        if cards % 2 == 0 {
            cards -= 1;
        }
        cards
    }
}
