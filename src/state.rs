use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::backend::Mode;
use crate::{Error, Result};

/// Last confirmed selection, written on confirm and replayed by `restore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSelection {
    pub path: PathBuf,
    pub mode: Mode,
    pub backend: String,
    pub timestamp: String,
}

impl SavedSelection {
    pub fn new(path: PathBuf, mode: Mode, backend: &str) -> Self {
        Self {
            path,
            mode,
            backend: backend.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub fn state_file_path() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
        .map(|dir| dir.join("wallpaper-carousel").join("last_selection.json"))
}

/// Writes the record with a whole-file replace so a concurrent `restore`
/// never reads a torn file.
pub fn save_selection(path: &Path, selection: &SavedSelection) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let payload = serde_json::to_string_pretty(selection)?;
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, payload.as_bytes())?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_selection(path: &Path) -> Result<SavedSelection> {
    let raw = fs::read_to_string(path).map_err(|_| Error::NoSavedSelection)?;
    serde_json::from_str(&raw).map_err(|err| {
        warn!("unreadable selection state at {}: {err}", path.display());
        Error::NoSavedSelection
    })
}
