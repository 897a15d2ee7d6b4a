use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// A candidate wallpaper. Identity is the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub path: PathBuf,
}

impl ImageEntry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext_str| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|&valid_ext| valid_ext.eq_ignore_ascii_case(ext_str))
        })
        .unwrap_or(false)
}

/// Lists the images directly inside `root`, ordered lexicographically by
/// lowercased file name so repeated scans of an unchanged directory agree.
pub fn list_images(root: &Path) -> Vec<ImageEntry> {
    let mut entries: Vec<ImageEntry> = WalkDir::new(root)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_image_file(e.path()))
        .map(|e| ImageEntry::new(e.into_path()))
        .collect();

    entries.sort_by_cached_key(|entry| entry.file_name().to_lowercase());
    entries
}
