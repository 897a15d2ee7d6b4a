use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::env::Environment;
use crate::{Error, Result};

pub const AUTO_ASPECT_RATIO_FACTOR: f64 = 1.75;
pub const AUTO_SMALL_RATIO_FACTOR: f64 = 0.78;
const AUTO_SQUAREISH_MIN_RATIO: f64 = 0.8;
const AUTO_SQUAREISH_MAX_RATIO: f64 = 1.25;

/// Backend-agnostic placement mode. `Auto` is resolved to a concrete
/// placement before it reaches a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Auto,
    Fill,
    Fit,
    Center,
    Tile,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Auto => "auto",
            Mode::Fill => "fill",
            Mode::Fit => "fit",
            Mode::Center => "center",
            Mode::Tile => "tile",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendSelector {
    Auto,
    Feh,
    Gnome,
}

impl fmt::Display for BackendSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendSelector::Auto => "auto",
            BackendSelector::Feh => "feh",
            BackendSelector::Gnome => "gnome",
        };
        f.write_str(name)
    }
}

/// The wallpaper that was active when it was captured. Reapplied on cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedWallpaper {
    pub backend: String,
    pub path: PathBuf,
    pub mode: Mode,
}

/// Resolves `Mode::Auto` to a concrete placement by comparing the image's
/// native size against the monitor. Unknown sizes fall back to `Fill`.
pub fn resolve_auto_mode(native: Option<(u32, u32)>, screen: (u32, u32)) -> Mode {
    let Some((image_width, image_height)) = native else {
        return Mode::Fill;
    };
    let (screen_width, screen_height) = screen;
    if image_width == 0 || image_height == 0 || screen_width == 0 || screen_height == 0 {
        return Mode::Fill;
    }

    let width_ratio = f64::from(image_width) / f64::from(screen_width);
    let height_ratio = f64::from(image_height) / f64::from(screen_height);

    let orientation_mismatch = (screen_width >= screen_height) != (image_width >= image_height);

    let screen_ratio = f64::from(screen_width) / f64::from(screen_height);
    let image_ratio = f64::from(image_width) / f64::from(image_height);
    let ratio_factor = (screen_ratio / image_ratio).max(image_ratio / screen_ratio);
    let strong_aspect_mismatch = ratio_factor >= AUTO_ASPECT_RATIO_FACTOR;
    let squareish = (AUTO_SQUAREISH_MIN_RATIO..=AUTO_SQUAREISH_MAX_RATIO).contains(&image_ratio);
    let larger_than_screen = width_ratio >= 1.0 && height_ratio >= 1.0;

    if width_ratio <= AUTO_SMALL_RATIO_FACTOR && height_ratio <= AUTO_SMALL_RATIO_FACTOR {
        return Mode::Center;
    }
    if squareish && larger_than_screen {
        return Mode::Fit;
    }
    if orientation_mismatch || strong_aspect_mismatch {
        return Mode::Center;
    }
    Mode::Fill
}

/// Uniform gateway over the concrete wallpaper mechanisms. The closed set of
/// implementations below is what `select_backend` hands out; tests substitute
/// their own recording implementation through this trait.
pub trait WallpaperBackend: Send + Sync {
    fn id(&self) -> &'static str;

    fn available(&self, env: &Environment) -> bool;

    /// Applies and persists `path` as the desktop background.
    fn apply(&self, path: &Path, mode: Mode) -> Result<()>;

    /// Applies `path` without persisting it, for transient browsing previews.
    fn preview(&self, path: &Path, mode: Mode) -> Result<()> {
        self.apply(path, mode)
    }

    /// Reads back the currently active wallpaper, if the mechanism can.
    fn capture_current(&self) -> Option<CapturedWallpaper>;

    fn restore(&self, captured: &CapturedWallpaper) -> Result<()> {
        if !captured.path.exists() {
            return Err(Error::Backend(format!(
                "wallpaper not found: {}",
                captured.path.display()
            )));
        }
        self.preview(&captured.path, captured.mode)
    }
}

fn run_command(program: &str, args: &[&str]) -> Result<()> {
    debug!("running {} {}", program, args.join(" "));
    let status = Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|err| Error::Backend(format!("{program}: {err}")))?;

    if !status.success() {
        return Err(Error::Backend(format!(
            "{program} {} exited with {status}",
            args.join(" ")
        )));
    }
    Ok(())
}

fn read_command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Generic external-command mechanism: drives `feh` on X11 sessions.
pub struct FehBackend;

impl FehBackend {
    fn mode_flag(mode: Mode) -> &'static str {
        match mode {
            Mode::Fit => "--bg-max",
            Mode::Center => "--bg-center",
            Mode::Tile => "--bg-tile",
            Mode::Auto | Mode::Fill => "--bg-fill",
        }
    }

    fn fehbg_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".fehbg"))
    }

    fn parse_fehbg(contents: &str) -> Option<CapturedWallpaper> {
        // ~/.fehbg is a small shell script; the last feh invocation in it is
        // the one that produced the current background.
        let mut last_line: Option<Vec<String>> = None;
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let parts: Vec<String> = trimmed
                .split_whitespace()
                .map(|part| part.trim_matches(|c| c == '\'' || c == '"').to_string())
                .collect();
            let is_feh = parts
                .first()
                .map(|arg| Path::new(arg).file_name() == Some(OsStr::new("feh")))
                .unwrap_or(false);
            if is_feh {
                last_line = Some(parts);
            }
        }

        let parts = last_line?;
        let image = parts
            .iter()
            .skip(1)
            .filter(|arg| !arg.starts_with('-'))
            .next_back()?;

        let mut mode = Mode::Fill;
        for arg in &parts {
            match arg.as_str() {
                "--bg-max" | "--bg-scale" => mode = Mode::Fit,
                "--bg-center" => mode = Mode::Center,
                "--bg-tile" => mode = Mode::Tile,
                "--bg-fill" => mode = Mode::Fill,
                _ => {}
            }
        }

        Some(CapturedWallpaper {
            backend: "feh".to_string(),
            path: PathBuf::from(image),
            mode,
        })
    }
}

impl WallpaperBackend for FehBackend {
    fn id(&self) -> &'static str {
        "feh"
    }

    fn available(&self, env: &Environment) -> bool {
        env.has_command("feh") && env.is_x11()
    }

    fn apply(&self, path: &Path, mode: Mode) -> Result<()> {
        let path = path.to_string_lossy();
        run_command("feh", &[Self::mode_flag(mode), path.as_ref()])
    }

    fn preview(&self, path: &Path, mode: Mode) -> Result<()> {
        // --no-fehbg keeps transient previews out of ~/.fehbg.
        let path = path.to_string_lossy();
        run_command("feh", &["--no-fehbg", Self::mode_flag(mode), path.as_ref()])
    }

    fn capture_current(&self) -> Option<CapturedWallpaper> {
        let contents = fs::read_to_string(Self::fehbg_path()?).ok()?;
        Self::parse_fehbg(&contents)
    }
}

const GNOME_BACKGROUND_SCHEMA: &str = "org.gnome.desktop.background";

/// Desktop-settings mechanism: writes the GNOME background properties.
pub struct GnomeBackend;

impl GnomeBackend {
    fn picture_option(mode: Mode) -> &'static str {
        match mode {
            Mode::Fit => "scaled",
            Mode::Center => "centered",
            Mode::Tile => "wallpaper",
            Mode::Auto | Mode::Fill => "zoom",
        }
    }

    fn mode_from_picture_option(option: &str) -> Mode {
        match option {
            "scaled" => Mode::Fit,
            "centered" => Mode::Center,
            "wallpaper" => Mode::Tile,
            _ => Mode::Fill,
        }
    }

    fn read_setting(key: &str) -> Option<String> {
        let value = read_command_output("gsettings", &["get", GNOME_BACKGROUND_SCHEMA, key])?;
        Some(
            value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .unwrap_or(&value)
                .to_string(),
        )
    }
}

impl WallpaperBackend for GnomeBackend {
    fn id(&self) -> &'static str {
        "gnome"
    }

    fn available(&self, env: &Environment) -> bool {
        env.has_command("gsettings") && env.is_gnome_session()
    }

    fn apply(&self, path: &Path, mode: Mode) -> Result<()> {
        let uri = file_uri(path);
        run_command(
            "gsettings",
            &[
                "set",
                GNOME_BACKGROUND_SCHEMA,
                "picture-options",
                Self::picture_option(mode),
            ],
        )?;
        run_command(
            "gsettings",
            &["set", GNOME_BACKGROUND_SCHEMA, "picture-uri", &uri],
        )?;
        run_command(
            "gsettings",
            &["set", GNOME_BACKGROUND_SCHEMA, "picture-uri-dark", &uri],
        )
    }

    fn capture_current(&self) -> Option<CapturedWallpaper> {
        let uri = Self::read_setting("picture-uri")?;
        let path = path_from_uri(&uri)?;
        let mode = Self::read_setting("picture-options")
            .map(|option| Self::mode_from_picture_option(&option))
            .unwrap_or(Mode::Fill);

        Some(CapturedWallpaper {
            backend: "gnome".to_string(),
            path,
            mode,
        })
    }
}

fn file_uri(path: &Path) -> String {
    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.to_string_lossy())
}

pub fn path_from_uri(uri: &str) -> Option<PathBuf> {
    let raw = uri.strip_prefix("file://")?;
    if raw.is_empty() {
        return None;
    }
    Some(PathBuf::from(percent_decode(raw)))
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            if let Ok(value) = u8::from_str_radix(&raw[i + 1..i + 3], 16) {
                decoded.push(value);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

pub fn backend_by_id(id: &str) -> Option<Box<dyn WallpaperBackend>> {
    match id {
        "feh" => Some(Box::new(FehBackend)),
        "gnome" => Some(Box::new(GnomeBackend)),
        _ => None,
    }
}

fn builtin_backends() -> Vec<Box<dyn WallpaperBackend>> {
    // Fixed preference order for auto-detection.
    vec![Box::new(GnomeBackend), Box::new(FehBackend)]
}

/// Picks the backend for this run. An explicit selector must be available or
/// startup fails; `auto` walks the preference order.
pub fn select_backend(
    env: &Environment,
    selector: BackendSelector,
) -> Result<Box<dyn WallpaperBackend>> {
    match selector {
        BackendSelector::Auto => builtin_backends()
            .into_iter()
            .find(|backend| backend.available(env))
            .ok_or_else(|| {
                Error::NoBackend("no wallpaper mechanism found for this session".to_string())
            }),
        BackendSelector::Feh | BackendSelector::Gnome => {
            let backend: Box<dyn WallpaperBackend> = match selector {
                BackendSelector::Feh => Box::new(FehBackend),
                _ => Box::new(GnomeBackend),
            };
            if backend.available(env) {
                Ok(backend)
            } else {
                Err(Error::BackendUnavailable(selector.to_string()))
            }
        }
    }
}

/// Human-readable detection report for the `diagnose` subcommand.
pub fn diagnostics(env: &Environment) -> String {
    let mut lines = Vec::new();
    lines.push("Environment:".to_string());
    lines.push(format!(
        "  session_type: {}",
        or_unknown(&env.session_type)
    ));
    lines.push(format!(
        "  current_desktop: {}",
        or_unknown(&env.current_desktop)
    ));
    lines.push(format!(
        "  desktop_session: {}",
        or_unknown(&env.desktop_session)
    ));
    lines.push(format!(
        "  wayland_display: {}",
        if env.wayland_display.is_empty() {
            "-"
        } else {
            env.wayland_display.as_str()
        }
    ));
    lines.push(format!(
        "  x_display: {}",
        if env.x_display.is_empty() {
            "-"
        } else {
            env.x_display.as_str()
        }
    ));
    let mut commands: Vec<&str> = env.commands.iter().map(String::as_str).collect();
    commands.sort_unstable();
    lines.push(format!(
        "  commands: {}",
        if commands.is_empty() {
            "(none detected)".to_string()
        } else {
            commands.join(", ")
        }
    ));
    lines.push(String::new());

    lines.push("Backends:".to_string());
    for backend in builtin_backends() {
        let status = if backend.available(env) {
            "available"
        } else {
            "unavailable"
        };
        lines.push(format!("  {}: {}", backend.id(), status));
    }
    lines.push(String::new());

    match select_backend(env, BackendSelector::Auto) {
        Ok(backend) => lines.push(format!("Auto backend: {}", backend.id())),
        Err(err) => lines.push(format!("Auto backend: none ({err})")),
    }

    lines.join("\n")
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}
