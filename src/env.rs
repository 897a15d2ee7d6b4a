use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

/// Commands probed for on PATH at startup.
pub const KNOWN_COMMANDS: &[&str] = &["feh", "gsettings"];

/// Snapshot of the desktop environment taken once at startup.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub session_type: String,
    pub desktop_session: String,
    pub current_desktop: String,
    pub wayland_display: String,
    pub x_display: String,
    pub commands: HashSet<String>,
}

impl Environment {
    pub fn detect() -> Self {
        let commands = KNOWN_COMMANDS
            .iter()
            .filter(|name| command_on_path(name))
            .map(|name| name.to_string())
            .collect();

        Self {
            session_type: env_value("XDG_SESSION_TYPE").to_lowercase(),
            desktop_session: env_value("DESKTOP_SESSION"),
            current_desktop: env_value("XDG_CURRENT_DESKTOP"),
            wayland_display: env_value("WAYLAND_DISPLAY"),
            x_display: env_value("DISPLAY"),
            commands,
        }
    }

    /// Builds a synthetic environment, mostly for tests.
    pub fn with_commands<I: IntoIterator<Item = S>, S: Into<String>>(commands: I) -> Self {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains(name)
    }

    pub fn is_wayland(&self) -> bool {
        self.session_type == "wayland" || !self.wayland_display.is_empty()
    }

    pub fn is_x11(&self) -> bool {
        self.session_type == "x11" || !self.x_display.is_empty()
    }

    pub fn is_gnome_session(&self) -> bool {
        let session = format!("{}:{}", self.current_desktop, self.desktop_session).to_lowercase();
        session.contains("gnome") || session.contains("ubuntu")
    }
}

fn env_value(name: &str) -> String {
    env::var(name).unwrap_or_default().trim().to_string()
}

fn command_on_path(name: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(name);
        candidate.is_file() && is_executable(&candidate)
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}
