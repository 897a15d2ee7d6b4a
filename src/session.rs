use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::backend::{self, CapturedWallpaper, Mode, WallpaperBackend};
use crate::files::{self, ImageEntry};
use crate::navigation::NavigationState;
use crate::preview::{PreviewDebouncer, PreviewRunner};
use crate::state::{self, SavedSelection};
use crate::thumbs::ThumbnailCache;
use crate::{Error, Result};

/// Terminal value of a session. Produced at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResult {
    Confirmed(PathBuf),
    Cancelled,
    Unchanged,
}

/// Discrete input collected by the host loop for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInput {
    /// Held navigation direction: -1, 0 or 1.
    pub direction: i8,
    pub confirm: bool,
    pub cancel: bool,
    pub refresh: bool,
}

#[derive(Debug, Default)]
pub struct FrameOutcome {
    pub result: Option<SessionResult>,
    /// Signed slide delta applied this frame, for the host's animation.
    pub moved: i32,
}

/// One interactive selection run: Browsing until a confirm or cancel.
///
/// Owns the navigation and debounce state exclusively; the thumbnail cache is
/// passed in per frame because it outlives any one session. The wallpaper
/// active at construction time is captured up front as the restore target.
pub struct SelectionSession {
    directory: PathBuf,
    backend: Arc<dyn WallpaperBackend>,
    nav: NavigationState,
    debouncer: PreviewDebouncer,
    runner: PreviewRunner,
    mode: Mode,
    screen: Option<(u32, u32)>,
    restore_target: Option<CapturedWallpaper>,
    state_file: Option<PathBuf>,
    last_error: Option<String>,
    finished: bool,
}

impl SelectionSession {
    pub fn new(
        directory: PathBuf,
        backend: Arc<dyn WallpaperBackend>,
        mode: Mode,
        preview_delay: Duration,
        auto_preview: bool,
        state_file: Option<PathBuf>,
    ) -> Result<Self> {
        if !directory.is_dir() {
            return Err(Error::InvalidDirectory(directory));
        }

        // Capture before any mutation; this is what cancel rolls back to.
        let restore_target = backend.capture_current();

        let entries = files::list_images(&directory);
        info!(
            "session over {} images in {}",
            entries.len(),
            directory.display()
        );

        let mut nav = NavigationState::new(entries);
        if let Some(target) = &restore_target {
            if let Some(index) = nav
                .entries()
                .iter()
                .position(|entry| entry.path == target.path)
            {
                nav.select(index);
            }
        }

        Ok(Self {
            directory,
            backend,
            nav,
            debouncer: PreviewDebouncer::new(preview_delay, auto_preview),
            runner: PreviewRunner::new()?,
            mode,
            screen: None,
            restore_target,
            state_file,
            last_error: None,
            finished: false,
        })
    }

    pub fn nav(&self) -> &NavigationState {
        &self.nav
    }

    pub fn backend_id(&self) -> &'static str {
        self.backend.id()
    }

    pub fn restore_target(&self) -> Option<&CapturedWallpaper> {
        self.restore_target.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Monitor size, once the host knows it. Feeds auto-mode resolution.
    pub fn set_screen(&mut self, width: u32, height: u32) {
        self.screen = Some((width, height));
    }

    /// Changes the placement mode for subsequent applies. Accepted while
    /// Browsing; the debounce forgets its last target so the next settle
    /// reapplies with the new mode.
    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            self.mode = mode;
            self.debouncer.reset();
        }
    }

    /// Swaps the apply mechanism while Browsing. The restore target captured
    /// at startup is kept; it replays fine through any backend.
    pub fn set_backend(&mut self, backend: Arc<dyn WallpaperBackend>) {
        self.backend = backend;
        self.debouncer.reset();
    }

    /// Advances the session by one polled frame.
    pub fn frame(
        &mut self,
        input: FrameInput,
        now: Instant,
        dt: f32,
        cache: &mut ThumbnailCache,
    ) -> FrameOutcome {
        if self.finished {
            return FrameOutcome::default();
        }

        if input.refresh {
            self.refresh(cache);
        }

        let moved = self.nav.poll(input.direction, dt);
        if (input.direction != 0 || moved != 0) && !self.nav.is_empty() {
            if let Some(index) = self.nav.selected() {
                // While a key is held the selection is not stationary; keep
                // restarting the settle timer.
                self.debouncer.on_navigate(index, now);
            }
        }

        if input.confirm {
            if let Some(result) = self.confirm(cache) {
                self.finished = true;
                return FrameOutcome {
                    result: Some(result),
                    moved,
                };
            }
        }

        if input.cancel {
            let result = self.cancel();
            self.finished = true;
            return FrameOutcome {
                result: Some(result),
                moved,
            };
        }

        if input.direction == 0 {
            if let Some(index) = self.debouncer.tick(now) {
                self.auto_preview(index, cache);
            }
        }

        FrameOutcome {
            result: None,
            moved,
        }
    }

    fn auto_preview(&mut self, index: usize, cache: &mut ThumbnailCache) {
        let Some(entry) = self.nav.entries().get(index).cloned() else {
            return;
        };
        let resolved = self.resolve_mode(&entry, cache);
        let backend = Arc::clone(&self.backend);
        let path = entry.path;
        self.runner.submit(move || {
            // Preview failures never interrupt browsing.
            if let Err(err) = backend.preview(&path, resolved) {
                warn!("auto-preview failed for {}: {err}", path.display());
            }
        });
        self.debouncer.mark_applied(index);
    }

    /// Final synchronous apply, bypassing the debounce. A failure surfaces an
    /// error and leaves the session open for retry or cancel.
    fn confirm(&mut self, cache: &mut ThumbnailCache) -> Option<SessionResult> {
        let entry = self.nav.current()?.clone();
        let resolved = self.resolve_mode(&entry, cache);

        // Let an in-flight preview finish first so it cannot land after the
        // final apply.
        self.runner.cancel_pending();
        self.runner.wait_idle();

        match self.backend.apply(&entry.path, resolved) {
            Ok(()) => {
                if let Some(state_file) = &self.state_file {
                    let record =
                        SavedSelection::new(entry.path.clone(), resolved, self.backend.id());
                    if let Err(err) = state::save_selection(state_file, &record) {
                        warn!("failed to persist confirmed selection: {err}");
                    }
                }
                info!("confirmed {}", entry.path.display());
                Some(SessionResult::Confirmed(entry.path))
            }
            Err(err) => {
                warn!("confirm apply failed: {err}");
                self.last_error = Some(err.to_string());
                None
            }
        }
    }

    fn cancel(&mut self) -> SessionResult {
        self.runner.cancel_pending();
        self.runner.wait_idle();

        match &self.restore_target {
            Some(target) => {
                if let Err(err) = self.backend.restore(target) {
                    warn!("failed to restore previous wallpaper: {err}");
                }
                SessionResult::Cancelled
            }
            // Nothing was captured, so there is nothing to roll back.
            None => SessionResult::Unchanged,
        }
    }

    fn refresh(&mut self, cache: &mut ThumbnailCache) {
        let entries = files::list_images(&self.directory);
        for old in self.nav.entries() {
            if !entries.contains(old) {
                cache.invalidate(old);
            }
        }
        cache.reset();
        self.nav.refresh(entries);
        self.debouncer.reset();
        self.last_error = None;
    }

    fn resolve_mode(&mut self, entry: &ImageEntry, cache: &mut ThumbnailCache) -> Mode {
        if self.mode != Mode::Auto {
            return self.mode;
        }
        backend::resolve_auto_mode(
            cache.native_dimensions(entry),
            self.screen.unwrap_or((0, 0)),
        )
    }
}
