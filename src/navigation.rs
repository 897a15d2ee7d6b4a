use log::info;

use crate::files::ImageEntry;

pub const HOLD_REPEAT_DELAY: f32 = 0.22;
pub const HOLD_REPEAT_INTERVAL_START: f32 = 0.09;
pub const HOLD_REPEAT_INTERVAL_FLOOR: f32 = 0.035;
pub const HOLD_ACCEL_RAMP: f32 = 2.0;
/// Hard bound on slides applied in one poll, so thumbnail prefetch stays
/// coherent no matter how long a key has been held.
pub const MAX_STEPS_PER_POLL: i32 = 3;

/// Selection index over the candidate sequence, with wraparound and
/// accelerating held-key repeat. Polled once per frame with the currently
/// held direction.
pub struct NavigationState {
    entries: Vec<ImageEntry>,
    selected: usize,
    held_direction: i8,
    hold_elapsed: f32,
    repeat_elapsed: f32,
}

impl NavigationState {
    pub fn new(entries: Vec<ImageEntry>) -> Self {
        Self {
            entries,
            selected: 0,
            held_direction: 0,
            hold_elapsed: 0.0,
            repeat_elapsed: 0.0,
        }
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current index, or `None` for an empty sequence.
    pub fn selected(&self) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.selected)
        }
    }

    pub fn current(&self) -> Option<&ImageEntry> {
        self.entries.get(self.selected)
    }

    pub fn select(&mut self, index: usize) {
        if index < self.entries.len() {
            self.selected = index;
        }
    }

    /// Advances the selection for this frame. `direction_down` is the held
    /// navigation direction (-1, 0, 1); `dt` the frame time in seconds.
    /// Returns the signed slide delta that was applied.
    pub fn poll(&mut self, direction_down: i8, dt: f32) -> i32 {
        if self.entries.len() < 2 || direction_down == 0 {
            self.release();
            return 0;
        }

        let mut steps = 0i32;
        if direction_down != self.held_direction {
            // Fresh press (or direction flip): one immediate step.
            self.held_direction = direction_down;
            self.hold_elapsed = 0.0;
            self.repeat_elapsed = 0.0;
            steps = 1;
        } else {
            self.hold_elapsed += dt;
            if self.hold_elapsed >= HOLD_REPEAT_DELAY {
                self.repeat_elapsed += dt;
                let interval = self.repeat_interval();
                while self.repeat_elapsed >= interval && steps < MAX_STEPS_PER_POLL {
                    steps += 1;
                    self.repeat_elapsed -= interval;
                }
                if steps == MAX_STEPS_PER_POLL {
                    // Drop any backlog so a frame stall cannot burst later.
                    self.repeat_elapsed = self.repeat_elapsed.min(interval);
                }
            }
        }

        let delta = steps * i32::from(direction_down);
        self.apply_delta(delta);
        delta
    }

    // Repeat interval shrinks linearly with hold duration down to a floor.
    fn repeat_interval(&self) -> f32 {
        let held = (self.hold_elapsed - HOLD_REPEAT_DELAY).max(0.0);
        let t = (held / HOLD_ACCEL_RAMP).min(1.0);
        HOLD_REPEAT_INTERVAL_START + (HOLD_REPEAT_INTERVAL_FLOOR - HOLD_REPEAT_INTERVAL_START) * t
    }

    fn apply_delta(&mut self, delta: i32) {
        if self.entries.is_empty() || delta == 0 {
            return;
        }
        let len = self.entries.len() as i64;
        self.selected = (self.selected as i64 + i64::from(delta)).rem_euclid(len) as usize;
    }

    fn release(&mut self) {
        self.held_direction = 0;
        self.hold_elapsed = 0.0;
        self.repeat_elapsed = 0.0;
    }

    /// Swaps in a freshly scanned sequence. The selection follows its path if
    /// it survived the rescan, otherwise falls back to the start.
    pub fn refresh(&mut self, entries: Vec<ImageEntry>) {
        let previous = self.current().map(|entry| entry.path.clone());
        self.entries = entries;
        self.selected = previous
            .and_then(|path| self.entries.iter().position(|entry| entry.path == path))
            .unwrap_or(0);
        self.release();
        info!("navigation refreshed: {} images", self.entries.len());
    }
}
