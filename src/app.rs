use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use eframe::egui::{
    self, Align2, Color32, ColorImage, FontId, Pos2, Rect, Rounding, TextureHandle,
    TextureOptions, Vec2,
};
use log::info;

use crate::cli::{PickerArgs, Position};
use crate::files::ImageEntry;
use crate::session::{FrameInput, SelectionSession, SessionResult};
use crate::thumbs::{ThumbStatus, ThumbnailCache};

const PANEL_COLOR: Color32 = Color32::from_rgba_premultiplied(16, 18, 22, 235);
const DEPTH_POINTS: [(f32, f32); 4] = [(0.0, 1.0), (1.0, 0.76), (2.0, 0.56), (3.0, 0.42)];
const ALPHA_POINTS: [(f32, f32); 4] = [(0.0, 255.0), (1.0, 205.0), (2.0, 155.0), (3.0, 100.0)];
const ANIMATION_RETURN: f32 = 0.24;

/// The overlay window hosting one selection session. Polls input once per
/// frame, feeds the session, and draws the carousel from whatever the
/// thumbnail cache has ready.
pub struct PickerApp {
    session: SelectionSession,
    cache: ThumbnailCache,
    args: PickerArgs,
    visible_cards: usize,
    transparent: bool,
    textures: HashMap<PathBuf, TextureHandle>,
    animation_offset: f32,
    placed: bool,
    result: Option<SessionResult>,
}

impl PickerApp {
    pub fn new(
        session: SelectionSession,
        cache: ThumbnailCache,
        args: PickerArgs,
        transparent: bool,
    ) -> Self {
        let visible_cards = args.effective_visible_cards();
        Self {
            session,
            cache,
            args,
            visible_cards,
            transparent,
            textures: HashMap::new(),
            animation_offset: 0.0,
            placed: false,
            result: None,
        }
    }

    fn poll_input(&self, ctx: &egui::Context) -> FrameInput {
        ctx.input(|i| {
            let right = i.key_down(egui::Key::ArrowRight)
                || i.key_down(egui::Key::D)
                || i.key_down(egui::Key::L);
            let left = i.key_down(egui::Key::ArrowLeft)
                || i.key_down(egui::Key::A)
                || i.key_down(egui::Key::H);
            let direction = match (right, left) {
                (true, false) => 1,
                (false, true) => -1,
                _ => 0,
            };

            FrameInput {
                direction,
                confirm: i.key_pressed(egui::Key::Enter),
                cancel: i.key_pressed(egui::Key::Escape)
                    || i.key_pressed(egui::Key::Q)
                    || i.viewport().close_requested(),
                refresh: i.key_pressed(egui::Key::R),
            }
        })
    }

    fn upload_completed(&mut self, ctx: &egui::Context) {
        for (path, status) in self.cache.poll() {
            if let ThumbStatus::Ready(pixels) = status {
                let size = [pixels.width() as usize, pixels.height() as usize];
                let image = ColorImage::from_rgba_unmultiplied(size, pixels.as_raw());
                let name = format!("thumb:{}", path.display());
                self.textures
                    .insert(path, ctx.load_texture(name, image, TextureOptions::LINEAR));
            }
        }
    }

    /// Requests thumbnails a couple of slides beyond the visible span so
    /// scrolling lands on warm entries.
    fn prefetch(&mut self) {
        let nav = self.session.nav();
        let len = nav.len();
        let Some(selected) = nav.selected() else {
            return;
        };

        let side = self.visible_cards / 2;
        let span = (side + 2).min(len - 1) as i64;
        let wanted: Vec<ImageEntry> = (-span..=span)
            .map(|rel| {
                let idx = (selected as i64 + rel).rem_euclid(len as i64) as usize;
                nav.entries()[idx].clone()
            })
            .collect();
        for entry in &wanted {
            self.cache.get_or_generate(entry);
        }
    }

    fn place_window(&self, ctx: &egui::Context, monitor: Vec2) {
        let width = self.args.width;
        let height = self.args.height;

        let edge_x = (monitor.x * 0.03).max(32.0);
        let edge_y = (monitor.y * 0.06).max(48.0);

        let mut min_x = edge_x;
        let mut max_x = monitor.x - width - edge_x;
        let mut min_y = edge_y;
        let mut max_y = monitor.y - height - edge_y;
        if min_x > max_x {
            min_x = 0.0;
            max_x = (monitor.x - width).max(0.0);
        }
        if min_y > max_y {
            min_y = 0.0;
            max_y = (monitor.y - height).max(0.0);
        }

        let (mut x, mut y) = if let (Some(cx), Some(cy)) = (self.args.x, self.args.y) {
            (cx - width * 0.5, cy - height * 0.5)
        } else {
            let mut x = (monitor.x - width) * 0.5;
            let mut y = (monitor.y - height) * 0.5;
            match self.args.position {
                Position::Bottom => y = max_y,
                Position::Top => y = min_y,
                Position::Center => {}
                Position::TopLeft => {
                    x = min_x;
                    y = min_y;
                }
                Position::TopRight => {
                    x = max_x;
                    y = min_y;
                }
                Position::BottomLeft => {
                    x = min_x;
                    y = max_y;
                }
                Position::BottomRight => {
                    x = max_x;
                    y = max_y;
                }
            }
            (x, y)
        };

        x = x.clamp(min_x, max_x.max(min_x));
        y = y.clamp(min_y, max_y.max(min_y));
        ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(Pos2::new(x, y)));
    }

    fn draw_carousel(&self, ui: &mut egui::Ui) {
        let panel = ui.max_rect();
        let nav = self.session.nav();

        if nav.is_empty() {
            ui.centered_and_justified(|ui| {
                ui.label("No images found here. Press R to rescan, Esc to quit.");
            });
            return;
        }

        let len = nav.len();
        let selected = nav.selected().unwrap_or(0);
        let visible = {
            let mut v = self.visible_cards.min(len);
            if v % 2 == 0 {
                v -= 1;
            }
            v.max(1)
        };
        let side = visible / 2;
        let span = (side + 2).min(len - 1) as i64;

        // Wraparound can put the same entry at two relative positions; keep
        // whichever is closer to the center.
        let mut closest: HashMap<usize, (f32, f32)> = HashMap::new();
        for rel in -span..=span {
            let idx = (selected as i64 + rel).rem_euclid(len as i64) as usize;
            let pos = rel as f32 + self.animation_offset;
            let depth = pos.abs();
            let keep = match closest.get(&idx) {
                Some((best, _)) => depth < *best,
                None => true,
            };
            if keep {
                closest.insert(idx, (depth, pos));
            }
        }

        let mut ranked: Vec<(f32, usize, f32)> = closest
            .into_iter()
            .map(|(idx, (depth, pos))| (depth, idx, pos))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.truncate(visible);
        // Far cards first so near ones paint over them.
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

        for (depth, idx, pos) in ranked {
            self.draw_card(ui, panel, &nav.entries()[idx], depth, pos);
        }

        if let Some(err) = self.session.last_error() {
            ui.painter().text(
                Pos2::new(panel.center().x, panel.top() + 14.0),
                Align2::CENTER_TOP,
                format!("apply failed: {err} (Enter retries, Esc cancels)"),
                FontId::default(),
                Color32::LIGHT_RED,
            );
        }
    }

    fn draw_card(&self, ui: &egui::Ui, panel: Rect, entry: &ImageEntry, depth: f32, pos: f32) {
        let painter = ui.painter();

        let scale = sample_curve(depth, &DEPTH_POINTS);
        let card_w = panel.width() * 0.35 * scale;
        let card_h = panel.height() * 0.78 * scale;
        let gap_points = [
            (0.0, 0.0),
            (1.0, panel.width() * 0.24),
            (2.0, panel.width() * 0.4),
            (3.0, panel.width() * 0.52),
        ];
        let offset_x = sample_curve(depth, &gap_points) * if pos >= 0.0 { 1.0 } else { -1.0 };
        let center = Pos2::new(
            panel.center().x + offset_x,
            panel.top() + panel.height() * 0.52,
        );
        let card = Rect::from_center_size(center, Vec2::new(card_w, card_h));
        let alpha = sample_curve(depth, &ALPHA_POINTS).clamp(0.0, 255.0) as u8;
        let selected = depth < 0.32;

        painter.rect_filled(
            card.translate(Vec2::new(4.0, 8.0)),
            Rounding::same(8.0),
            Color32::from_black_alpha(130),
        );
        let frame_color = if selected {
            Color32::from_rgba_unmultiplied(245, 245, 245, 245)
        } else {
            Color32::from_rgba_unmultiplied(205, 205, 205, 215)
        };
        painter.rect_filled(card, Rounding::same(8.0), frame_color);

        let inner = card.shrink(5.0);
        painter.rect_filled(
            inner,
            Rounding::same(6.0),
            Color32::from_rgba_unmultiplied(10, 12, 15, alpha),
        );

        if let Some(texture) = self.textures.get(&entry.path) {
            let tint = Color32::from_rgba_unmultiplied(255, 255, 255, alpha);
            let dest = fit_rect(texture.size_vec2(), inner);
            painter.image(
                texture.id(),
                dest,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                tint,
            );
            return;
        }

        let failed = self
            .cache
            .status(entry)
            .map(|status| status.is_failed())
            .unwrap_or(false);
        if failed {
            // Crossed-out card for an image that would not decode.
            let stroke = egui::Stroke::new(1.5, Color32::from_rgba_unmultiplied(180, 180, 180, 200));
            let pad = inner.shrink(10.0);
            painter.line_segment([pad.left_top(), pad.right_bottom()], stroke);
            painter.line_segment([pad.left_bottom(), pad.right_top()], stroke);
        } else {
            painter.rect_filled(
                inner,
                Rounding::same(6.0),
                Color32::from_rgba_unmultiplied(50, 55, 66, alpha),
            );
        }
    }
}

impl eframe::App for PickerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(monitor) = ctx.input(|i| i.viewport().monitor_size) {
            if monitor.x > 0.0 && monitor.y > 0.0 {
                self.session.set_screen(monitor.x as u32, monitor.y as u32);
                if !self.placed {
                    self.place_window(ctx, monitor);
                    self.placed = true;
                }
            }
        }

        self.upload_completed(ctx);

        if self.result.is_none() {
            let input = self.poll_input(ctx);
            if input.refresh {
                self.textures.clear();
            }
            let dt = ctx.input(|i| i.stable_dt).min(0.1);
            let outcome = self.session.frame(input, Instant::now(), dt, &mut self.cache);

            self.animation_offset =
                (self.animation_offset + outcome.moved as f32).clamp(-3.0, 3.0);

            if let Some(result) = outcome.result {
                match &result {
                    SessionResult::Confirmed(path) => info!("session confirmed {}", path.display()),
                    SessionResult::Cancelled => info!("session cancelled, wallpaper restored"),
                    SessionResult::Unchanged => info!("session closed, wallpaper unchanged"),
                }
                self.result = Some(result);
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }

            self.prefetch();
        }

        self.animation_offset = lerp(self.animation_offset, 0.0, ANIMATION_RETURN);
        if self.animation_offset.abs() < 0.01 {
            self.animation_offset = 0.0;
        }

        let fill = if self.transparent {
            Color32::TRANSPARENT
        } else {
            PANEL_COLOR
        };
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(fill))
            .show(ctx, |ui| self.draw_carousel(ui));

        // Keep polling: thumbnails and debounce timers progress between
        // input events.
        ctx.request_repaint();
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        if self.transparent {
            [0.0, 0.0, 0.0, 0.0]
        } else {
            let [r, g, b, a] = PANEL_COLOR.to_normalized_gamma_f32();
            [r, g, b, a]
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Piecewise-linear sample of `points` (sorted by x) at `x`.
fn sample_curve(x: f32, points: &[(f32, f32)]) -> f32 {
    if x <= points[0].0 {
        return points[0].1;
    }
    for window in points.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        if x <= x1 {
            if x1 == x0 {
                return y1;
            }
            return lerp(y0, y1, (x - x0) / (x1 - x0));
        }
    }
    points[points.len() - 1].1
}

/// Largest rect with `size`'s aspect ratio centered inside `bounds`.
fn fit_rect(size: Vec2, bounds: Rect) -> Rect {
    if size.x <= 0.0 || size.y <= 0.0 {
        return bounds;
    }
    let scale = (bounds.width() / size.x).min(bounds.height() / size.y);
    Rect::from_center_size(bounds.center(), size * scale)
}
