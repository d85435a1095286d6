use anyhow::Result;
use minifb::{Key, KeyRepeat, MouseMode, Window, WindowOptions};
use std::time::Duration;

use crate::font;
use crate::gaze_source::PointerSlot;
use crate::renderer::{CalibrationView, FrameView, Renderer};
use crate::ttf::FontRenderer;
use crate::types::{InputEvent, Point2, ScreenSize, TrackerStatus};

const BACKGROUND: u32 = 0x14_14_1E;
const GRID: u32 = 0x1E_1E_28;
const WHITE: u32 = 0xFF_FF_FF;
const RED: u32 = 0xFF_00_00;
const DARK_RED: u32 = 0xB4_00_00;
const GOLD: u32 = 0xFF_C8_00;
const ORANGE: u32 = 0xFF_96_00;
const GREEN: u32 = 0x00_FF_00;
const DARK_GREEN: u32 = 0x00_B4_00;
const CROSS_GREEN: u32 = 0x00_96_00;
const LAVENDER: u32 = 0xC8_C8_FF;

/// minifb window drawing the trainer and translating keys into events.
pub struct WindowOutput {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    font: Option<FontRenderer>,
    font_size_pt: f32,
    bitmap_scale: usize,
    show_trail: bool,
    pointer: Option<PointerSlot>,
}

impl WindowOutput {
    pub fn new(title: &str, size: ScreenSize, frame_rate: u32, font_family: &str, font_size_pt: u32) -> Result<Self> {
        let width = size.width.max(1) as usize;
        let height = size.height.max(1) as usize;
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                borderless: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| anyhow::anyhow!("Failed to create window: {}", e))?;

        window.limit_update_rate(Some(Duration::from_secs_f64(1.0 / frame_rate.max(1) as f64)));

        Ok(Self {
            window,
            buffer: vec![BACKGROUND; width * height],
            width,
            height,
            font: FontRenderer::try_load(font_family),
            font_size_pt: font_size_pt as f32,
            bitmap_scale: (font_size_pt as usize / 8).max(2),
            show_trail: true,
            pointer: None,
        })
    }

    /// Publishes the mouse position into `slot` on every event poll.
    pub fn with_pointer(mut self, slot: PointerSlot) -> Self {
        self.pointer = Some(slot);
        self
    }

    pub fn with_trail(mut self, show_trail: bool) -> Self {
        self.show_trail = show_trail;
        self
    }

    fn clear(&mut self) {
        self.buffer.fill(BACKGROUND);
    }

    fn present(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| anyhow::anyhow!("Window update failed: {}", e))
    }

    fn text(&mut self, x: usize, y: usize, text: &str, color: u32) {
        match &self.font {
            Some(fr) => fr.draw_text(&mut self.buffer, self.width, self.height, x, y, text, color, self.font_size_pt),
            None => font::draw_text_line(&mut self.buffer, self.width, self.height, x, y, text, color, self.bitmap_scale),
        }
    }

    fn text_width(&self, text: &str) -> usize {
        match &self.font {
            Some(fr) => fr.measure_width(text, self.font_size_pt),
            None => font::measure_text_width(text, self.bitmap_scale),
        }
    }

    fn line_height(&self) -> usize {
        match &self.font {
            Some(fr) => fr.measure_height(self.font_size_pt) + 8,
            None => font::line_height(self.bitmap_scale) + 6,
        }
    }

    fn put(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.buffer[y as usize * self.width + x as usize] = color;
        }
    }

    fn fill_circle(&mut self, cx: i32, cy: i32, r: i32, color: u32) {
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn ring(&mut self, cx: i32, cy: i32, r: i32, thickness: i32, color: u32) {
        let inner = (r - thickness).max(0);
        for dy in -r..=r {
            for dx in -r..=r {
                let d2 = dx * dx + dy * dy;
                if d2 <= r * r && d2 > inner * inner {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn hline(&mut self, x0: i32, x1: i32, y: i32, thickness: i32, color: u32) {
        for t in 0..thickness {
            for x in x0..=x1 {
                self.put(x, y + t - thickness / 2, color);
            }
        }
    }

    fn vline(&mut self, x: i32, y0: i32, y1: i32, thickness: i32, color: u32) {
        for t in 0..thickness {
            for y in y0..=y1 {
                self.put(x + t - thickness / 2, y, color);
            }
        }
    }

    /// Darkens a rectangle to give text a backdrop.
    fn shade_rect(&mut self, x: usize, y: usize, w: usize, h: usize) {
        for py in y..(y + h).min(self.height) {
            for px in x..(x + w).min(self.width) {
                let idx = py * self.width + px;
                let c = self.buffer[idx];
                let r = ((c >> 16) & 0xFF) * 3 / 10;
                let g = ((c >> 8) & 0xFF) * 3 / 10;
                let b = (c & 0xFF) * 3 / 10;
                self.buffer[idx] = (r << 16) | (g << 8) | b;
            }
        }
    }

    fn draw_grid(&mut self) {
        for x in (0..self.width).step_by(50) {
            for y in 0..self.height {
                self.buffer[y * self.width + x] = GRID;
            }
        }
        for y in (0..self.height).step_by(50) {
            let row = y * self.width;
            self.buffer[row..row + self.width].fill(GRID);
        }
    }

    fn draw_hud(&mut self, frame: &FrameView) {
        let lh = self.line_height();

        let m = &frame.metrics;
        if m.count > 0 {
            let lines = [
                format!("AVG: {:.3}S", m.average.unwrap_or_default()),
                format!("BEST: {:.3}S", m.best.unwrap_or_default()),
                format!("HITS: {}  MISSED: {}", m.count, m.timeouts),
            ];
            let w = lines.iter().map(|l| self.text_width(l)).max().unwrap_or(0) + 20;
            self.shade_rect(20, 20, w, lh * lines.len() + 10);
            for (i, line) in lines.iter().enumerate() {
                self.text(30, 25 + i * lh, line, WHITE);
            }
        }

        let help = ["SPACE: SHOW TARGET", "R: RECALIBRATE", "ESC: QUIT"];
        let w = help.iter().map(|l| self.text_width(l)).max().unwrap_or(0) + 20;
        let x = self.width.saturating_sub(w + 20);
        self.shade_rect(x, 20, w, lh * help.len() + 10);
        for (i, line) in help.iter().enumerate() {
            self.text(x + 10, 25 + i * lh, line, LAVENDER);
        }

        let (status, color) = match frame.tracker {
            TrackerStatus::Active => ("TRACKER: ACTIVE", GREEN),
            TrackerStatus::Unavailable => ("TRACKER: INACTIVE", RED),
        };
        let sw = self.text_width(status);
        let sy = self.height.saturating_sub(lh + 20);
        self.text(self.width.saturating_sub(sw + 20), sy, status, color);

        if let Some(notice) = frame.notice {
            let msg = notice.to_string().to_uppercase();
            self.text(20, sy, &msg, ORANGE);
        }
    }
}

impl Renderer for WindowOutput {
    fn screen_size(&self) -> ScreenSize {
        ScreenSize::new(self.width as i32, self.height as i32)
    }

    fn is_open(&self) -> bool {
        self.window.is_open()
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        // Key and mouse state were sampled by the last update_with_buffer
        if let Some(slot) = &self.pointer {
            let pos = self
                .window
                .get_mouse_pos(MouseMode::Discard)
                .map(|(x, y)| Point2::new(x as f64, y as f64));
            slot.set(pos);
        }

        let mut events = Vec::new();
        for key in self.window.get_keys_pressed(KeyRepeat::No) {
            let event = match key {
                Key::Escape => InputEvent::Quit,
                Key::R => InputEvent::Recalibrate,
                Key::Space => InputEvent::Reveal,
                _ => continue,
            };
            if !events.contains(&event) {
                events.push(event);
            }
        }
        events
    }

    fn draw_calibration(&mut self, view: &CalibrationView) -> Result<()> {
        self.clear();
        let p = view.point;
        self.fill_circle(p.x, p.y, 25, RED);
        self.ring(p.x, p.y, 30, 3, DARK_RED);

        let label = format!("CALIBRATING... POINT {}/{}", view.index + 1, view.total);
        let w = self.text_width(&label);
        self.text((self.width / 2).saturating_sub(w / 2), 30, &label, WHITE);
        self.present()
    }

    fn draw_frame(&mut self, frame: &FrameView) -> Result<()> {
        self.clear();
        self.draw_grid();

        let t = frame.target;
        if t.visible {
            let (x, y, r) = (t.position.x, t.position.y, t.radius);
            self.fill_circle(x, y, r, RED);
            self.ring(x, y, r + 5, 3, DARK_RED);
            self.fill_circle(x, y, r / 3, GOLD);

            // Countdown ring shrinks over the last stretch before timeout
            let window = frame.target_timeout - frame.timer_warning;
            if frame.target_elapsed > frame.timer_warning && window > 0.0 {
                let left = 1.0 - (frame.target_elapsed - frame.timer_warning) / window;
                let shrink = (r as f64 * left).max(5.0) as i32;
                self.fill_circle(x, y, shrink, ORANGE);
            }
        }

        if let Some(c) = frame.cursor {
            if self.show_trail {
                for (i, p) in frame.trail.iter().enumerate() {
                    let size = (5.0 - i as f64 * 0.3).max(3.0) as i32;
                    self.fill_circle(p.x, p.y, size, DARK_GREEN);
                }
            }
            self.fill_circle(c.x, c.y, 12, GREEN);
            self.ring(c.x, c.y, 15, 2, DARK_GREEN);
            self.hline(c.x - 20, c.x + 20, c.y, 2, CROSS_GREEN);
            self.vline(c.x, c.y - 20, c.y + 20, 2, CROSS_GREEN);
        }

        self.draw_hud(frame);
        self.present()
    }
}
