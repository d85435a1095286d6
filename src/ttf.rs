use rusttype::{point, Font, Scale};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub struct FontRenderer {
    font: Font<'static>,
}

impl FontRenderer {
    pub fn try_load(family: &str) -> Option<Self> {
        // Naive search of the usual macOS/Linux locations, then the working dir
        let paths = [
            format!("/Library/Fonts/{}.ttf", family),
            format!("/System/Library/Fonts/{}.ttf", family),
            format!("/System/Library/Fonts/Supplemental/{}.ttf", family),
            format!("/usr/share/fonts/truetype/{}.ttf", family),
            format!("/usr/share/fonts/truetype/dejavu/{}.ttf", family),
            format!("/usr/share/fonts/TTF/{}.ttf", family),
            format!("{}.ttf", family),
        ];

        for p in paths.iter() {
            if Path::new(p).exists() {
                if let Ok(data) = fs::read(p) {
                    if let Some(font) = Font::try_from_vec(data) {
                        info!("Loaded font from {}", p);
                        return Some(Self { font });
                    }
                }
            }
        }

        warn!("Could not find font family '{}'. Falling back to bitmap.", family);
        None
    }

    pub fn draw_text(&self, buffer: &mut [u32], width: usize, height: usize, x: usize, y: usize, text: &str, color: u32, size_pt: f32) {
        let scale = Scale::uniform(size_pt);
        let v_metrics = self.font.v_metrics(scale);
        let start = point(x as f32, y as f32 + v_metrics.ascent);

        for glyph in self.font.layout(text, scale, start) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, v| {
                    if v > 0.2 {
                        let px = bb.min.x + gx as i32;
                        let py = bb.min.y + gy as i32;
                        if px >= 0 && py >= 0 && (px as usize) < width && (py as usize) < height {
                            buffer[py as usize * width + px as usize] = color;
                        }
                    }
                });
            }
        }
    }

    pub fn measure_height(&self, size_pt: f32) -> usize {
        let v_metrics = self.font.v_metrics(Scale::uniform(size_pt));
        (v_metrics.ascent - v_metrics.descent + v_metrics.line_gap) as usize
    }

    pub fn measure_width(&self, text: &str, size_pt: f32) -> usize {
        let scale = Scale::uniform(size_pt);
        self.font
            .layout(text, scale, point(0.0, 0.0))
            .filter_map(|g| g.pixel_bounding_box())
            .map(|bb| bb.max.x)
            .max()
            .unwrap_or(0)
            .max(0) as usize
    }
}
