//! CPU raster canvas
//!
//! [`RasterCanvas`] draws onto an `image::RgbaImage`; [`RasterFont`] lays out
//! text with fontdue. Text is walked per grapheme cluster: the first scalar
//! sets the advance, combining marks are overlaid at the same pen position,
//! and invisible joiners/selectors are skipped.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fontdue::{Font, FontSettings};
use image::{imageops, Rgba, RgbaImage};
use log::info;
use unicode_segmentation::UnicodeSegmentation;

use super::{Canvas, FontMetrics, Point};
use crate::constants::FALLBACK_LINE_HEIGHT_SCALE;
use crate::utils::blend_pixel;

/// Scalars that never produce ink
fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200D}' | '\u{200C}' | '\u{FE00}'..='\u{FE0F}' | '\u{E0020}'..='\u{E007F}')
}

/// fontdue font at a fixed pixel size
pub struct RasterFont {
    font: Font,
    size: f32,
    ascent: f32,
    line_height: f32,
}

impl RasterFont {
    pub fn from_bytes(data: &[u8], size: f32) -> Result<Self> {
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| anyhow!("Failed to load font: {}", e))?;

        let (ascent, line_height) = match font.horizontal_line_metrics(size) {
            Some(m) => (m.ascent, m.ascent - m.descent + m.line_gap),
            // Fonts without hhea metrics
            None => (size, size * FALLBACK_LINE_HEIGHT_SCALE),
        };
        info!(
            "Font loaded: size={}, ascent={:.1}, line_height={:.1}",
            size, ascent, line_height
        );

        Ok(Self {
            font,
            size,
            ascent,
            line_height,
        })
    }

    pub fn load(path: impl AsRef<Path>, size: f32) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read font {}", path.display()))?;
        Self::from_bytes(&data, size)
            .with_context(|| format!("Failed to parse font {}", path.display()))
    }

    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    /// (cluster, advance) for each visible grapheme
    fn clusters<'a>(&'a self, text: &'a str) -> impl Iterator<Item = (&'a str, f32)> + 'a {
        text.graphemes(true).filter_map(move |cluster| {
            let base = cluster.chars().find(|c| !is_invisible(*c))?;
            Some((cluster, self.font.metrics(base, self.size).advance_width))
        })
    }
}

impl FontMetrics for RasterFont {
    fn size(&self) -> f32 {
        self.size
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }

    fn measure(&self, text: &str) -> i32 {
        let width: f32 = self.clusters(text).map(|(_, advance)| advance).sum();
        width.ceil() as i32
    }
}

impl std::fmt::Debug for RasterFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterFont")
            .field("size", &self.size)
            .field("ascent", &self.ascent)
            .field("line_height", &self.line_height)
            .finish_non_exhaustive()
    }
}

/// RGBA canvas
#[derive(Debug, Clone)]
pub struct RasterCanvas {
    image: RgbaImage,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, background),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.image
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Blend a coverage bitmap with its top-left at (x, y), clipped
    fn blend_coverage(&mut self, x: i32, y: i32, width: usize, coverage: &[u8], fill: Rgba<u8>) {
        if width == 0 {
            return;
        }
        let (cw, ch) = (self.image.width() as i32, self.image.height() as i32);
        for (row, line) in coverage.chunks(width).enumerate() {
            let py = y + row as i32;
            if py < 0 || py >= ch {
                continue;
            }
            for (col, &value) in line.iter().enumerate() {
                let px = x + col as i32;
                if value == 0 || px < 0 || px >= cw {
                    continue;
                }
                blend_pixel(self.image.get_pixel_mut(px as u32, py as u32), fill, value);
            }
        }
    }
}

impl Canvas for RasterCanvas {
    type Font = RasterFont;

    fn draw_text(&mut self, pos: Point, text: &str, font: &RasterFont, fill: Rgba<u8>) {
        let baseline = pos.y as f32 + font.ascent;
        let mut pen = pos.x as f32;

        for (cluster, advance) in font.clusters(text) {
            for c in cluster.chars().filter(|c| !is_invisible(*c)) {
                let (metrics, bitmap) = font.font.rasterize(c, font.size);
                let gx = (pen + metrics.xmin as f32).round() as i32;
                let gy = (baseline - (metrics.height as i32 + metrics.ymin) as f32).round() as i32;
                self.blend_coverage(gx, gy, metrics.width, &bitmap, fill);
            }
            pen += advance;
        }
    }

    fn draw_image(&mut self, pos: Point, image: &RgbaImage) {
        imageops::overlay(&mut self.image, image, pos.x as i64, pos.y as i64);
    }
}
