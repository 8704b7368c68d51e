//! Layout and compositing
//!
//! Walks tokenized lines left to right and draws text runs and emoji
//! bitmaps onto a [`Canvas`]. All assets for one render call are fetched in
//! a single batch before the first draw; drawing is strictly sequential in
//! document order.

pub mod raster;

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::io::Reader as ImageReader;
use image::{Rgba, RgbaImage};
use log::{debug, trace, warn};
use thiserror::Error;

use crate::constants::{EMOJI_PASTE_NUDGE, EMOJI_SIZE_INSET};
use crate::fetch::FetchManager;
use crate::source::{AssetKey, EmojiStyle};
use crate::text::{contains_emoji, tokenize_lines, Document, Token, TokenKind};

pub use raster::{RasterCanvas, RasterFont};

/// Pixel position on a canvas (top-left origin)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Metrics a font must report to be laid out
pub trait FontMetrics {
    /// Nominal size in pixels
    fn size(&self) -> f32;

    /// Distance between consecutive baselines
    fn line_height(&self) -> f32;

    /// Horizontal advance of `text` when drawn with this font
    fn measure(&self, text: &str) -> i32;
}

/// Drawing surface
pub trait Canvas {
    type Font: FontMetrics;

    /// Draw `text` with its line box top-left at `pos`
    fn draw_text(&mut self, pos: Point, text: &str, font: &Self::Font, fill: Rgba<u8>);

    /// Composite `image` with its top-left at `pos`
    fn draw_image(&mut self, pos: Point, image: &RgbaImage);
}

/// How far the pen moves after a drawn emoji
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmojiAdvance {
    /// Uniform slot of `floor(size * emoji_scale)` pixels
    #[default]
    Fixed,
    /// Width of the resized bitmap
    BitmapWidth,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Text color
    pub fill: Rgba<u8>,
    /// Overrides the font's line height
    pub line_height: Option<i32>,
    /// Recognize `<:name:id>` markup
    pub custom_emoji: bool,
    /// Extra offset added to every pasted emoji
    pub emoji_offset: Point,
    /// Emoji slot size relative to the font size
    pub emoji_scale: f32,
    /// Pixels subtracted from the slot to get the bitmap edge
    pub emoji_inset: i32,
    /// Horizontal nudge applied when pasting
    pub emoji_nudge: i32,
    pub advance: EmojiAdvance,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            fill: Rgba([0, 0, 0, 255]),
            line_height: None,
            custom_emoji: false,
            emoji_offset: Point::default(),
            emoji_scale: 1.0,
            emoji_inset: EMOJI_SIZE_INSET,
            emoji_nudge: EMOJI_PASTE_NUDGE,
            advance: EmojiAdvance::Fixed,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("font reports unusable metrics (size {size}, line height {line_height})")]
    InvalidFont { size: f32, line_height: f32 },

    #[error("line height must be positive, got {0}")]
    InvalidLineHeight(i32),
}

/// What one render call drew
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub lines: usize,
    pub text_draws: usize,
    pub emoji_draws: usize,
    /// Emoji tokens drawn as text because no usable bitmap was found
    pub fallbacks: usize,
}

/// Pixel extent of a laid-out block of lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockSize {
    pub width: i32,
    pub height: i32,
}

/// Per-call geometry derived from the font and options
#[derive(Debug, Clone, Copy)]
struct Layout {
    line_height: i32,
    /// Horizontal slot of one emoji
    slot: i32,
    /// Target bitmap height
    edge: u32,
    /// Vertical offset of a bitmap inside the line box
    y_diff: i32,
}

impl Layout {
    fn new<F: FontMetrics>(font: &F, options: &RenderOptions) -> Result<Self, RenderError> {
        let size = font.size();
        let font_line_height = font.line_height();
        if !size.is_finite() || size <= 0.0 || !font_line_height.is_finite() || font_line_height <= 0.0
        {
            return Err(RenderError::InvalidFont {
                size,
                line_height: font_line_height,
            });
        }

        let line_height = options
            .line_height
            .unwrap_or_else(|| font_line_height.round() as i32);
        if line_height <= 0 {
            return Err(RenderError::InvalidLineHeight(line_height));
        }

        let scale = if options.emoji_scale.is_finite() && options.emoji_scale > 0.0 {
            options.emoji_scale
        } else {
            warn!("ignoring emoji_scale {}", options.emoji_scale);
            1.0
        };
        let slot = ((size * scale).floor() as i32).max(1);
        let edge = (slot - options.emoji_inset).max(1) as u32;
        // Center the scaled slot, not the nominal font size
        let y_diff = (line_height - slot) / 2;

        Ok(Self {
            line_height,
            slot,
            edge,
            y_diff,
        })
    }

    fn emoji_advance(&self, bitmap: &RgbaImage, options: &RenderOptions) -> i32 {
        match options.advance {
            EmojiAdvance::Fixed => self.slot,
            EmojiAdvance::BitmapWidth => bitmap.width() as i32,
        }
    }
}

/// Text renderer backed by a shared [`FetchManager`]
#[derive(Debug, Clone)]
pub struct Renderer {
    manager: Arc<FetchManager>,
    style: EmojiStyle,
}

impl Renderer {
    pub fn new(manager: Arc<FetchManager>, style: EmojiStyle) -> Self {
        Self { manager, style }
    }

    pub fn manager(&self) -> &Arc<FetchManager> {
        &self.manager
    }

    pub fn style(&self) -> EmojiStyle {
        self.style
    }

    pub fn set_style(&mut self, style: EmojiStyle) {
        self.style = style;
    }

    /// Render `text`, split on line breaks
    pub async fn render<C: Canvas>(
        &self,
        canvas: &mut C,
        origin: Point,
        text: &str,
        font: &C::Font,
        options: &RenderOptions,
    ) -> Result<RenderSummary, RenderError> {
        if text.is_empty() {
            return Ok(RenderSummary::default());
        }
        let lines: Vec<&str> = text.lines().collect();
        self.render_lines(canvas, origin, &lines, font, options).await
    }

    /// Render pre-split lines, one per line box
    pub async fn render_lines<C: Canvas, S: AsRef<str>>(
        &self,
        canvas: &mut C,
        origin: Point,
        lines: &[S],
        font: &C::Font,
        options: &RenderOptions,
    ) -> Result<RenderSummary, RenderError> {
        let mut summary = RenderSummary::default();
        if lines.iter().all(|line| line.as_ref().is_empty()) {
            return Ok(summary);
        }

        let layout = Layout::new(font, options)?;
        summary.lines = lines.len();

        if !contains_emoji(lines, options.custom_emoji) {
            trace!("render: {} plain lines", lines.len());
            let mut y = origin.y;
            for line in lines {
                let line = line.as_ref();
                if !line.is_empty() {
                    canvas.draw_text(Point::new(origin.x, y), line, font, options.fill);
                    summary.text_draws += 1;
                }
                y += layout.line_height;
            }
            return Ok(summary);
        }

        let document = tokenize_lines(lines, options.custom_emoji);
        let bitmaps = self.resolve(&document, layout.edge).await;

        let mut y = origin.y;
        for line in &document {
            let mut x = origin.x;
            for token in line {
                let bitmap = self.key_for(token).and_then(|key| bitmaps.get(&key));
                match (token.kind, bitmap) {
                    (TokenKind::Text, _) => {
                        canvas.draw_text(Point::new(x, y), token.content, font, options.fill);
                        x += font.measure(token.content);
                        summary.text_draws += 1;
                    }
                    (_, Some(bitmap)) => {
                        let pos = Point::new(
                            x + options.emoji_nudge + options.emoji_offset.x,
                            y + layout.y_diff + options.emoji_offset.y,
                        );
                        canvas.draw_image(pos, bitmap);
                        x += layout.emoji_advance(bitmap, options);
                        summary.emoji_draws += 1;
                    }
                    (_, None) => {
                        let fallback = fallback_text(token);
                        canvas.draw_text(Point::new(x, y), &fallback, font, options.fill);
                        x += font.measure(&fallback);
                        summary.fallbacks += 1;
                    }
                }
            }
            y += layout.line_height;
        }

        debug!(
            "render: {} lines, {} text, {} emoji, {} fallback",
            summary.lines, summary.text_draws, summary.emoji_draws, summary.fallbacks
        );
        Ok(summary)
    }

    /// Size of the block `render` would draw for `text`
    pub async fn measure<F: FontMetrics>(
        &self,
        text: &str,
        font: &F,
        options: &RenderOptions,
    ) -> Result<BlockSize, RenderError> {
        let lines: Vec<&str> = text.lines().collect();
        self.measure_lines(&lines, font, options).await
    }

    /// Size of the block `render_lines` would draw
    ///
    /// Emoji assets are fetched exactly as a render would, so advances and
    /// text fallbacks match the drawn output.
    pub async fn measure_lines<F: FontMetrics, S: AsRef<str>>(
        &self,
        lines: &[S],
        font: &F,
        options: &RenderOptions,
    ) -> Result<BlockSize, RenderError> {
        if lines.iter().all(|line| line.as_ref().is_empty()) {
            return Ok(BlockSize::default());
        }
        let layout = Layout::new(font, options)?;
        let height = layout.line_height * lines.len() as i32;

        if !contains_emoji(lines, options.custom_emoji) {
            let width = lines
                .iter()
                .map(|line| font.measure(line.as_ref()))
                .max()
                .unwrap_or(0);
            return Ok(BlockSize { width, height });
        }

        let document = tokenize_lines(lines, options.custom_emoji);
        let bitmaps = self.resolve(&document, layout.edge).await;

        let mut width = 0;
        for line in &document {
            let mut x = 0;
            for token in line {
                let bitmap = self.key_for(token).and_then(|key| bitmaps.get(&key));
                match (token.kind, bitmap) {
                    (TokenKind::Text, _) => x += font.measure(token.content),
                    (_, Some(bitmap)) => {
                        let right = x
                            + options.emoji_nudge
                            + options.emoji_offset.x
                            + bitmap.width() as i32;
                        width = width.max(right);
                        x += layout.emoji_advance(bitmap, options);
                    }
                    (_, None) => x += font.measure(&fallback_text(token)),
                }
            }
            width = width.max(x);
        }
        Ok(BlockSize { width, height })
    }

    fn key_for(&self, token: &Token<'_>) -> Option<AssetKey> {
        match token.kind {
            TokenKind::Text => None,
            TokenKind::Emoji => Some(AssetKey::unicode(self.style, token.content)),
            TokenKind::CustomEmoji => Some(AssetKey::custom(token.content)),
        }
    }

    /// Fetch every distinct asset once and resize each to `edge` pixels high
    async fn resolve(&self, document: &Document<'_>, edge: u32) -> HashMap<AssetKey, RgbaImage> {
        let keys: HashSet<AssetKey> = document
            .iter()
            .flatten()
            .filter_map(|token| self.key_for(token))
            .collect();
        if keys.is_empty() {
            return HashMap::new();
        }

        let assets = self.manager.fetch_all(keys).await;
        assets
            .into_iter()
            .filter_map(|(key, asset)| {
                let bitmap = decode(&key, &asset?)?;
                Some((key, fit_height(&bitmap, edge)))
            })
            .collect()
    }
}

/// Text drawn in place of an emoji without a bitmap
fn fallback_text(token: &Token<'_>) -> String {
    match token.kind {
        TokenKind::CustomEmoji => format!("[:{}:]", token.content),
        _ => token.content.to_string(),
    }
}

fn decode(key: &AssetKey, bytes: &[u8]) -> Option<RgbaImage> {
    let reader = match ImageReader::new(Cursor::new(bytes)).with_guessed_format() {
        Ok(r) => r,
        Err(e) => {
            warn!("{}: format guess failed: {}", key, e);
            return None;
        }
    };
    match reader.decode() {
        Ok(img) => Some(img.to_rgba8()),
        Err(e) => {
            warn!("{}: decode failed: {}", key, e);
            None
        }
    }
}

/// Resize to `edge` pixels high, keeping the aspect ratio
fn fit_height(bitmap: &RgbaImage, edge: u32) -> RgbaImage {
    let (w, h) = bitmap.dimensions();
    if h == edge || w == 0 || h == 0 {
        return bitmap.clone();
    }
    let width = ((w as f64 * edge as f64 / h as f64).round() as u32).max(1);
    imageops::resize(bitmap, width, edge, FilterType::Lanczos3)
}
