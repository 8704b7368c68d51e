//! mojiraster - emoji-aware text rendering
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  text ──► text::tokenize_lines           │
//! │               ↓ distinct AssetKeys       │
//! │  fetch::FetchManager (single-flight,     │
//! │      memory tier, concurrency ceiling)   │
//! │               ↓                          │
//! │  source::AssetSource (disk cache → CDN)  │
//! │               ↓ bytes                    │
//! │  render::Renderer ──► render::Canvas     │
//! └──────────────────────────────────────────┘
//! ```

pub mod config;
pub mod constants;
pub mod fetch;
pub mod render;
pub mod source;
pub mod text;
pub mod utils;

pub use fetch::{FetchManager, FetchSettings};
pub use render::{BlockSize, Canvas, FontMetrics, Point, RenderError, RenderOptions, RenderSummary, Renderer};
pub use source::{Asset, AssetKey, AssetSource, EmojiStyle};
pub use text::{tokenize, Token, TokenKind};
