//! Global constants for mojiraster
//!
//! Consolidates CDN endpoints, fetch limits, and layout constants
//! to eliminate magic numbers throughout the codebase.

// ============================================================================
// Remote Endpoints
// ============================================================================

/// Default Unicode emoji CDN (style selected with `?style=`)
pub const DEFAULT_CDN_BASE: &str = "https://emojicdn.elk.sh";

/// Alternative mirror of the Unicode emoji CDN
pub const MIRROR_CDN_BASE: &str = "https://emoji-cdn.mqrio.dev";

/// Custom (Discord) emoji CDN, assets are `{id}.png`
pub const CUSTOM_EMOJI_CDN_BASE: &str = "https://cdn.discordapp.com/emojis";

/// User-Agent sent with every CDN request (some CDNs reject bare clients)
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/55.0.2883.87 UBrowser/6.2.4098.3 Safari/537.36";

// ============================================================================
// Fetch Limits
// ============================================================================

/// Default ceiling on simultaneous outstanding downloads
pub const DEFAULT_MAX_CONCURRENT: usize = 50;

/// Extra idle connections kept above the concurrency ceiling
pub const POOL_HEADROOM: usize = 10;

/// TCP/TLS connect timeout in seconds
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Whole-request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

// ============================================================================
// Persistent Cache Layout
// ============================================================================

/// Directory name under the cache root (`~/.cache/mojiraster`)
pub const CACHE_DIR_NAME: &str = "mojiraster";

/// Subdirectory holding custom emoji assets (shared by every style)
pub const CUSTOM_EMOJI_DIR: &str = "discord";

/// File extension of every cached asset
pub const ASSET_EXTENSION: &str = "png";

// ============================================================================
// Layout Constants
// ============================================================================

/// Pixels trimmed from the emoji edge so bitmaps never overflow their slot
pub const EMOJI_SIZE_INSET: i32 = 2;

/// Horizontal nudge applied when pasting an emoji into its slot
pub const EMOJI_PASTE_NUDGE: i32 = 1;

/// Line height multiplier used when a font reports no line metrics
pub const FALLBACK_LINE_HEIGHT_SCALE: f32 = 1.2;

// ============================================================================
// Custom Emoji Markup
// ============================================================================

/// `<a?:name:id>`: name is 1-32 word chars, id is 17-22 digits
pub const CUSTOM_EMOJI_PATTERN: &str = r"<(a?):([A-Za-z0-9_]{1,32}):([0-9]{17,22})>";

/// Shortest possible markup: `<:x:` + 17 digits + `>`
pub const CUSTOM_EMOJI_MIN_LEN: usize = 22;
