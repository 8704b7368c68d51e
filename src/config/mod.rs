//! Configuration file management
//!
//! Loads TOML configuration files and provides application settings.
//! Default config path: ~/.config/mojiraster/config.toml

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::Rgba;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CACHE_DIR_NAME, CUSTOM_EMOJI_CDN_BASE, DEFAULT_CDN_BASE, DEFAULT_MAX_CONCURRENT, MIRROR_CDN_BASE,
};
use crate::fetch::FetchSettings;
use crate::render::{EmojiAdvance, Point, RenderOptions};
use crate::source::EmojiStyle;
use crate::utils::parse_hex_color;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "MOJIRASTER_CONFIG";

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where emoji bitmaps come from
    pub source: SourceConfig,
    /// Fetch/cache manager settings
    pub fetch: FetchConfig,
    /// Layout settings
    pub render: RenderConfig,
    /// Font settings
    pub font: FontConfig,
    /// Output image settings
    pub output: OutputConfig,
}

/// Source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Unicode emoji CDN
    pub base_url: String,
    /// Custom emoji CDN
    pub custom_base_url: String,
    /// Vendor style (apple, google, twitter, ...)
    pub style: String,
    /// Persistent cache directory (empty = ~/.cache/mojiraster)
    pub cache_dir: String,
    /// Serve only what is already in the cache directory
    pub offline: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CDN_BASE.to_string(),
            custom_base_url: CUSTOM_EMOJI_CDN_BASE.to_string(),
            style: EmojiStyle::default().to_string(),
            cache_dir: String::new(),
            offline: false,
        }
    }
}

impl SourceConfig {
    /// Configured style, falling back to the default on unknown names
    pub fn style(&self) -> EmojiStyle {
        match self.style.parse() {
            Ok(style) => style,
            Err(e) => {
                warn!("{}, using {}", e, EmojiStyle::default());
                EmojiStyle::default()
            }
        }
    }

    /// Resolved cache directory
    pub fn cache_dir(&self) -> PathBuf {
        if self.cache_dir.trim().is_empty() {
            return default_cache_dir();
        }
        expand_home(self.cache_dir.trim())
    }
}

/// Fetch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Simultaneous downloads
    pub max_concurrent: usize,
    /// Keep fetched assets in memory for the process lifetime
    pub memory_cache: bool,
    /// Log download progress
    pub progress: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            memory_cache: true,
            progress: false,
        }
    }
}

impl FetchConfig {
    pub fn settings(&self) -> FetchSettings {
        FetchSettings {
            max_concurrent: self.max_concurrent,
            memory_cache: self.memory_cache,
        }
    }
}

/// Layout settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Recognize `<:name:id>` custom emoji markup
    pub custom_emoji: bool,
    /// Line height in pixels (0 = from font metrics)
    pub line_height: i32,
    /// Text color (RRGGBB or RRGGBBAA)
    pub fill: String,
    /// Emoji slot relative to font size
    pub emoji_scale: f32,
    /// Pixels trimmed from the emoji bitmap edge
    pub emoji_inset: i32,
    /// Horizontal nudge when pasting emoji
    pub emoji_nudge: i32,
    /// Extra [x, y] offset for every emoji
    pub emoji_offset: [i32; 2],
    /// Pen advance after an emoji: "fixed" or "bitmap"
    pub advance: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let options = RenderOptions::default();
        Self {
            custom_emoji: false,
            line_height: 0,
            fill: "000000".to_string(),
            emoji_scale: options.emoji_scale,
            emoji_inset: options.emoji_inset,
            emoji_nudge: options.emoji_nudge,
            emoji_offset: [0, 0],
            advance: "fixed".to_string(),
        }
    }
}

impl RenderConfig {
    pub fn advance(&self) -> EmojiAdvance {
        match self.advance.trim().to_ascii_lowercase().as_str() {
            "fixed" => EmojiAdvance::Fixed,
            "bitmap" | "bitmap_width" | "bitmap-width" => EmojiAdvance::BitmapWidth,
            other => {
                warn!("Unknown advance mode {:?}, using fixed", other);
                EmojiAdvance::Fixed
            }
        }
    }

    pub fn fill(&self) -> Rgba<u8> {
        parse_hex_color(&self.fill).unwrap_or_else(|| {
            warn!("Invalid fill color {:?}, using black", self.fill);
            Rgba([0, 0, 0, 255])
        })
    }

    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            fill: self.fill(),
            line_height: (self.line_height > 0).then_some(self.line_height),
            custom_emoji: self.custom_emoji,
            emoji_offset: Point::new(self.emoji_offset[0], self.emoji_offset[1]),
            emoji_scale: self.emoji_scale,
            emoji_inset: self.emoji_inset,
            emoji_nudge: self.emoji_nudge,
            advance: self.advance(),
        }
    }
}

/// Font settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Path to a TrueType/OpenType font
    pub path: String,
    /// Pixel size
    pub size: f32,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            size: 24.0,
        }
    }
}

/// Output image settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Image width (0 = fit the text)
    pub width: u32,
    /// Image height (0 = fit the text)
    pub height: u32,
    /// Margin around the text
    pub padding: u32,
    /// Background color (RRGGBB or RRGGBBAA)
    pub background: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            padding: 8,
            background: "ffffff".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn background(&self) -> Rgba<u8> {
        parse_hex_color(&self.background).unwrap_or_else(|| {
            warn!("Invalid background color {:?}, using white", self.background);
            Rgba([255, 255, 255, 255])
        })
    }
}

impl Config {
    /// Get the path that would be used for loading config
    /// Returns None if using built-in defaults
    pub fn config_path() -> Option<PathBuf> {
        // 1. MOJIRASTER_CONFIG environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
            warn!("{} points to missing file {}", CONFIG_ENV, path);
        }

        // 2. User config: ~/.config/mojiraster/config.toml
        default_config_path().filter(|p| p.exists())
    }

    /// Load configuration with priority:
    /// 1. MOJIRASTER_CONFIG environment variable
    /// 2. ~/.config/mojiraster/config.toml
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config {}: {:#}", path.display(), e);
                }
            }
        }
        info!("Using built-in default config");
        Self::default()
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Write the commented template to the user config path
    pub fn write_default_config(force: bool) -> Result<PathBuf> {
        let path = default_config_path().context("Config directory not found")?;
        Self::write_template(&path, force)?;
        Ok(path)
    }

    /// Write the commented template to `path`
    pub fn write_template(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        std::fs::write(path, template())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote config template: {}", path.display());
        Ok(())
    }
}

/// Commented config template with every default spelled out
pub fn template() -> String {
    let d = Config::default();
    let styles: Vec<&str> = EmojiStyle::ALL.iter().map(|s| s.as_str()).collect();
    format!(
        r#"# mojiraster configuration
# Location: ~/.config/mojiraster/config.toml (override with ${env})

[source]
# Mirror: {mirror}
base_url = "{base_url}"
custom_base_url = "{custom_base_url}"
# One of: {styles}
style = "{style}"
# Empty = ~/.cache/mojiraster
cache_dir = ""
# Only use assets already in cache_dir
offline = false

[fetch]
max_concurrent = {max_concurrent}
memory_cache = {memory_cache}
progress = {progress}

[render]
# Parse <:name:id> custom emoji markup
custom_emoji = {custom_emoji}
# 0 = from font metrics
line_height = {line_height}
fill = "{fill}"
emoji_scale = {emoji_scale:?}
emoji_inset = {emoji_inset}
emoji_nudge = {emoji_nudge}
emoji_offset = [{ox}, {oy}]
# "fixed" (uniform slot) or "bitmap" (resized bitmap width)
advance = "{advance}"

[font]
# path = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
size = {size:?}

[output]
# 0 = fit the text
width = {width}
height = {height}
padding = {padding}
background = "{background}"
"#,
        env = CONFIG_ENV,
        mirror = MIRROR_CDN_BASE,
        base_url = d.source.base_url,
        custom_base_url = d.source.custom_base_url,
        styles = styles.join(", "),
        style = d.source.style,
        max_concurrent = d.fetch.max_concurrent,
        memory_cache = d.fetch.memory_cache,
        progress = d.fetch.progress,
        custom_emoji = d.render.custom_emoji,
        line_height = d.render.line_height,
        fill = d.render.fill,
        emoji_scale = d.render.emoji_scale,
        emoji_inset = d.render.emoji_inset,
        emoji_nudge = d.render.emoji_nudge,
        ox = d.render.emoji_offset[0],
        oy = d.render.emoji_offset[1],
        advance = d.render.advance,
        size = d.font.size,
        width = d.output.width,
        height = d.output.height,
        padding = d.output.padding,
        background = d.output.background,
    )
}

/// Get default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mojiraster").join("config.toml"))
}

/// Default persistent cache: ~/.cache/mojiraster
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        let config: Config = toml::from_str(&template()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [source]
            style = "google"

            [render]
            custom_emoji = true
            line_height = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.source.style(), EmojiStyle::Google);
        assert_eq!(config.fetch, FetchConfig::default());

        let options = config.render.options();
        assert!(options.custom_emoji);
        assert_eq!(options.line_height, Some(30));
        assert_eq!(options.fill, Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let render = RenderConfig {
            fill: "nope".into(),
            advance: "sideways".into(),
            ..Default::default()
        };
        assert_eq!(render.fill(), Rgba([0, 0, 0, 255]));
        assert_eq!(render.advance(), EmojiAdvance::Fixed);

        let source = SourceConfig {
            style: "comic-sans".into(),
            ..Default::default()
        };
        assert_eq!(source.style(), EmojiStyle::Apple);
    }

    #[test]
    fn test_bitmap_advance() {
        let render = RenderConfig {
            advance: "bitmap".into(),
            ..Default::default()
        };
        assert_eq!(render.options().advance, EmojiAdvance::BitmapWidth);
    }

    #[test]
    fn test_cache_dir() {
        let source = SourceConfig {
            cache_dir: "/tmp/emoji-cache".into(),
            ..Default::default()
        };
        assert_eq!(source.cache_dir(), PathBuf::from("/tmp/emoji-cache"));
        assert!(SourceConfig::default().cache_dir().ends_with(CACHE_DIR_NAME));
    }

    #[test]
    fn test_write_template_respects_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::write_template(&path, false).unwrap();
        assert!(Config::write_template(&path, false).is_err());
        Config::write_template(&path, true).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_load_from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[fetch]\nmax_concurrent = \"many\"\n").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }
}
