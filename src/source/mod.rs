//! Emoji asset sources
//!
//! An asset source turns an [`AssetKey`] into image bytes, or `None` when the
//! asset cannot be found. Failures are soft: sources log and return `None`.
//!
//! - [`CdnSource`]: persistent cache directory in front of an HTTP CDN
//! - [`LocalSource`]: pre-populated directory, never touches the network
//!
//! Byte transport is a separate capability ([`Transport`]) so the CDN source
//! can run over any HTTP client (or a test double).

pub mod cdn;
#[cfg(feature = "http")]
pub mod http;
pub mod local;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::constants::{ASSET_EXTENSION, CUSTOM_EMOJI_DIR};

pub use cdn::CdnSource;
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use local::LocalSource;

/// Shared, immutable asset bytes
pub type Asset = Arc<[u8]>;

/// Vendor skin used for Unicode emoji (CDN `style` parameter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EmojiStyle {
    #[default]
    #[serde(rename = "apple")]
    Apple,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "microsoft")]
    Microsoft,
    #[serde(rename = "samsung")]
    Samsung,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    #[serde(rename = "twitter")]
    Twitter,
    #[serde(rename = "facebook")]
    Facebook,
    #[serde(rename = "messenger")]
    Messenger,
    #[serde(rename = "joypixels")]
    JoyPixels,
    #[serde(rename = "openmoji")]
    OpenMoji,
    #[serde(rename = "emojidex")]
    Emojidex,
    #[serde(rename = "lg")]
    Lg,
    #[serde(rename = "htc")]
    Htc,
    #[serde(rename = "sony")]
    Sony,
    #[serde(rename = "skype")]
    Skype,
    #[serde(rename = "mozilla")]
    Mozilla,
    #[serde(rename = "docomo")]
    Docomo,
    #[serde(rename = "huawei")]
    Huawei,
    #[serde(rename = "icons8")]
    Icons8,
    #[serde(rename = "softbank")]
    SoftBank,
    #[serde(rename = "au-kddi")]
    AuKddi,
    #[serde(rename = "telegram")]
    Telegram,
    #[serde(rename = "toss-face")]
    TossFace,
    #[serde(rename = "noto-emoji")]
    NotoEmoji,
    #[serde(rename = "serenityos")]
    SerenityOs,
    #[serde(rename = "microsoft-teams")]
    MicrosoftTeams,
    #[serde(rename = "joypixels-animations")]
    JoyPixelsAnimations,
    #[serde(rename = "microsoft-3D-fluent")]
    Microsoft3dFluent,
    #[serde(rename = "twitter-emoji-stickers")]
    TwitterEmojiStickers,
    #[serde(rename = "animated-noto-color-emoji")]
    AnimatedNotoColorEmoji,
}

impl EmojiStyle {
    pub const ALL: [EmojiStyle; 30] = [
        Self::Apple,
        Self::Google,
        Self::Microsoft,
        Self::Samsung,
        Self::WhatsApp,
        Self::Twitter,
        Self::Facebook,
        Self::Messenger,
        Self::JoyPixels,
        Self::OpenMoji,
        Self::Emojidex,
        Self::Lg,
        Self::Htc,
        Self::Sony,
        Self::Skype,
        Self::Mozilla,
        Self::Docomo,
        Self::Huawei,
        Self::Icons8,
        Self::SoftBank,
        Self::AuKddi,
        Self::Telegram,
        Self::TossFace,
        Self::NotoEmoji,
        Self::SerenityOs,
        Self::MicrosoftTeams,
        Self::JoyPixelsAnimations,
        Self::Microsoft3dFluent,
        Self::TwitterEmojiStickers,
        Self::AnimatedNotoColorEmoji,
    ];

    /// CDN spelling (also the cache subdirectory name)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apple => "apple",
            Self::Google => "google",
            Self::Microsoft => "microsoft",
            Self::Samsung => "samsung",
            Self::WhatsApp => "whatsapp",
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::Messenger => "messenger",
            Self::JoyPixels => "joypixels",
            Self::OpenMoji => "openmoji",
            Self::Emojidex => "emojidex",
            Self::Lg => "lg",
            Self::Htc => "htc",
            Self::Sony => "sony",
            Self::Skype => "skype",
            Self::Mozilla => "mozilla",
            Self::Docomo => "docomo",
            Self::Huawei => "huawei",
            Self::Icons8 => "icons8",
            Self::SoftBank => "softbank",
            Self::AuKddi => "au-kddi",
            Self::Telegram => "telegram",
            Self::TossFace => "toss-face",
            Self::NotoEmoji => "noto-emoji",
            Self::SerenityOs => "serenityos",
            Self::MicrosoftTeams => "microsoft-teams",
            Self::JoyPixelsAnimations => "joypixels-animations",
            Self::Microsoft3dFluent => "microsoft-3D-fluent",
            Self::TwitterEmojiStickers => "twitter-emoji-stickers",
            Self::AnimatedNotoColorEmoji => "animated-noto-color-emoji",
        }
    }
}

impl fmt::Display for EmojiStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown style name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown emoji style: {0}")]
pub struct UnknownStyle(pub String);

impl FromStr for EmojiStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| UnknownStyle(s.to_string()))
    }
}

/// Deduplication key for one asset
///
/// Unicode and custom identifiers live in separate variants so they can
/// never collide. Custom emoji do not depend on the style.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetKey {
    Unicode { style: EmojiStyle, emoji: String },
    Custom { id: String },
}

impl AssetKey {
    pub fn unicode(style: EmojiStyle, emoji: impl Into<String>) -> Self {
        Self::Unicode {
            style,
            emoji: emoji.into(),
        }
    }

    pub fn custom(id: impl Into<String>) -> Self {
        Self::Custom { id: id.into() }
    }

    /// Emoji sequence or custom id
    pub fn identifier(&self) -> &str {
        match self {
            Self::Unicode { emoji, .. } => emoji,
            Self::Custom { id } => id,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom { .. })
    }

    /// Persistent cache location under `root`
    ///
    /// `{root}/{style}/{emoji}.png` or `{root}/discord/{id}.png`
    pub fn cache_path(&self, root: &Path) -> PathBuf {
        match self {
            Self::Unicode { style, emoji } => root
                .join(style.as_str())
                .join(format!("{}.{}", emoji, ASSET_EXTENSION)),
            Self::Custom { id } => root
                .join(CUSTOM_EMOJI_DIR)
                .join(format!("{}.{}", id, ASSET_EXTENSION)),
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicode { style, emoji } => write!(f, "{}:{}", style, emoji),
            Self::Custom { id } => write!(f, "custom:{}", id),
        }
    }
}

/// Capability: fetch one asset
///
/// Implementations must not panic or error on missing assets; `None` is the
/// only failure signal.
pub trait AssetSource: Send + Sync {
    fn fetch<'a>(&'a self, key: &'a AssetKey) -> BoxFuture<'a, Option<Vec<u8>>>;

    /// Release pooled resources (idempotent)
    fn shutdown(&self) {}
}

/// HTTP response as seen by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    /// Only 200 counts; anything else is treated as not found
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Transport-level failure
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport has been shut down")]
    Closed,
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Request(String),
}

/// Capability: issue one HTTP GET and buffer the body
pub trait Transport: Send + Sync {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Response, TransportError>>;

    /// Release pooled connections (idempotent, safe before any request)
    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_round_trip() {
        for style in EmojiStyle::ALL {
            assert_eq!(style.as_str().parse::<EmojiStyle>(), Ok(style));
        }
        assert_eq!(
            "microsoft-3D-fluent".parse::<EmojiStyle>(),
            Ok(EmojiStyle::Microsoft3dFluent)
        );
        assert!("comic-sans".parse::<EmojiStyle>().is_err());
        assert_eq!(EmojiStyle::default(), EmojiStyle::Apple);
    }

    #[test]
    fn test_key_namespaces_do_not_collide() {
        let unicode = AssetKey::unicode(EmojiStyle::Apple, "123");
        let custom = AssetKey::custom("123");
        assert_ne!(unicode, custom);
        assert_eq!(unicode.identifier(), custom.identifier());
        assert!(custom.is_custom());
        assert!(!unicode.is_custom());
    }

    #[test]
    fn test_cache_path_layout() {
        let root = Path::new("/cache");
        assert_eq!(
            AssetKey::unicode(EmojiStyle::Twitter, "👍").cache_path(root),
            PathBuf::from("/cache/twitter/👍.png")
        );
        assert_eq!(
            AssetKey::custom("596576798351949847").cache_path(root),
            PathBuf::from("/cache/discord/596576798351949847.png")
        );
    }
}
