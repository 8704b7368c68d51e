//! CDN-backed asset source
//!
//! Lookup order for one key:
//! 1. Persistent cache file (presence alone proves validity)
//! 2. One GET against the Unicode CDN (`{base}/{emoji}?style={style}`)
//!    or the custom emoji CDN (`{custom_base}/{id}.png`)
//!
//! Downloaded bytes are written to a temp file next to the final path and
//! renamed into place on a blocking task. The task finishes even if the fetch
//! is cancelled, so neither partial files nor stray temp files are left.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use log::{debug, trace, warn};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::{AssetKey, AssetSource, Transport};
use crate::constants::{CUSTOM_EMOJI_CDN_BASE, DEFAULT_CDN_BASE};

/// Characters left unescaped in URL components (same set as `quote_plus`)
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Emoji source with persistent cache in front of an HTTP CDN
pub struct CdnSource {
    base_url: String,
    custom_base_url: String,
    cache_dir: PathBuf,
    transport: Arc<dyn Transport>,
}

impl CdnSource {
    pub fn new(transport: Arc<dyn Transport>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: DEFAULT_CDN_BASE.to_string(),
            custom_base_url: CUSTOM_EMOJI_CDN_BASE.to_string(),
            cache_dir: cache_dir.into(),
            transport,
        }
    }

    /// Override the Unicode emoji CDN base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the custom emoji CDN base URL
    pub fn with_custom_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.custom_base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Remote location of one asset
    pub fn url_for(&self, key: &AssetKey) -> String {
        match key {
            AssetKey::Unicode { style, emoji } => format!(
                "{}/{}?style={}",
                self.base_url,
                utf8_percent_encode(emoji, COMPONENT),
                utf8_percent_encode(style.as_str(), COMPONENT)
            ),
            AssetKey::Custom { id } => format!(
                "{}/{}.png",
                self.custom_base_url,
                utf8_percent_encode(id, COMPONENT)
            ),
        }
    }

    async fn read_cached(&self, path: &Path) -> Option<Vec<u8>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                trace!("cache hit: {}", path.display());
                Some(bytes)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("cannot read cached asset {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write via temp file + rename
    async fn persist(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let path = path.to_path_buf();
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }

    async fn download(&self, key: &AssetKey) -> Option<Vec<u8>> {
        let url = self.url_for(key);
        debug!("GET {}", url);

        let response = match self.transport.get(&url).await {
            Ok(r) => r,
            Err(e) => {
                warn!("fetch {} failed: {}", key, e);
                return None;
            }
        };

        if !response.is_ok() {
            debug!("fetch {}: HTTP {}", key, response.status);
            return None;
        }
        if response.body.is_empty() {
            warn!("fetch {}: empty body", key);
            return None;
        }

        Some(response.body)
    }
}

/// Temp file in the target directory, removed on any failure
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "cache path has no parent"))?;
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl AssetSource for CdnSource {
    fn fetch<'a>(&'a self, key: &'a AssetKey) -> BoxFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let path = key.cache_path(&self.cache_dir);
            if let Some(bytes) = self.read_cached(&path).await {
                return Some(bytes);
            }

            let bytes = self.download(key).await?;
            if let Err(e) = self.persist(&path, &bytes).await {
                // Bytes are still good for this call
                warn!("cannot persist {} to {}: {}", key, path.display(), e);
            }
            Some(bytes)
        })
    }

    fn shutdown(&self) {
        self.transport.shutdown();
    }
}

impl std::fmt::Debug for CdnSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdnSource")
            .field("base_url", &self.base_url)
            .field("custom_base_url", &self.custom_base_url)
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{EmojiStyle, Response, TransportError};
    use super::*;
    use crate::constants::MIRROR_CDN_BASE;
    use parking_lot::Mutex;

    /// Records every URL; answers from a fixed status/body
    struct FakeTransport {
        status: u16,
        body: Vec<u8>,
        fail: bool,
        urls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn ok(body: &[u8]) -> Arc<Self> {
            Arc::new(Self {
                status: 200,
                body: body.to_vec(),
                fail: false,
                urls: Mutex::new(Vec::new()),
            })
        }

        fn status(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: b"error page".to_vec(),
                fail: false,
                urls: Mutex::new(Vec::new()),
            })
        }

        fn broken() -> Arc<Self> {
            Arc::new(Self {
                status: 0,
                body: Vec::new(),
                fail: true,
                urls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.urls.lock().len()
        }
    }

    impl Transport for FakeTransport {
        fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Response, TransportError>> {
            Box::pin(async move {
                self.urls.lock().push(url.to_string());
                if self.fail {
                    return Err(TransportError::Request("connection reset".into()));
                }
                Ok(Response {
                    status: self.status,
                    body: self.body.clone(),
                })
            })
        }
    }

    #[test]
    fn test_urls() {
        let dir = tempfile::tempdir().unwrap();
        let source = CdnSource::new(FakeTransport::ok(b""), dir.path());

        assert_eq!(
            source.url_for(&AssetKey::unicode(EmojiStyle::Apple, "👍")),
            "https://emojicdn.elk.sh/%F0%9F%91%8D?style=apple"
        );
        assert_eq!(
            source.url_for(&AssetKey::unicode(EmojiStyle::Microsoft3dFluent, "😎")),
            "https://emojicdn.elk.sh/%F0%9F%98%8E?style=microsoft-3D-fluent"
        );
        assert_eq!(
            source.url_for(&AssetKey::custom("596576798351949847")),
            "https://cdn.discordapp.com/emojis/596576798351949847.png"
        );

        let mirrored = source.with_base_url(format!("{}/", MIRROR_CDN_BASE));
        assert_eq!(
            mirrored.url_for(&AssetKey::unicode(EmojiStyle::Google, "👍")),
            "https://emoji-cdn.mqrio.dev/%F0%9F%91%8D?style=google"
        );
    }

    #[tokio::test]
    async fn test_download_persists_then_serves_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::ok(b"png-bytes");
        let source = CdnSource::new(transport.clone(), dir.path());
        let key = AssetKey::unicode(EmojiStyle::Apple, "👍");

        assert_eq!(source.fetch(&key).await.as_deref(), Some(&b"png-bytes"[..]));
        assert_eq!(transport.calls(), 1);

        let path = key.cache_path(dir.path());
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");

        // Second fetch comes from disk
        assert_eq!(source.fetch(&key).await.as_deref(), Some(&b"png-bytes"[..]));
        assert_eq!(transport.calls(), 1);

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_existing_file_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let key = AssetKey::custom("596576798351949847");
        let path = key.cache_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"cached").unwrap();

        let transport = FakeTransport::ok(b"fresh");
        let source = CdnSource::new(transport.clone(), dir.path());
        assert_eq!(source.fetch(&key).await.as_deref(), Some(&b"cached"[..]));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_200_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = CdnSource::new(FakeTransport::status(404), dir.path());
        let key = AssetKey::unicode(EmojiStyle::Apple, "👍");

        assert_eq!(source.fetch(&key).await, None);
        assert!(!key.cache_path(dir.path()).exists());
    }

    #[tokio::test]
    async fn test_transport_error_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = CdnSource::new(FakeTransport::broken(), dir.path());
        assert_eq!(source.fetch(&AssetKey::custom("596576798351949847")).await, None);
    }

    fn temp_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let key = AssetKey::unicode(EmojiStyle::Apple, "👍");
        let path = key.cache_path(dir.path());
        // A non-empty directory squatting on the final path
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let source = CdnSource::new(FakeTransport::ok(b"png-bytes"), dir.path());
        assert!(source.persist(&path, b"png-bytes").await.is_err());
        assert_eq!(temp_files(path.parent().unwrap()), 0);
    }

    #[tokio::test]
    async fn test_cancelled_persist_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let key = AssetKey::unicode(EmojiStyle::Apple, "🐍");
        let path = key.cache_path(dir.path());
        let source = CdnSource::new(FakeTransport::ok(b""), dir.path());

        {
            let mut write = Box::pin(source.persist(&path, b"png-bytes"));
            let _ = futures_util::poll!(&mut write);
        }

        for _ in 0..100 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
        assert_eq!(temp_files(path.parent().unwrap()), 0);
    }

    #[tokio::test]
    async fn test_persist_failure_still_returns_bytes() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the style directory should be
        std::fs::write(dir.path().join("apple"), b"not a directory").unwrap();

        let source = CdnSource::new(FakeTransport::ok(b"png-bytes"), dir.path());
        let key = AssetKey::unicode(EmojiStyle::Apple, "👍");
        assert_eq!(source.fetch(&key).await.as_deref(), Some(&b"png-bytes"[..]));
    }
}
