//! Local directory source
//!
//! Serves assets from a pre-populated directory with the same layout as the
//! CDN cache (`{dir}/{style}/{emoji}.png`, `{dir}/discord/{id}.png`).

use std::io;
use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use log::{trace, warn};

use super::{AssetKey, AssetSource};

#[derive(Debug, Clone)]
pub struct LocalSource {
    dir: PathBuf,
}

impl LocalSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AssetSource for LocalSource {
    fn fetch<'a>(&'a self, key: &'a AssetKey) -> BoxFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let path = key.cache_path(&self.dir);
            match tokio::fs::read(&path).await {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    trace!("local asset missing: {}", path.display());
                    None
                }
                Err(e) => {
                    warn!("cannot read {}: {}", path.display(), e);
                    None
                }
            }
        })
    }
}
