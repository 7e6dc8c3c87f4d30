//! Downloaded DLL payload cache, keyed by name and version.
//!
//! Payloads are fetched once, checksum-verified, and reused for every game
//! that needs the same build.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::manifest::ManifestDll;
use crate::error::{Error, Result};

/// Cache location for one build: `<cache>/<name>/<version>.dll`.
pub fn payload_path(cache_dir: &Path, name: &str, version: &str) -> PathBuf {
    cache_dir.join(name).join(format!("{version}.dll"))
}

pub fn is_cached(cache_dir: &Path, name: &str, version: &str) -> bool {
    payload_path(cache_dir, name, version).is_file()
}

/// Return the cached payload for `build`, downloading it first if needed.
pub async fn get_or_download(
    client: &reqwest::Client,
    cache_dir: &Path,
    name: &str,
    build: &ManifestDll,
) -> Result<PathBuf> {
    let target = payload_path(cache_dir, name, &build.version);
    if target.is_file() {
        debug!("payload cache hit for {} {}", name, build.version);
        return Ok(target);
    }
    download(client, cache_dir, name, build).await
}

/// Download one build into the cache.
///
/// The payload is streamed into a temp file next to its final location while
/// being hashed, verified against the manifest checksum when one is
/// published, and renamed into place. A failed download never leaves a
/// partial file at the cached path.
pub async fn download(
    client: &reqwest::Client,
    cache_dir: &Path,
    name: &str,
    build: &ManifestDll,
) -> Result<PathBuf> {
    let target = payload_path(cache_dir, name, &build.version);
    let parent = target.parent().expect("payload path always has a parent");
    crate::paths::ensure_dir(parent)?;

    info!("downloading {} {} from {}", name, build.version, build.url);
    let mut response = client.get(&build.url).send().await?.error_for_status()?;

    let mut temp =
        NamedTempFile::new_in(parent).map_err(|e| Error::io("creating temp file", parent, e))?;
    let mut hasher = Sha256::new();

    while let Some(chunk) = response.chunk().await? {
        hasher.update(&chunk);
        temp.write_all(&chunk)
            .map_err(|e| Error::io("writing payload", &target, e))?;
    }
    temp.flush()
        .map_err(|e| Error::io("flushing payload", &target, e))?;

    let actual: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    if !build.sha256.is_empty() && !actual.eq_ignore_ascii_case(&build.sha256) {
        return Err(Error::ChecksumMismatch {
            name: name.to_string(),
            expected: build.sha256.clone(),
            actual,
        });
    }

    temp.persist(&target)
        .map_err(|e| Error::io("persisting payload", &target, e.error))?;
    Ok(target)
}

/// Remove every cached payload.
pub fn clear_cache(cache_dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(cache_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io("clearing payload cache", cache_dir, e)),
    }
}

/// Total bytes held in the payload cache.
pub fn cache_size(cache_dir: &Path) -> u64 {
    WalkDir::new(cache_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
