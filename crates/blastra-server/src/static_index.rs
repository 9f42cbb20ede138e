//! Static file index.
//!
//! Walks the static root once at startup and records, per regular file,
//! its URL path, MIME type, size, mtime, and a metadata-derived ETag.
//! The index is immutable for the process lifetime: files added to disk
//! later are invisible to routing, and file bytes are still read from
//! disk on every serve.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use blastra_core::result::AppResult;

/// Metadata for one indexed static file.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Leading-slash, forward-slash URL path.
    pub url_path: String,
    /// MIME type guessed from the extension.
    pub content_type: String,
    /// Quoted hex SHA-256 of `urlPath-size-mtimeNanos`. Derived from
    /// metadata, not content, so it is cheap for arbitrarily large files.
    pub etag: String,
    /// Last modification time at index build.
    pub mod_time: SystemTime,
    /// File size in bytes.
    pub size: u64,
}

/// Immutable set of files served directly from the static root.
#[derive(Debug, Default)]
pub struct StaticFileIndex {
    files: HashMap<String, FileEntry>,
    members: HashSet<String>,
    cache_control: HashMap<String, String>,
}

impl StaticFileIndex {
    /// Walk `root` and index every regular file whose *name* matches no
    /// pattern in `exclude`. `cache_control` maps lowercase extensions
    /// (with dot) to explicit Cache-Control values that win over policy.
    pub fn build(
        root: &Path,
        exclude: &[glob::Pattern],
        cache_control: HashMap<String, String>,
    ) -> AppResult<Self> {
        info!(root = %root.display(), "preloading static file metadata");

        let mut index = Self {
            cache_control,
            ..Self::default()
        };
        index.walk(root, root, exclude)?;
        Ok(index)
    }

    fn walk(&mut self, root: &Path, dir: &Path, exclude: &[glob::Pattern]) -> AppResult<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let metadata = entry.metadata()?;

            if metadata.is_dir() {
                self.walk(root, &path, exclude)?;
                continue;
            }
            if !metadata.is_file() {
                continue;
            }

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if exclude.iter().any(|pattern| pattern.matches(&name)) {
                debug!(file = %path.display(), "skipping excluded file");
                continue;
            }

            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let url_path = format!("/{rel}");

            let content_type = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string();
            let mod_time = metadata.modified().unwrap_or(UNIX_EPOCH);
            let size = metadata.len();
            let etag = file_etag(&url_path, size, mod_time);

            debug!(path = %url_path, "preloaded file metadata");
            self.members.insert(url_path.clone());
            self.files.insert(
                url_path.clone(),
                FileEntry {
                    url_path,
                    content_type,
                    etag,
                    mod_time,
                    size,
                },
            );
        }
        Ok(())
    }

    /// Pure membership probe used by the router.
    pub fn is_static(&self, url_path: &str) -> bool {
        self.members.contains(url_path)
    }

    pub fn get(&self, url_path: &str) -> Option<&FileEntry> {
        self.files.get(url_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Cache-Control for a static URL path, explicit overrides first.
    pub fn cache_control(&self, url_path: &str) -> String {
        cache_control_for(url_path, &self.cache_control)
    }
}

/// Extension-driven Cache-Control policy for static files.
pub fn cache_control_for(url_path: &str, overrides: &HashMap<String, String>) -> String {
    let ext = extension_of(url_path);
    if let Some(value) = overrides.get(&ext) {
        return value.clone();
    }

    match ext.as_str() {
        ".js" | ".css" | ".woff2" | ".woff" | ".ttf" | ".eot" => {
            "public, max-age=31536000, immutable".to_string()
        }
        ".html" | ".json" => "public, max-age=0, must-revalidate".to_string(),
        _ => {
            if url_path.starts_with("/assets/") {
                "public, max-age=31536000, immutable".to_string()
            } else {
                "public, max-age=3600".to_string()
            }
        }
    }
}

fn extension_of(url_path: &str) -> String {
    Path::new(url_path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn file_etag(url_path: &str, size: u64, mod_time: SystemTime) -> String {
    let nanos = mod_time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut hasher = Sha256::new();
    hasher.update(format!("{url_path}-{size}-{nanos}").as_bytes());
    format!("\"{}\"", hex::encode(hasher.finalize()))
}
