//! Drop-folder source
//!
//! Enumerates image files under a local directory, typically one populated
//! by a downloader that writes a `<image>.json` metadata sidecar next to
//! each file. Sidecar fields fill in artist, platform, title, tags, and
//! post date; files without a sidecar fall back to metadata inferred from
//! the directory layout (`<platform>/<artist>/<file>`).

use crate::catalog::ArtworkMeta;
use crate::core::error::{IngestError, Result};
use crate::source::{ItemSource, SourceItem};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions treated as importable images
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Longest title taken from post text
const MAX_TITLE_LEN: usize = 200;

/// Source over a local drop directory
pub struct FolderSource {
    root: PathBuf,
    locator: String,
}

impl FolderSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        let locator = root.to_string_lossy().to_string();
        Self { root, locator }
    }
}

impl ItemSource for FolderSource {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn items(&mut self) -> Result<Vec<SourceItem>> {
        let mut items = Vec::new();

        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_image(path) {
                continue;
            }

            let remote_id = relative_id(&self.root, path);
            let meta = match read_sidecar(path) {
                Some(value) => meta_from_sidecar(&value, path),
                None => meta_from_layout(&self.root, path),
            };

            let fetch_path = path.to_path_buf();
            let fetch_id = remote_id.clone();
            items.push(SourceItem::new(
                remote_id,
                meta,
                Some(path.to_path_buf()),
                Box::new(move || {
                    fs::read(&fetch_path).map_err(|e| IngestError::Fetch {
                        remote_id: fetch_id.clone(),
                        message: e.to_string(),
                    })
                }),
            ));
        }

        debug!("Enumerated {} images under {:?}", items.len(), self.root);
        Ok(items)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Root-relative path with forward slashes, stable across platforms
fn relative_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Load the `<image>.json` sidecar next to an image, if present and valid
fn read_sidecar(image_path: &Path) -> Option<Value> {
    let mut sidecar = image_path.as_os_str().to_owned();
    sidecar.push(".json");
    let content = fs::read_to_string(Path::new(&sidecar)).ok()?;
    serde_json::from_str(&content).ok()
}

fn meta_from_sidecar(value: &Value, path: &Path) -> ArtworkMeta {
    let artist = first_string(
        value,
        &[&["author", "name"][..], &["user", "nick"][..], &["username"][..]],
    )
    .unwrap_or_else(|| fallback_artist(path));

    let platform =
        first_string(value, &[&["category"][..]]).unwrap_or_else(|| "local".to_string());

    let mut title = value
        .get("content")
        .or_else(|| value.get("description"))
        .and_then(Value::as_str)
        .and_then(title_from_text)
        .unwrap_or_else(|| file_stem(path));

    // Multi-image posts share one text; number the individual files
    let count = value.get("count").and_then(Value::as_u64).unwrap_or(1);
    if count > 1 {
        if let Some(num) = value.get("num").and_then(Value::as_u64) {
            title = format!("{} ({})", title, num);
        }
    }

    let tags = value
        .get("hashtags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ArtworkMeta {
        artist,
        platform,
        title,
        tags,
        description: value
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        source_url: first_string(value, &[&["url"][..], &["tweet_url"][..]]),
        posted_at: value
            .get("date")
            .and_then(Value::as_str)
            .and_then(parse_post_date),
    }
}

/// Metadata for a bare file: `<root>/<platform>/<artist>/<file>`
fn meta_from_layout(root: &Path, path: &Path) -> ArtworkMeta {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut ancestors: Vec<String> = relative
        .parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();

    let artist = ancestors.pop().unwrap_or_else(|| "unknown".to_string());
    let platform = ancestors.pop().unwrap_or_else(|| "local".to_string());

    ArtworkMeta {
        artist,
        platform,
        title: file_stem(path),
        ..Default::default()
    }
}

/// First non-empty line of post text, hashtag words removed, length-capped
fn title_from_text(text: &str) -> Option<String> {
    for line in text.lines() {
        let cleaned: String = line
            .split_whitespace()
            .filter(|word| !word.starts_with('#'))
            .collect::<Vec<_>>()
            .join(" ");
        if !cleaned.is_empty() {
            return Some(cleaned.chars().take(MAX_TITLE_LEN).collect());
        }
    }
    None
}

fn parse_post_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "untitled".to_string())
}

fn fallback_artist(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn first_string(value: &Value, paths: &[&[&str]]) -> Option<String> {
    for path in paths {
        let mut current = value;
        let mut found = true;
        for key in *path {
            match current.get(key) {
                Some(next) => current = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            if let Some(s) = current.as_str() {
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
    }
    None
}
