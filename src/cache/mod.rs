//! Cache module for incremental builds
//!
//! Tracks a content hash per document so unchanged pages are not rendered
//! again. Changes to the configuration, the templates, or the set of slugs
//! (which internal links resolve against) force a full rebuild.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;
use walkdir::WalkDir;

use crate::Site;

/// Cache directory, relative to the site root
pub const CACHE_DIR: &str = ".plume-cache";

/// Cache file name
const CACHE_FILE: &str = "db.json";

/// Represents a cached entry for a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hash of the raw source file
    pub content_hash: u64,
    /// Output path relative to the output dir
    pub output_path: String,
}

/// Cache database for tracking file changes
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheDb {
    /// Version of the cache format
    pub version: u32,
    pub config_hash: u64,
    pub templates_hash: u64,
    /// Hash of every (source, slug) pair
    pub slugs_hash: u64,
    /// Cached entries keyed by source path
    pub documents: HashMap<String, CacheEntry>,
}

impl CacheDb {
    /// Current cache format version
    const VERSION: u32 = 1;

    /// Load cache from disk, or create a new empty cache
    pub fn load(base_dir: &Path) -> Self {
        let cache_path = base_dir.join(CACHE_DIR).join(CACHE_FILE);
        if let Ok(content) = fs::read_to_string(&cache_path) {
            match serde_json::from_str::<CacheDb>(&content) {
                Ok(cache) if cache.version == Self::VERSION => return cache,
                Ok(_) => tracing::info!("Cache version mismatch, rebuilding cache"),
                Err(e) => tracing::warn!("Ignoring unreadable cache {:?}: {}", cache_path, e),
            }
        }
        Self::default()
    }

    /// Save cache to disk
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let cache_dir = base_dir.join(CACHE_DIR);
        fs::create_dir_all(&cache_dir)?;

        let content = serde_json::to_string_pretty(self)?;
        fs::write(cache_dir.join(CACHE_FILE), content)?;
        Ok(())
    }

    /// Create a new cache with version set
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// The current state of one document, as the cache sees it
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub source: String,
    pub slug: String,
    pub content_hash: u64,
    pub output_path: String,
}

/// Global inputs every page depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub config_hash: u64,
    pub templates_hash: u64,
    pub slugs_hash: u64,
}

impl Fingerprint {
    /// Compute the fingerprint of a site and its documents
    pub fn compute(site: &Site, snapshots: &[Snapshot]) -> Result<Self> {
        let config_path = site.config_path();
        let config_hash = if config_path.exists() {
            hash_file(&config_path)?
        } else {
            0
        };
        let templates_hash = if site.templates_dir.is_dir() {
            hash_directory(&site.templates_dir)?
        } else {
            0
        };
        let slugs: BTreeMap<_, _> = snapshots
            .iter()
            .map(|s| (s.source.as_str(), s.slug.as_str()))
            .collect();
        let slugs_hash = hash_value(&slugs);

        Ok(Self {
            config_hash,
            templates_hash,
            slugs_hash,
        })
    }
}

/// Change detection result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Documents that need rendering (source path)
    pub changed: Vec<String>,
    /// Output paths of documents that no longer exist
    pub deleted: Vec<String>,
    /// Whether the index page needs regeneration
    pub rebuild_index: bool,
    /// Whether to regenerate everything
    pub full_rebuild: bool,
}

impl ChangeSet {
    /// Create a changeset indicating full rebuild is needed
    pub fn full_rebuild() -> Self {
        Self {
            changed: Vec::new(),
            deleted: Vec::new(),
            rebuild_index: true,
            full_rebuild: true,
        }
    }

    /// Create an empty changeset (no changes)
    pub fn empty() -> Self {
        Self {
            changed: Vec::new(),
            deleted: Vec::new(),
            rebuild_index: false,
            full_rebuild: false,
        }
    }

    /// Check if any changes were detected
    pub fn has_changes(&self) -> bool {
        self.full_rebuild
            || self.rebuild_index
            || !self.changed.is_empty()
            || !self.deleted.is_empty()
    }

    /// Get summary of changes for logging
    pub fn summary(&self) -> String {
        if self.full_rebuild {
            return "full rebuild required".to_string();
        }

        let mut parts = Vec::new();
        if !self.changed.is_empty() {
            parts.push(format!("{} documents changed", self.changed.len()));
        }
        if !self.deleted.is_empty() {
            parts.push(format!("{} documents deleted", self.deleted.len()));
        }
        if self.rebuild_index {
            parts.push("index page".to_string());
        }

        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Calculate a hash for file content
pub fn hash_content(content: &str) -> u64 {
    hash_value(&content)
}

fn hash_value<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Calculate a hash for a file on disk
pub fn hash_file(path: &Path) -> Result<u64> {
    let content = fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

/// Calculate hash for a directory of templates
pub fn hash_directory(dir: &Path) -> Result<u64> {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();

    // Collect and sort paths for deterministic ordering
    let mut paths: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();

    for path in paths {
        path.to_string_lossy().hash(&mut hasher);
        fs::read(&path)?.hash(&mut hasher);
    }

    Ok(hasher.finish())
}

/// Detect changes between current state and cached state
///
/// Output paths of documents that disappeared are always reported, even when
/// a full rebuild is required.
pub fn detect_changes(cache: &CacheDb, fingerprint: &Fingerprint, current: &[Snapshot]) -> ChangeSet {
    let current_outputs: HashSet<_> = current.iter().map(|s| s.output_path.as_str()).collect();
    let mut deleted: Vec<String> = cache
        .documents
        .iter()
        .filter(|(_, cached)| !current_outputs.contains(cached.output_path.as_str()))
        .map(|(source, cached)| {
            tracing::debug!("Deleted document: {}", source);
            cached.output_path.clone()
        })
        .collect();
    deleted.sort();
    deleted.dedup();

    let full_rebuild = if cache.config_hash != fingerprint.config_hash {
        tracing::info!("Config changed, full rebuild required");
        true
    } else if cache.templates_hash != fingerprint.templates_hash {
        tracing::info!("Templates changed, full rebuild required");
        true
    } else if cache.slugs_hash != fingerprint.slugs_hash {
        tracing::info!("Document set changed, full rebuild required");
        true
    } else {
        false
    };
    if full_rebuild {
        return ChangeSet {
            deleted,
            ..ChangeSet::full_rebuild()
        };
    }

    let mut changeset = ChangeSet::empty();
    changeset.rebuild_index = !deleted.is_empty();
    changeset.deleted = deleted;

    for snapshot in current {
        match cache.documents.get(&snapshot.source) {
            Some(cached) if cached.content_hash == snapshot.content_hash => {}
            Some(_) => {
                tracing::debug!("Document changed: {}", snapshot.source);
                changeset.changed.push(snapshot.source.clone());
                changeset.rebuild_index = true;
            }
            None => {
                tracing::debug!("New document: {}", snapshot.source);
                changeset.changed.push(snapshot.source.clone());
                changeset.rebuild_index = true;
            }
        }
    }

    changeset
}

/// Build a fresh cache from the current state
pub fn snapshot_cache(fingerprint: &Fingerprint, current: &[Snapshot]) -> CacheDb {
    let mut cache = CacheDb::new();
    cache.config_hash = fingerprint.config_hash;
    cache.templates_hash = fingerprint.templates_hash;
    cache.slugs_hash = fingerprint.slugs_hash;
    cache.documents = current
        .iter()
        .map(|s| {
            (
                s.source.clone(),
                CacheEntry {
                    content_hash: s.content_hash,
                    output_path: s.output_path.clone(),
                },
            )
        })
        .collect();
    cache
}
