// Collection and request discovery for bruno-runner
// Uses walkdir to find collection roots and the .bru request files inside them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::cache::PerformanceManager;
use crate::error::{BrunoError, Result};
use crate::models::RequestRecord;
use crate::parsers::bruno::{file_stem, BruFileParser};

pub const MANIFEST_FILE: &str = "bruno.json";
pub const LEGACY_MARKER_FILE: &str = "collection.bru";
pub const ENVIRONMENTS_DIR: &str = "environments";
pub const REQUEST_EXTENSION: &str = "bru";
pub const MAX_DISCOVERY_DEPTH: usize = 10;
const PACKAGE_DIR: &str = "node_modules";

pub struct CollectionDiscoverer {
    parser: BruFileParser,
    cache: Arc<PerformanceManager>,
}

impl CollectionDiscoverer {
    pub fn new(cache: Arc<PerformanceManager>) -> Self {
        Self {
            parser: BruFileParser,
            cache,
        }
    }

    /// True when `dir` holds a bruno.json manifest or the legacy collection.bru marker.
    pub fn is_collection_root(dir: &Path) -> bool {
        dir.join(MANIFEST_FILE).is_file() || dir.join(LEGACY_MARKER_FILE).is_file()
    }

    /// Every request file under `root`, skipping `environments/` and `node_modules/`.
    pub fn list_requests(&self, root: &Path) -> Result<Vec<RequestRecord>> {
        if !root.is_dir() {
            return Err(BrunoError::NotFound {
                path: root.to_path_buf(),
            });
        }
        if !Self::is_collection_root(root) {
            return Err(BrunoError::NotACollection {
                path: root.to_path_buf(),
            });
        }

        let key = root.display().to_string();
        if let Some(records) = self.cache.cached_requests(&key) {
            debug!(collection = %key, "request list served from cache");
            return Ok(records);
        }

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_request_dir(e));

        let mut records = Vec::new();
        for entry in walker.filter_map(|e| e.ok()) {
            if !is_request_file(&entry) {
                continue;
            }
            records.push(self.request_record(root, entry.path()));
        }

        debug!(collection = %key, count = records.len(), "listed requests");
        self.cache.cache_requests(&key, &records);
        Ok(records)
    }

    fn request_record(&self, root: &Path, path: &Path) -> RequestRecord {
        let info = match std::fs::read_to_string(path) {
            Ok(text) => self.parser.parse_basic_info(&text),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "could not read request file");
                Default::default()
            }
        };
        let folder = path
            .parent()
            .and_then(|dir| dir.strip_prefix(root).ok())
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .filter(|rel| !rel.is_empty());

        RequestRecord {
            name: info.name.unwrap_or_else(|| file_stem(path)),
            method: info.method,
            url: info.url,
            folder,
            file_path: path.to_path_buf(),
        }
    }

    /// Collection roots below `search_root`, at most `MAX_DISCOVERY_DEPTH` levels deep.
    /// Unreadable directories are skipped and collections never nest.
    pub fn discover_collections(&self, search_root: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
        if !search_root.is_dir() {
            return Err(BrunoError::NotFound {
                path: search_root.to_path_buf(),
            });
        }
        let depth = max_depth.min(MAX_DISCOVERY_DEPTH);
        let key = format!("{}:{}", search_root.display(), depth);
        if let Some(roots) = self.cache.cached_collections(&key) {
            debug!(search_root = %search_root.display(), "collection discovery served from cache");
            return Ok(roots);
        }

        let mut roots = Vec::new();
        let mut walker = WalkDir::new(search_root)
            .max_depth(depth)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if entry.depth() > 0 && is_hidden_or_package_dir(&entry) {
                walker.skip_current_dir();
                continue;
            }
            if Self::is_collection_root(entry.path()) {
                roots.push(entry.path().to_path_buf());
                walker.skip_current_dir();
            }
        }

        debug!(search_root = %search_root.display(), depth, count = roots.len(), "discovered collections");
        self.cache.cache_collections(&key, &roots);
        Ok(roots)
    }

    /// Resolves a request by name: exact, then case-insensitive, then substring.
    /// Names are compared against both `meta.name` and the file stem; the first
    /// match in walk order wins within a tier.
    pub fn find_request_file(&self, root: &Path, name: &str) -> Result<Option<PathBuf>> {
        let records = self.list_requests(root)?;
        let candidates: Vec<(&RequestRecord, String)> = records
            .iter()
            .map(|r| (r, file_stem(&r.file_path)))
            .collect();

        let wanted = name.to_lowercase();
        let tier = |matches: &dyn Fn(&str) -> bool| {
            candidates
                .iter()
                .find(|(r, stem)| matches(&r.name) || matches(stem))
                .map(|(r, _)| r.file_path.clone())
        };

        Ok(tier(&|c| c == name)
            .or_else(|| tier(&|c| c.to_lowercase() == wanted))
            .or_else(|| tier(&|c| c.to_lowercase().contains(&wanted))))
    }
}

fn dir_name(entry: &DirEntry) -> std::borrow::Cow<'_, str> {
    entry.file_name().to_string_lossy()
}

fn is_skipped_request_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && matches!(dir_name(entry).as_ref(), ENVIRONMENTS_DIR | PACKAGE_DIR)
}

fn is_hidden_or_package_dir(entry: &DirEntry) -> bool {
    let name = dir_name(entry);
    name.starts_with('.') || name == PACKAGE_DIR
}

fn is_request_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.path().extension().map_or(false, |ext| ext == REQUEST_EXTENSION)
        && entry.file_name() != LEGACY_MARKER_FILE
}
