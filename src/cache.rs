//! Memoized load → normalize → resolve, one entry per path, validated by a
//! content fingerprint.
//!
//! The fingerprint is a SHA-256 digest over the source bytes and the options
//! that affect decoding, so editing the file or changing the sheet yields a
//! fresh entry while repeated loads of unchanged content reuse the table.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::{
    error::{QueryError, QueryResult},
    labels::FieldLabels,
    normalize::{NormalizeOptions, NormalizedTable, normalize_with},
    resolve::{SchemaAnnotation, resolve},
    source::{RawTable, SourceOptions},
};

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub source: SourceOptions,
    pub labels: FieldLabels,
    pub normalize: NormalizeOptions,
}

/// A decoded, normalized and annotated source. Immutable; shared by `Arc`.
#[derive(Debug)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub fingerprint: String,
    pub table: NormalizedTable,
    pub annotation: SchemaAnnotation,
}

impl LoadedSource {
    pub fn from_raw(
        path: impl Into<PathBuf>,
        fingerprint: impl Into<String>,
        raw: &RawTable,
        options: &LoadOptions,
    ) -> QueryResult<Self> {
        let table = normalize_with(raw, &options.labels, options.normalize)?;
        let annotation = resolve(&table, &options.labels);
        Ok(Self {
            path: path.into(),
            fingerprint: fingerprint.into(),
            table,
            annotation,
        })
    }
}

/// One entry per source path. An entry is reused only while the path's
/// content and load options still hash to the stored fingerprint, so two
/// paths with identical content never share or evict each other's entry.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: HashMap<PathBuf, Arc<LoadedSource>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads `path` once; the bytes that are fingerprinted are the bytes
    /// that get decoded.
    pub fn load(&mut self, path: &Path, options: &LoadOptions) -> QueryResult<Arc<LoadedSource>> {
        let bytes = fs::read(path).map_err(|err| QueryError::unavailable(path, err))?;
        let fingerprint = fingerprint(&bytes, options);
        if let Some(entry) = self.entries.get(path) {
            if entry.fingerprint == fingerprint {
                debug!("Cache hit for {path:?} ({})", short(&fingerprint));
                return Ok(Arc::clone(entry));
            }
            debug!(
                "Source {path:?} changed; evicting {}",
                short(&entry.fingerprint)
            );
        }
        let raw = RawTable::from_bytes(path, &bytes, &options.source)?;
        let loaded = Arc::new(LoadedSource::from_raw(path, fingerprint.clone(), &raw, options)?);
        info!(
            "Loaded {:?}: {} row(s), {} column(s) ({})",
            path,
            loaded.table.row_count(),
            loaded.table.columns().len(),
            short(&fingerprint)
        );
        self.entries.insert(path.to_path_buf(), Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Drops the entry loaded from `path`. Returns whether one existed.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        match self.entries.remove(path) {
            Some(entry) => {
                debug!("Invalidated {path:?} ({})", short(&entry.fingerprint));
                true
            }
            None => false,
        }
    }

    pub fn reload(&mut self, path: &Path, options: &LoadOptions) -> QueryResult<Arc<LoadedSource>> {
        self.invalidate(path);
        self.load(path, options)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn fingerprint(bytes: &[u8], options: &LoadOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update([0u8]);
    hasher.update(options.source.sheet.as_deref().unwrap_or("").as_bytes());
    hasher.update([0u8, options.source.delimiter.unwrap_or(0)]);
    hasher.update(options.source.encoding.as_deref().unwrap_or("").as_bytes());
    hasher.update([0u8, options.normalize.duplicate_headers as u8]);
    if let Ok(labels) = serde_json::to_vec(&options.labels) {
        hasher.update(labels);
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn short(fingerprint: &str) -> &str {
    &fingerprint[..fingerprint.len().min(12)]
}
