//! Persistence layer for tutor-vector.
//!
//! Each collection lives in its own directory under the database root:
//!
//! - `{base_path}/{name}/metadata.json` - spec, counts, build time
//! - `{base_path}/{name}/vectors.json` - records (id, content, vector, metadata)
//!
//! Writes are all-or-nothing: a collection is written to a hidden sibling
//! directory and renamed into place, so a failed build never leaves a
//! half-written collection where a reader would find it.

use crate::collection::Collection;
use crate::config::HnswConfig;
use crate::error::{Error, Result};
use crate::types::{CollectionSpec, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

const FORMAT_VERSION: u32 = 1;
const METADATA_FILE: &str = "metadata.json";
const VECTORS_FILE: &str = "vectors.json";

/// Collection metadata stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionMetadata {
    format_version: u32,
    name: String,
    spec: CollectionSpec,
    vector_count: usize,
    created_at: DateTime<Utc>,
    hnsw: HnswConfig,
}

/// Directory a collection is stored in.
pub fn collection_path(base_path: &Path, name: &str) -> PathBuf {
    base_path.join(name)
}

/// Whether a collection directory exists on disk (readable or not).
pub async fn collection_exists(base_path: &Path, name: &str) -> Result<bool> {
    Ok(tokio::fs::try_exists(collection_path(base_path, name)).await?)
}

/// List the collection directories under `base_path`, sorted by name.
pub async fn list_collections(base_path: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if !tokio::fs::try_exists(base_path).await? {
        return Ok(names);
    }

    let mut entries = tokio::fs::read_dir(base_path).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        // in-flight or abandoned temporary directories
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Save a collection to disk.
///
/// With `overwrite == false` an existing collection directory is an error
/// ([`Error::CollectionExists`]); with `overwrite == true` it is replaced.
pub async fn save_collection(
    base_path: &Path,
    collection: &Collection,
    overwrite: bool,
) -> Result<()> {
    let name = collection.name();
    let target = collection_path(base_path, name);

    if !overwrite && tokio::fs::try_exists(&target).await? {
        return Err(Error::CollectionExists(name.to_string()));
    }

    tokio::fs::create_dir_all(base_path).await?;
    let staging = base_path.join(format!(".{}.tmp-{}", name, Uuid::new_v4()));

    if let Err(e) = write_collection_files(&staging, collection).await {
        let _ = tokio::fs::remove_dir_all(&staging).await;
        return Err(e);
    }

    if let Err(e) = swap_into_place(base_path, name, &staging, &target, overwrite).await {
        let _ = tokio::fs::remove_dir_all(&staging).await;
        return Err(e);
    }

    info!(name, path = ?target, count = collection.len(), "Saved collection");
    Ok(())
}

async fn write_collection_files(dir: &Path, collection: &Collection) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    let metadata = CollectionMetadata {
        format_version: FORMAT_VERSION,
        name: collection.name().to_string(),
        spec: collection.spec().clone(),
        vector_count: collection.len(),
        created_at: collection.created_at(),
        hnsw: collection.hnsw_config().clone(),
    };

    let vectors_json = serde_json::to_vec(collection.records())
        .map_err(|e| Error::Persistence(format!("Failed to serialize vectors: {}", e)))?;
    tokio::fs::write(dir.join(VECTORS_FILE), vectors_json).await?;

    let metadata_json = serde_json::to_string_pretty(&metadata)
        .map_err(|e| Error::Persistence(format!("Failed to serialize metadata: {}", e)))?;
    tokio::fs::write(dir.join(METADATA_FILE), metadata_json).await?;

    Ok(())
}

async fn swap_into_place(
    base_path: &Path,
    name: &str,
    staging: &Path,
    target: &Path,
    overwrite: bool,
) -> Result<()> {
    if !tokio::fs::try_exists(target).await? {
        tokio::fs::rename(staging, target).await?;
        return Ok(());
    }
    if !overwrite {
        return Err(Error::CollectionExists(name.to_string()));
    }

    let retired = base_path.join(format!(".{}.old-{}", name, Uuid::new_v4()));
    tokio::fs::rename(target, &retired).await?;

    if let Err(e) = tokio::fs::rename(staging, target).await {
        // put the previous collection back before reporting
        if let Err(restore) = tokio::fs::rename(&retired, target).await {
            warn!(name, error = %restore, "Failed to restore previous collection");
        }
        return Err(e.into());
    }

    if let Err(e) = tokio::fs::remove_dir_all(&retired).await {
        warn!(name, path = ?retired, error = %e, "Failed to remove replaced collection");
    }
    Ok(())
}

/// Load a collection from disk.
///
/// # Errors
///
/// [`Error::CollectionNotFound`] if there is no directory for `name`;
/// [`Error::Corrupted`] if the directory exists but cannot be read back.
pub async fn load_collection(base_path: &Path, name: &str) -> Result<Collection> {
    let dir = collection_path(base_path, name);
    if !tokio::fs::try_exists(&dir).await? {
        return Err(Error::CollectionNotFound(name.to_string()));
    }

    let metadata_json = tokio::fs::read_to_string(dir.join(METADATA_FILE))
        .await
        .map_err(|e| Error::corrupted(name, format!("cannot read {}: {}", METADATA_FILE, e)))?;
    let metadata: CollectionMetadata = serde_json::from_str(&metadata_json)
        .map_err(|e| Error::corrupted(name, format!("cannot parse {}: {}", METADATA_FILE, e)))?;

    if metadata.format_version != FORMAT_VERSION {
        return Err(Error::corrupted(
            name,
            format!("unsupported format version {}", metadata.format_version),
        ));
    }

    let vectors_json = tokio::fs::read(dir.join(VECTORS_FILE))
        .await
        .map_err(|e| Error::corrupted(name, format!("cannot read {}: {}", VECTORS_FILE, e)))?;
    let records: Vec<Record> = serde_json::from_slice(&vectors_json)
        .map_err(|e| Error::corrupted(name, format!("cannot parse {}: {}", VECTORS_FILE, e)))?;

    if records.len() != metadata.vector_count {
        return Err(Error::corrupted(
            name,
            format!(
                "expected {} vectors, found {}",
                metadata.vector_count,
                records.len()
            ),
        ));
    }

    let count = records.len();
    let collection = Collection::with_created_at(
        name.to_string(),
        metadata.spec,
        records,
        metadata.hnsw,
        metadata.created_at,
    )
    .map_err(|e| Error::corrupted(name, e.to_string()))?;

    debug!(name, count, "Loaded vectors");
    info!(name, dimensions = collection.dimensions(), "Loaded collection");
    Ok(collection)
}

/// Remove a collection directory. Returns whether anything was removed.
pub async fn delete_collection(base_path: &Path, name: &str) -> Result<bool> {
    let dir = collection_path(base_path, name);
    if !tokio::fs::try_exists(&dir).await? {
        return Ok(false);
    }
    tokio::fs::remove_dir_all(&dir).await?;
    Ok(true)
}
