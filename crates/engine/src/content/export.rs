use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use super::atomic_io::write_atomic;
use super::store::{encode_world_document, PersistError};
use super::types::WorldDocument;

pub const BUNDLE_FORMAT_VERSION: u16 = 1;
pub const BUNDLE_WORLD_FILE: &str = "world.json";
pub const BUNDLE_MANIFEST_FILE: &str = "manifest.json";
const BUNDLE_ASSETS_DIR: &str = "assets";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format_version: u16,
    pub engine_version: String,
    pub world_sha256: String,
    pub scene_count: usize,
    pub sprite_count: usize,
    pub start_scene: Option<String>,
    pub assets: Vec<String>,
    pub missing_assets: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Encode(#[from] PersistError),
    #[error("failed to encode bundle manifest: {0}")]
    EncodeManifest(#[source] serde_json::Error),
    #[error("failed to write bundle file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to copy asset {asset} into bundle: {source}")]
    CopyAsset {
        asset: String,
        #[source]
        source: io::Error,
    },
}

/// Writes the document, its referenced assets and a manifest into `out_dir`.
///
/// The document is serialized once up front; everything written afterwards
/// describes that one snapshot.
pub fn export_bundle(
    document: &WorldDocument,
    asset_root: &Path,
    out_dir: &Path,
) -> Result<BundleManifest, ExportError> {
    let encoded = encode_world_document(document)?;
    let world_path = out_dir.join(BUNDLE_WORLD_FILE);
    write_atomic(&world_path, encoded.as_bytes()).map_err(|source| ExportError::Write {
        path: world_path.clone(),
        source,
    })?;

    let mut assets = Vec::new();
    let mut missing_assets = Vec::new();
    for asset in referenced_assets(document) {
        let Some(relative) = bundle_relative_path(&asset) else {
            warn!(asset = %asset, "export_asset_path_rejected");
            missing_assets.push(asset);
            continue;
        };
        let source_path = asset_root.join(&relative);
        if !source_path.is_file() {
            warn!(asset = %asset, source = %source_path.display(), "export_asset_missing");
            missing_assets.push(asset);
            continue;
        }
        let target_path = out_dir.join(BUNDLE_ASSETS_DIR).join(&relative);
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ExportError::CopyAsset {
                asset: asset.clone(),
                source,
            })?;
        }
        fs::copy(&source_path, &target_path).map_err(|source| ExportError::CopyAsset {
            asset: asset.clone(),
            source,
        })?;
        assets.push(asset);
    }

    let manifest = BundleManifest {
        format_version: BUNDLE_FORMAT_VERSION,
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        world_sha256: sha256_hex(encoded.as_bytes()),
        scene_count: document.scenes.len(),
        sprite_count: document.sprites.len(),
        start_scene: document.first_scene_id().map(ToString::to_string),
        assets,
        missing_assets,
    };
    let manifest_json =
        serde_json::to_string_pretty(&manifest).map_err(ExportError::EncodeManifest)?;
    let manifest_path = out_dir.join(BUNDLE_MANIFEST_FILE);
    write_atomic(&manifest_path, manifest_json.as_bytes()).map_err(|source| {
        ExportError::Write {
            path: manifest_path.clone(),
            source,
        }
    })?;

    info!(
        out_dir = %out_dir.display(),
        world_sha256 = %manifest.world_sha256,
        asset_count = manifest.assets.len(),
        missing_asset_count = manifest.missing_assets.len(),
        "world_bundle_exported"
    );
    Ok(manifest)
}

fn referenced_assets(document: &WorldDocument) -> BTreeSet<String> {
    document
        .sprites
        .iter()
        .flat_map(|sprite| sprite.referenced_assets())
        .map(ToString::to_string)
        .collect()
}

/// Only plain relative paths may be copied into a bundle.
fn bundle_relative_path(asset: &str) -> Option<PathBuf> {
    let path = Path::new(asset);
    let is_plain = path
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    (is_plain && !asset.is_empty()).then(|| path.to_path_buf())
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
