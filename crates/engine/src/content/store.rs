use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use super::atomic_io::write_atomic;
use super::types::WorldDocument;
use super::validation::WorldIssue;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {message}")]
pub struct DocumentFormatError {
    pub location: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum WorldLoadError {
    #[error("failed to read world document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse world document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: DocumentFormatError,
    },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import is not a valid world document ({0}); fix the file and try again")]
    Format(#[from] DocumentFormatError),
    #[error("import rejected: {}; fix the file and try again", join_issues(.issues))]
    Invalid { issues: Vec<WorldIssue> },
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to encode world document: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write world document {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// The imported document becomes the whole world.
    Replace,
    /// Entries with matching ids are replaced in place, new ones are appended.
    Merge,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub scenes_added: usize,
    pub scenes_replaced: usize,
    pub sprites_added: usize,
    pub sprites_replaced: usize,
    pub warnings: Vec<WorldIssue>,
}

pub fn parse_world_document(raw: &str) -> Result<WorldDocument, DocumentFormatError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, WorldDocument>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let location = if path.is_empty() || path == "." {
            "document root".to_string()
        } else {
            format!("at {path}")
        };
        DocumentFormatError {
            location,
            message: error.into_inner().to_string(),
        }
    })
}

/// Reads the persisted world, merged over the built-in default. A missing
/// file yields the default world.
pub fn load_world_document(path: &Path) -> Result<WorldDocument, WorldLoadError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "world_document_missing_using_builtin");
            return Ok(WorldDocument::builtin());
        }
        Err(source) => {
            return Err(WorldLoadError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let document = parse_world_document(&raw).map_err(|source| WorldLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    for issue in document.validate() {
        warn!(path = %path.display(), issue = %issue, "world_document_issue");
    }
    info!(
        path = %path.display(),
        scene_count = document.scenes.len(),
        sprite_count = document.sprites.len(),
        "world_document_loaded"
    );
    Ok(document)
}

pub fn encode_world_document(document: &WorldDocument) -> Result<String, PersistError> {
    serde_json::to_string_pretty(document).map_err(PersistError::Encode)
}

/// Rewrites the whole document; there are no partial updates.
pub fn persist_world_document(path: &Path, document: &WorldDocument) -> Result<(), PersistError> {
    let encoded = encode_world_document(document)?;
    write_atomic(path, encoded.as_bytes()).map_err(|source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        scene_count = document.scenes.len(),
        sprite_count = document.sprites.len(),
        "world_document_persisted"
    );
    Ok(())
}

/// Parses and validates `raw` completely before touching `current`; on any
/// error `current` is left exactly as it was.
pub fn import_world_document(
    current: &mut WorldDocument,
    raw: &str,
    mode: ImportMode,
) -> Result<ImportSummary, ImportError> {
    let incoming = parse_world_document(raw)?;
    let mut summary = ImportSummary::default();

    let candidate = match mode {
        ImportMode::Replace => {
            summary.scenes_added = incoming.scenes.len();
            summary.sprites_added = incoming.sprites.len();
            incoming
        }
        ImportMode::Merge => {
            let mut merged = current.clone();
            for sprite in incoming.sprites {
                match merged.sprites.iter_mut().find(|entry| entry.id == sprite.id) {
                    Some(entry) => {
                        *entry = sprite;
                        summary.sprites_replaced += 1;
                    }
                    None => {
                        merged.sprites.push(sprite);
                        summary.sprites_added += 1;
                    }
                }
            }
            for scene in incoming.scenes {
                match merged.scenes.iter_mut().find(|entry| entry.id == scene.id) {
                    Some(entry) => {
                        *entry = scene;
                        summary.scenes_replaced += 1;
                    }
                    None => {
                        merged.scenes.push(scene);
                        summary.scenes_added += 1;
                    }
                }
            }
            merged
        }
    };

    let (fatal, warnings): (Vec<_>, Vec<_>) = candidate
        .validate()
        .into_iter()
        .partition(WorldIssue::is_fatal);
    if !fatal.is_empty() {
        return Err(ImportError::Invalid { issues: fatal });
    }

    summary.warnings = warnings;
    *current = candidate;
    info!(
        mode = ?mode,
        scenes_added = summary.scenes_added,
        scenes_replaced = summary.scenes_replaced,
        sprites_added = summary.sprites_added,
        sprites_replaced = summary.sprites_replaced,
        warning_count = summary.warnings.len(),
        "world_document_imported"
    );
    Ok(summary)
}

fn join_issues(issues: &[WorldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
