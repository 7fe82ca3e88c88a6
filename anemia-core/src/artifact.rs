//! Reading and writing the scaler and classifier artifacts.
//!
//! Artifacts are JSON envelopes:
//!
//! ```json
//! { "schema_version": 1, "fitted_at": "2024-05-01T12:00:00Z", "artifact": { ... } }
//! ```
//!
//! Loading is strict: unknown fields are rejected. The one exception is a
//! short list of legacy classifier attributes that older exporters wrote;
//! those are stripped and the load is retried once.

use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use memmap2::{Mmap, MmapOptions};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ArtifactKind, PipelineError};
use crate::model::{Classifier, StandardScaler};

/// Envelope version this build reads and writes.
pub const SCHEMA_VERSION: u32 = 1;

/// Tree attributes written by older exporters that carry no meaning for
/// prediction.
pub const LEGACY_TREE_ATTRIBUTES: &[&str] = &["monotonic_cst"];

/// A type that can be stored as an artifact file.
pub trait Artifact: Serialize + DeserializeOwned {
    const KIND: ArtifactKind;

    /// Internal consistency check run after deserialization.
    fn check(&self) -> Result<(), String>;

    /// Remove known legacy attributes from a raw payload, returning the
    /// names that were removed.
    fn strip_legacy(_payload: &mut Value) -> Vec<String> {
        Vec::new()
    }
}

impl Artifact for StandardScaler {
    const KIND: ArtifactKind = ArtifactKind::Scaler;

    fn check(&self) -> Result<(), String> {
        StandardScaler::check(self)
    }
}

impl Artifact for Classifier {
    const KIND: ArtifactKind = ArtifactKind::Classifier;

    fn check(&self) -> Result<(), String> {
        Classifier::check(self)
    }

    fn strip_legacy(payload: &mut Value) -> Vec<String> {
        let mut removed = Vec::new();
        let forest = payload.get("kind").and_then(Value::as_str) == Some("random_forest");
        if let Some(params) = payload.get_mut("params") {
            removed.extend(strip_keys(params, LEGACY_TREE_ATTRIBUTES));
            if forest {
                if let Some(trees) = params.get_mut("estimators").and_then(Value::as_array_mut) {
                    for (i, tree) in trees.iter_mut().enumerate() {
                        for name in strip_keys(tree, LEGACY_TREE_ATTRIBUTES) {
                            removed.push(format!("estimators[{}].{}", i, name));
                        }
                    }
                }
            }
        }
        removed
    }
}

fn strip_keys(value: &mut Value, names: &[&str]) -> Vec<String> {
    let mut removed = Vec::new();
    if let Some(obj) = value.as_object_mut() {
        for name in names {
            if obj.remove(*name).is_some() {
                removed.push(name.to_string());
            }
        }
    }
    removed
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope<T> {
    schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fitted_at: Option<DateTime<Utc>>,
    artifact: T,
}

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u32,
}

/// An artifact together with where it came from.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub artifact: T,
    pub path: PathBuf,
    pub fitted_at: Option<DateTime<Utc>>,
    /// Legacy attributes removed by the compatibility shim.
    pub stripped: Vec<String>,
}

enum Contents {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl Deref for Contents {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Contents::Mapped(m) => &m[..],
            Contents::Buffered(b) => &b[..],
        }
    }
}

fn io_error(kind: ArtifactKind, path: &Path, err: io::Error) -> PipelineError {
    if err.kind() == ErrorKind::NotFound {
        PipelineError::ArtifactNotFound {
            artifact: kind,
            path: path.to_path_buf(),
        }
    } else {
        PipelineError::ArtifactUnreadable {
            artifact: kind,
            path: path.to_path_buf(),
            source: err,
        }
    }
}

fn corrupt(kind: ArtifactKind, path: &Path, reason: impl Into<String>) -> PipelineError {
    PipelineError::ArtifactCorrupt {
        artifact: kind,
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_contents(kind: ArtifactKind, path: &Path, use_mmap: bool) -> Result<Contents, PipelineError> {
    let file = File::open(path).map_err(|e| io_error(kind, path, e))?;
    if use_mmap {
        // SAFETY: the mapping is only read while parsing, and everything we
        // keep is copied into owned values before the map is dropped.
        match unsafe { MmapOptions::new().map(&file) } {
            Ok(map) => return Ok(Contents::Mapped(map)),
            Err(e) => log::debug!("mmap of {} failed ({}), reading instead", path.display(), e),
        }
    }
    fs::read(path)
        .map(Contents::Buffered)
        .map_err(|e| io_error(kind, path, e))
}

fn parse<T: Artifact>(bytes: &[u8], path: &Path) -> Result<Loaded<T>, PipelineError> {
    let kind = T::KIND;
    let probe: VersionProbe =
        serde_json::from_slice(bytes).map_err(|e| corrupt(kind, path, format!("malformed data: {}", e)))?;
    if probe.schema_version != SCHEMA_VERSION {
        return Err(corrupt(
            kind,
            path,
            format!(
                "incompatible schema version {} (this build reads version {})",
                probe.schema_version, SCHEMA_VERSION
            ),
        ));
    }

    let (envelope, stripped) = match serde_json::from_slice::<Envelope<T>>(bytes) {
        Ok(envelope) => (envelope, Vec::new()),
        Err(strict) => {
            let mut raw: Value = serde_json::from_slice(bytes)
                .map_err(|e| corrupt(kind, path, format!("malformed data: {}", e)))?;
            let stripped = raw
                .get_mut("artifact")
                .map(T::strip_legacy)
                .unwrap_or_default();
            if stripped.is_empty() {
                return Err(corrupt(kind, path, format!("malformed data: {}", strict)));
            }
            log::warn!(
                "{} artifact {} carries legacy attribute(s) {}; ignoring them",
                kind,
                path.display(),
                stripped.join(", ")
            );
            let envelope = serde_json::from_value::<Envelope<T>>(raw).map_err(|e| {
                corrupt(
                    kind,
                    path,
                    format!("malformed data after removing {}: {}", stripped.join(", "), e),
                )
            })?;
            (envelope, stripped)
        }
    };

    envelope.artifact.check().map_err(|e| corrupt(kind, path, e))?;

    Ok(Loaded {
        artifact: envelope.artifact,
        path: path.to_path_buf(),
        fitted_at: envelope.fitted_at,
        stripped,
    })
}

/// Load and check an artifact.
///
/// A missing file is `ArtifactNotFound`, any other I/O failure is
/// `ArtifactUnreadable`, and anything wrong with the contents is
/// `ArtifactCorrupt`.
pub fn load<T: Artifact>(path: &Path, use_mmap: bool) -> Result<Loaded<T>, PipelineError> {
    let contents = read_contents(T::KIND, path, use_mmap)?;
    let loaded = parse::<T>(&contents, path)?;
    log::info!(
        "loaded {} artifact from {} (schema v{}, fitted {})",
        T::KIND,
        path.display(),
        SCHEMA_VERSION,
        loaded
            .fitted_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "at an unknown time".to_string())
    );
    Ok(loaded)
}

/// Write an artifact envelope to `path`.
pub fn save<T: Artifact>(
    artifact: &T,
    fitted_at: Option<DateTime<Utc>>,
    path: &Path,
) -> io::Result<()> {
    let envelope = Envelope {
        schema_version: SCHEMA_VERSION,
        fitted_at,
        artifact,
    };
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, &envelope)?;
    out.write_all(b"\n")?;
    out.flush()
}
