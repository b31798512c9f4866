//! Checkpoint snapshot codec and selection.
//!
//! # Responsibility
//! - Serialize replay snapshots into compact text blobs and back.
//! - Pick the checkpoint that lets replay skip the most events.
//!
//! # Invariants
//! - `decompress(compress(s)) == s` for every JSON value `s`.
//! - Encoding is deterministic: object keys are emitted in sorted order.
//! - Checkpoints are an optimization only; callers fall back to full replay
//!   on any decode error or lineage mismatch.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{Read, Write};

use crate::digest::sha256_hex;
use crate::model::branch::{Branch, BranchCheckpoint, BranchId};

/// Shape version embedded in engine-written snapshots.
pub const SNAPSHOT_SCHEMA_VERSION: u64 = 1;

#[derive(Debug)]
pub enum CheckpointError {
    Base64(base64::DecodeError),
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Decoded payload lacks a field replay needs.
    MissingField(&'static str),
    /// Stored `text_hash` disagrees with the stored text.
    HashMismatch,
}

impl Display for CheckpointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base64(err) => write!(f, "checkpoint blob is not base64: {err}"),
            Self::Io(err) => write!(f, "checkpoint blob failed to inflate: {err}"),
            Self::Json(err) => write!(f, "checkpoint blob is not JSON: {err}"),
            Self::MissingField(field) => write!(f, "checkpoint snapshot lacks `{field}`"),
            Self::HashMismatch => write!(f, "checkpoint text does not match its text_hash"),
        }
    }
}

impl Error for CheckpointError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Base64(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::MissingField(_) | Self::HashMismatch => None,
        }
    }
}

impl From<base64::DecodeError> for CheckpointError {
    fn from(value: base64::DecodeError) -> Self {
        Self::Base64(value)
    }
}

impl From<std::io::Error> for CheckpointError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CheckpointError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Encodes a snapshot as base64(zlib(canonical JSON)).
pub fn compress(snapshot: &Value) -> Result<String, CheckpointError> {
    let encoded = serde_json::to_vec(snapshot)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&encoded)?;
    Ok(STANDARD.encode(encoder.finish()?))
}

/// Inverse of [`compress`].
pub fn decompress(blob: &str) -> Result<Value, CheckpointError> {
    let compressed = STANDARD.decode(blob.trim())?;
    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut encoded = Vec::new();
    decoder.read_to_end(&mut encoded)?;
    Ok(serde_json::from_slice(&encoded)?)
}

/// Hash of the root-to-tip branch ids a checkpoint was taken over.
pub fn lineage_fingerprint(lineage: &[BranchId]) -> String {
    let joined = lineage
        .iter()
        .map(BranchId::to_string)
        .collect::<Vec<_>>()
        .join(">");
    sha256_hex(&joined)
}

/// Snapshot payload written by the replay engine.
pub fn text_snapshot(current_text: &str, phase: Option<&str>, lineage: &str) -> Value {
    json!({
        "schema_version": SNAPSHOT_SCHEMA_VERSION,
        "current_text": current_text,
        "phase": phase,
        "text_hash": sha256_hex(current_text),
        "lineage": lineage,
    })
}

/// Decoded replay state from a checkpoint blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredText {
    pub current_text: String,
    pub phase: Option<String>,
    /// [`lineage_fingerprint`] at write time; absent in foreign snapshots.
    pub lineage: Option<String>,
}

/// Decodes a blob and extracts the text replay resumes from.
///
/// A stored `text_hash` that disagrees with the text is treated as
/// corruption.
pub fn restore_text(blob: &str) -> Result<RestoredText, CheckpointError> {
    let snapshot = decompress(blob)?;
    let current_text = snapshot
        .get("current_text")
        .and_then(Value::as_str)
        .ok_or(CheckpointError::MissingField("current_text"))?;
    if let Some(stored_hash) = snapshot.get("text_hash").and_then(Value::as_str) {
        if stored_hash != sha256_hex(current_text) {
            return Err(CheckpointError::HashMismatch);
        }
    }
    Ok(RestoredText {
        current_text: current_text.to_string(),
        phase: snapshot
            .get("phase")
            .and_then(Value::as_str)
            .map(str::to_string),
        lineage: snapshot
            .get("lineage")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Checkpoint with the highest `event_index` among branches of `lineage`,
/// newest `created_at` breaking ties.
pub fn latest_checkpoint<'a>(
    checkpoints: &'a [BranchCheckpoint],
    lineage: &[Branch],
) -> Option<&'a BranchCheckpoint> {
    let members: HashSet<_> = lineage.iter().map(|branch| branch.id).collect();
    checkpoints
        .iter()
        .filter(|checkpoint| members.contains(&checkpoint.branch_id))
        .max_by_key(|checkpoint| (checkpoint.event_index, checkpoint.created_at))
}

#[cfg(test)]
mod tests {
    use super::{
        compress, decompress, latest_checkpoint, lineage_fingerprint, restore_text, text_snapshot,
    };
    use crate::model::branch::{Branch, BranchCheckpoint, BranchMode, StateSnapshot};
    use serde_json::json;
    use uuid::Uuid;

    fn branch() -> Branch {
        Branch {
            id: Uuid::new_v4(),
            name: "b".to_string(),
            parent_branch_id: None,
            root_document_id: Some(Uuid::nil()),
            mode: BranchMode::Public,
            state_snapshot: StateSnapshot::new("", None),
            created_at: 0,
        }
    }

    fn checkpoint(branch: &Branch, event_index: u32, created_at: i64) -> BranchCheckpoint {
        BranchCheckpoint {
            id: Uuid::new_v4(),
            branch_id: branch.id,
            event_index,
            snapshot_blob: String::new(),
            created_at,
        }
    }

    #[test]
    fn nested_values_round_trip() {
        let snapshot = json!({
            "current_text": "þe niȝt rote",
            "nested": { "list": [1, 2.5, null, true], "empty": {} },
            "phase": null,
        });
        assert_eq!(decompress(&compress(&snapshot).unwrap()).unwrap(), snapshot);
    }

    #[test]
    fn floats_round_trip_bit_exact() {
        let mut ratios = vec![632.0 / 7.0, 0.1, 1.0715660391465826e-75, f64::MAX, f64::MIN_POSITIVE];
        ratios.extend((1..5000).map(|i| f64::from(i) / 7.0));
        for ratio in ratios {
            let snapshot = json!({ "current_text": "ratio", "ratio": ratio });
            let restored = decompress(&compress(&snapshot).unwrap()).unwrap();
            let back = restored["ratio"].as_f64().unwrap();
            assert_eq!(back.to_bits(), ratio.to_bits(), "ratio {ratio} came back as {back}");
        }
    }

    #[test]
    fn encoding_is_deterministic_across_key_order() {
        let a = json!({ "b": 1, "a": 2 });
        let b = json!({ "a": 2, "b": 1 });
        assert_eq!(compress(&a).unwrap(), compress(&b).unwrap());
    }

    #[test]
    fn garbage_blob_is_an_error() {
        assert!(decompress("not base64 at all!").is_err());
        assert!(decompress("aGVsbG8=").is_err());
    }

    #[test]
    fn restore_rejects_hash_mismatch() {
        let mut snapshot = text_snapshot("alpha", None, "fp");
        snapshot["current_text"] = json!("beta");
        assert!(restore_text(&compress(&snapshot).unwrap()).is_err());
    }

    #[test]
    fn restore_reads_text_and_phase() {
        let blob = compress(&text_snapshot("alpha", Some("peak"), "fp")).unwrap();
        let restored = restore_text(&blob).unwrap();
        assert_eq!(restored.current_text, "alpha");
        assert_eq!(restored.phase.as_deref(), Some("peak"));
        assert_eq!(restored.lineage.as_deref(), Some("fp"));
    }

    #[test]
    fn fingerprint_depends_on_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(lineage_fingerprint(&[a, b]), lineage_fingerprint(&[a, b]));
        assert_ne!(lineage_fingerprint(&[a, b]), lineage_fingerprint(&[b, a]));
    }

    #[test]
    fn latest_prefers_index_then_newest() {
        let a = branch();
        let b = branch();
        let outsider = branch();
        let checkpoints = vec![
            checkpoint(&a, 2, 10),
            checkpoint(&b, 3, 5),
            checkpoint(&b, 3, 7),
            checkpoint(&outsider, 9, 99),
        ];
        let picked = latest_checkpoint(&checkpoints, &[a, b]).unwrap();
        assert_eq!((picked.event_index, picked.created_at), (3, 7));
    }
}
