//! HolographicFileSystem
//!
//! Binary-framed entry files plus an index file; write/search by intent
//! similarity. Write path: `SaveEntryFile` precedes `SaveIndexFile` (§5);
//! the in-memory entry is only added after the index rewrite succeeds, so
//! a write failure never leaves in-memory state ahead of disk.

mod codec;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::fnv::{fnv64_str, hex16};
use crate::hdc::HdcSystem;
use crate::sequence::{SequenceEncoder, TokenizeParams};
use crate::tensor::{Tensor, TensorOps};

use codec::{
    decode_entry_body, encode_entry_body, read_u32, write_u32, ENTRY_MAGIC, FORMAT_VERSION,
    INDEX_MAGIC, MAX_DIM, MAX_INDEX_COUNT,
};

#[derive(Debug, thiserror::Error)]
pub enum HfsError {
    #[error("hfs_not_initialized")]
    NotInitialized,
    #[error("hfs_root_create_failed: {0}")]
    RootCreateFailed(String),
    #[error("hfs_index_magic_invalid")]
    IndexMagicInvalid,
    #[error("hfs_index_version_unsupported: {0}")]
    IndexVersionUnsupported(u32),
    #[error("hfs_index_too_large: {0}")]
    IndexTooLarge(u32),
    #[error("hfs_index_duplicate_id: {0}")]
    IndexDuplicateId(String),
    #[error("hfs_index_entry_missing: {0}")]
    IndexEntryMissing(String),
    #[error("hfs_entry_id_mismatch: expected {expected}, found {found}")]
    EntryIdMismatch { expected: String, found: String },
    #[error("hfs_entry_read_failed: {0}")]
    EntryReadFailed(String),
    #[error("hfs_write_failed: {0}")]
    WriteFailed(String),
    #[error("hdc_dim_limit_exceeded: {0}")]
    DimLimitExceeded(usize),
    #[error("not_found")]
    NotFound,
}

/// An id/intent/content/vector-pair record. Read-only once written.
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: String,
    pub intent: String,
    pub content: String,
    pub file_path: PathBuf,
    pub utc_ticks: i64,
    pub intent_vector: Tensor,
    pub payload_vector: Tensor,
}

struct State {
    entries: Vec<Entry>,
    ids: Vec<String>,
}

/// A content-addressed, intent-similarity-searchable file store.
pub struct HolographicFileSystem {
    root: PathBuf,
    state: Mutex<State>,
}

impl HolographicFileSystem {
    fn entry_path(root: &Path, id: &str) -> PathBuf {
        root.join(format!("{id}.hfs"))
    }

    fn index_path(root: &Path) -> PathBuf {
        root.join("index.axidx")
    }

    /// Create the root directory if missing, then load the index and every
    /// entry it lists. A listed id whose entry file is missing is skipped
    /// with a warning (recoverable only here, per §5); any other
    /// inconsistency is fatal.
    pub fn initialize(root: impl Into<PathBuf>) -> Result<Self, HfsError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| HfsError::RootCreateFailed(e.to_string()))?;

        let index_path = Self::index_path(&root);
        let ids = if index_path.exists() {
            Self::read_index(&index_path)?
        } else {
            Vec::new()
        };

        let mut entries = Vec::with_capacity(ids.len());
        let mut loaded_ids = Vec::with_capacity(ids.len());
        for id in &ids {
            let path = Self::entry_path(&root, id);
            if !path.exists() {
                tracing::warn!(id = %id, "hfs_index_entry_missing at initialize, skipping");
                continue;
            }
            let entry = Self::read_entry(&path, id)?;
            entries.push(entry);
            loaded_ids.push(id.clone());
        }

        Ok(Self {
            root,
            state: Mutex::new(State {
                entries,
                ids: loaded_ids,
            }),
        })
    }

    fn read_index(path: &Path) -> Result<Vec<String>, HfsError> {
        let file = File::open(path).map_err(|e| HfsError::EntryReadFailed(e.to_string()))?;
        let mut reader = BufReader::new(file);
        let mut magic = [0u8; 6];
        std::io::Read::read_exact(&mut reader, &mut magic)
            .map_err(|e| HfsError::EntryReadFailed(e.to_string()))?;
        if &magic != INDEX_MAGIC {
            return Err(HfsError::IndexMagicInvalid);
        }
        let version = read_u32(&mut reader).map_err(|e| HfsError::EntryReadFailed(e.to_string()))?;
        if version != FORMAT_VERSION {
            return Err(HfsError::IndexVersionUnsupported(version));
        }
        let count = read_u32(&mut reader).map_err(|e| HfsError::EntryReadFailed(e.to_string()))?;
        if count > MAX_INDEX_COUNT {
            return Err(HfsError::IndexTooLarge(count));
        }
        let mut ids = Vec::with_capacity(count as usize);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..count {
            let id = codec::read_string(&mut reader)
                .map_err(|e| HfsError::EntryReadFailed(e.to_string()))?;
            if !seen.insert(id.clone()) {
                return Err(HfsError::IndexDuplicateId(id));
            }
            ids.push(id);
        }
        Ok(ids)
    }

    fn read_entry(path: &Path, expected_id: &str) -> Result<Entry, HfsError> {
        let file = File::open(path).map_err(|e| HfsError::EntryReadFailed(e.to_string()))?;
        let mut reader = BufReader::new(file);
        let mut magic = [0u8; 6];
        std::io::Read::read_exact(&mut reader, &mut magic)
            .map_err(|e| HfsError::EntryReadFailed(e.to_string()))?;
        if &magic != ENTRY_MAGIC {
            return Err(HfsError::EntryReadFailed("bad entry magic".to_string()));
        }
        let version = read_u32(&mut reader).map_err(|e| HfsError::EntryReadFailed(e.to_string()))?;
        if version != FORMAT_VERSION {
            return Err(HfsError::EntryReadFailed(format!(
                "unsupported entry version {version}"
            )));
        }
        let body =
            decode_entry_body(&mut reader).map_err(|e| HfsError::EntryReadFailed(e.to_string()))?;
        if body.id != expected_id {
            return Err(HfsError::EntryIdMismatch {
                expected: expected_id.to_string(),
                found: body.id,
            });
        }
        Ok(Entry {
            id: body.id,
            intent: body.intent,
            content: body.content,
            file_path: path.to_path_buf(),
            utc_ticks: body.utc_ticks,
            intent_vector: body.intent_vector,
            payload_vector: body.payload_vector,
        })
    }

    fn write_entry_file(&self, entry: &Entry) -> Result<(), HfsError> {
        let file = File::create(&entry.file_path).map_err(|e| HfsError::WriteFailed(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        std::io::Write::write_all(&mut writer, ENTRY_MAGIC)
            .map_err(|e| HfsError::WriteFailed(e.to_string()))?;
        write_u32(&mut writer, FORMAT_VERSION).map_err(|e| HfsError::WriteFailed(e.to_string()))?;
        encode_entry_body(
            &mut writer,
            entry.utc_ticks,
            &entry.id,
            &entry.intent,
            &entry.content,
            &entry.intent_vector,
            &entry.payload_vector,
        )
        .map_err(|e| HfsError::WriteFailed(e.to_string()))?;
        std::io::Write::flush(&mut writer).map_err(|e| HfsError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn write_index_file(&self, ids: &[String]) -> Result<(), HfsError> {
        let path = Self::index_path(&self.root);
        let file = File::create(&path).map_err(|e| HfsError::WriteFailed(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        std::io::Write::write_all(&mut writer, INDEX_MAGIC)
            .map_err(|e| HfsError::WriteFailed(e.to_string()))?;
        write_u32(&mut writer, FORMAT_VERSION).map_err(|e| HfsError::WriteFailed(e.to_string()))?;
        write_u32(&mut writer, ids.len() as u32).map_err(|e| HfsError::WriteFailed(e.to_string()))?;
        for id in ids {
            codec::write_string(&mut writer, id).map_err(|e| HfsError::WriteFailed(e.to_string()))?;
        }
        std::io::Write::flush(&mut writer).map_err(|e| HfsError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    /// Encode intent + content, bind into the payload vector, mint an id,
    /// write the entry file, append to the index, and rewrite the index
    /// file. The in-memory list only gains the entry once the index
    /// rewrite has succeeded.
    pub fn write(
        &self,
        intent: &str,
        content: &str,
        dim: usize,
        hdc: &mut HdcSystem,
        utc_ticks: i64,
    ) -> Result<Entry, HfsError> {
        if dim == 0 || dim as u32 > MAX_DIM {
            return Err(HfsError::DimLimitExceeded(dim));
        }
        let intent_vector = encode(intent, dim, hdc);
        let content_vector = encode(content, dim, hdc);
        let payload_vector = TensorOps::normalize_l2(
            &TensorOps::bind(&intent_vector, &content_vector).unwrap_or_else(|_| intent_vector.clone()),
        );

        let id = format!("{}_{}", hex16(utc_ticks as u64), hex16(fnv64_str(content)));
        let file_path = Self::entry_path(&self.root, &id);
        let entry = Entry {
            id: id.clone(),
            intent: intent.to_string(),
            content: content.to_string(),
            file_path,
            utc_ticks,
            intent_vector,
            payload_vector,
        };

        self.write_entry_file(&entry)?;

        let mut state = self.state.lock().unwrap();
        if state.ids.contains(&id) {
            return Err(HfsError::IndexDuplicateId(id));
        }
        let mut new_ids = state.ids.clone();
        new_ids.push(id.clone());
        self.write_index_file(&new_ids)?;
        state.ids = new_ids;
        state.entries.push(entry.clone());
        Ok(entry)
    }

    /// `blended = 0.75·cos(q,intent) + 0.25·cos(q,payload)` over all
    /// entries, sorted desc by `(similarity, utc_ticks desc, id lex)`,
    /// truncated to `top_k`.
    pub fn search(&self, query: &str, dim: usize, hdc: &mut HdcSystem, top_k: usize) -> Vec<(Entry, f32)> {
        let q = encode(query, dim, hdc);
        let state = self.state.lock().unwrap();
        let mut scored: Vec<(Entry, f32)> = state
            .entries
            .iter()
            .map(|e| {
                let blended = 0.75 * TensorOps::cosine_similarity(&q, &e.intent_vector)
                    + 0.25 * TensorOps::cosine_similarity(&q, &e.payload_vector);
                (e.clone(), blended)
            })
            .collect();
        scored.sort_by(|(ea, sa), (eb, sb)| {
            sb.partial_cmp(sa)
                .unwrap()
                .then_with(|| eb.utc_ticks.cmp(&ea.utc_ticks))
                .then_with(|| ea.id.cmp(&eb.id))
        });
        scored.truncate(top_k);
        scored
    }

    /// The single best search result, if any.
    pub fn read_best(
        &self,
        query: &str,
        dim: usize,
        hdc: &mut HdcSystem,
    ) -> Result<(Entry, f32), HfsError> {
        self.search(query, dim, hdc, 1)
            .into_iter()
            .next()
            .ok_or(HfsError::NotFound)
    }

    pub fn get(&self, id: &str) -> Result<Entry, HfsError> {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(HfsError::NotFound)
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn encode(text: &str, dim: usize, hdc: &mut HdcSystem) -> Tensor {
    let params = TokenizeParams::clamped(3, 1, 256, dim);
    let positioned = SequenceEncoder::tokenize(text, params);
    let tokens: Vec<String> = positioned.iter().map(|p| p.token.clone()).collect();
    let positions: Vec<usize> = positioned.iter().map(|p| p.position).collect();
    SequenceEncoder::encode_tokens(&mut hdc.symbols, &tokens, &positions, dim)
        .unwrap_or_else(|_| Tensor::from_vec(vec![0.0; dim]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_write_then_reinitialize_and_search() {
        let dir = tempdir().unwrap();
        let mut hdc = HdcSystem::new();
        let id = {
            let hfs = HolographicFileSystem::initialize(dir.path()).unwrap();
            let entry = hfs.write("hello", "world", 64, &mut hdc, 1000).unwrap();
            entry.id
        };

        let hfs2 = HolographicFileSystem::initialize(dir.path()).unwrap();
        assert_eq!(hfs2.len(), 1);
        let (best, sim) = hfs2.read_best("hello", 64, &mut hdc).unwrap();
        assert_eq!(best.id, id);
        assert!(sim >= 0.9);
    }

    #[test]
    fn search_results_sorted_non_increasing() {
        let dir = tempdir().unwrap();
        let mut hdc = HdcSystem::new();
        let hfs = HolographicFileSystem::initialize(dir.path()).unwrap();
        hfs.write("apple", "fruit", 32, &mut hdc, 1).unwrap();
        hfs.write("banana", "fruit", 32, &mut hdc, 2).unwrap();
        hfs.write("car", "vehicle", 32, &mut hdc, 3).unwrap();
        let results = hfs.search("apple", 32, &mut hdc, 10);
        for pair in results.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn missing_index_entry_is_skipped_at_initialize() {
        let dir = tempdir().unwrap();
        let mut hdc = HdcSystem::new();
        {
            let hfs = HolographicFileSystem::initialize(dir.path()).unwrap();
            hfs.write("a", "b", 32, &mut hdc, 1).unwrap();
        }
        // Corrupt by deleting the single entry file but leaving the index.
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "hfs").unwrap_or(false))
            .collect();
        for e in entries {
            fs::remove_file(e.path()).unwrap();
        }
        let hfs2 = HolographicFileSystem::initialize(dir.path()).unwrap();
        assert_eq!(hfs2.len(), 0);
    }

    #[test]
    fn dim_limit_exceeded_rejected() {
        let dir = tempdir().unwrap();
        let mut hdc = HdcSystem::new();
        let hfs = HolographicFileSystem::initialize(dir.path()).unwrap();
        let err = hfs.write("a", "b", 300_000, &mut hdc, 1).unwrap_err();
        assert!(matches!(err, HfsError::DimLimitExceeded(_)));
    }
}
