//! The Index Store: vector nodes plus the document registry.
//!
//! Holds no locks of its own. The owner (the index service) serializes every
//! call, which is what keeps the registry and the node set in lockstep.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use mediadex_core::IndexedDocument;

use crate::error::IndexError;

const SNAPSHOT_FILE: &str = "index.json";
const SNAPSHOT_VERSION: u32 = 2;

/// One embedded chunk of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub doc_id: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub embedding: Vec<f32>,
}

/// A node returned from a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub node: Node,
    /// Cosine similarity score.
    pub score: f64,
}

/// Registry entry kept next to the vector nodes for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub text_preview: String,
    pub source_path: String,
}

/// Which embedder produced the stored vectors.
///
/// Vectors from different embedders (or dimensions) are not comparable, so a
/// snapshot is only usable with the embedder recorded in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedderInfo {
    pub id: String,
    pub dimensions: usize,
}

impl EmbedderInfo {
    pub fn new(id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            id: id.into(),
            dimensions,
        }
    }
}

impl std::fmt::Display for EmbedderInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.id, self.dimensions)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    embedder: EmbedderInfo,
    nodes: Vec<Node>,
}

/// Serialized index files, ready to be written off the async runtime.
#[derive(Debug)]
pub struct PersistBatch {
    persist_dir: PathBuf,
    registry_path: PathBuf,
    snapshot: Vec<u8>,
    registry: Vec<u8>,
}

impl PersistBatch {
    /// Write the snapshot and the registry, each via a temp file and rename.
    pub fn write(self) -> Result<(), IndexError> {
        std::fs::create_dir_all(&self.persist_dir)
            .map_err(|e| IndexError::Persist(e.to_string()))?;
        write_atomic(&self.persist_dir.join(SNAPSHOT_FILE), &self.snapshot)?;

        if let Some(parent) = self.registry_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| IndexError::Persist(e.to_string()))?;
            }
        }
        write_atomic(&self.registry_path, &self.registry)
    }
}

/// State removed by an upsert, used to roll it back.
#[derive(Debug)]
pub struct Undo {
    doc_id: String,
    nodes: Vec<Node>,
    entry: Option<RegistryEntry>,
}

/// Vector index and registry with load/persist to a local directory.
#[derive(Debug)]
pub struct IndexStore {
    persist_dir: PathBuf,
    registry_path: PathBuf,
    embedder: EmbedderInfo,
    nodes: Vec<Node>,
    registry: BTreeMap<String, RegistryEntry>,
}

impl IndexStore {
    /// An empty store that persists under `persist_dir` and `registry_path`.
    pub fn empty(
        persist_dir: impl Into<PathBuf>,
        registry_path: impl Into<PathBuf>,
        embedder: EmbedderInfo,
    ) -> Self {
        Self {
            persist_dir: persist_dir.into(),
            registry_path: registry_path.into(),
            embedder,
            nodes: Vec::new(),
            registry: BTreeMap::new(),
        }
    }

    /// Load the vector snapshot and registry.
    ///
    /// Fails with [`IndexError::Load`] if the snapshot is missing or corrupt.
    /// A missing or unreadable registry is not fatal; it is rebuilt from the
    /// nodes during reconciliation. The embedder recorded in the snapshot is
    /// kept; see [`embedder`](Self::embedder).
    pub fn load(
        persist_dir: impl Into<PathBuf>,
        registry_path: impl Into<PathBuf>,
    ) -> Result<Self, IndexError> {
        let mut store = Self::empty(persist_dir, registry_path, EmbedderInfo::new("", 0));

        let snapshot_path = store.persist_dir.join(SNAPSHOT_FILE);
        let raw = std::fs::read_to_string(&snapshot_path).map_err(|e| {
            IndexError::Load(format!("{}: {}", snapshot_path.display(), e))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|e| IndexError::Load(format!("{}: {}", snapshot_path.display(), e)))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(IndexError::Load(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        store.embedder = snapshot.embedder;
        store.nodes = snapshot.nodes;

        if store.registry_path.exists() {
            match std::fs::read_to_string(&store.registry_path)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
            {
                Ok(registry) => store.registry = registry,
                Err(e) => warn!(
                    path = %store.registry_path.display(),
                    error = %e,
                    "Registry unreadable, rebuilding from index"
                ),
            }
        }

        store.reconcile();
        info!(
            nodes = store.nodes.len(),
            documents = store.registry.len(),
            "Index loaded from {}",
            store.persist_dir.display()
        );
        Ok(store)
    }

    /// Make registry and nodes agree: drop entries without nodes and add
    /// entries for orphaned nodes.
    fn reconcile(&mut self) {
        let before = self.registry.len();
        let nodes = &self.nodes;
        self.registry
            .retain(|id, _| nodes.iter().any(|n| &n.doc_id == id));
        let dropped = before - self.registry.len();

        let mut added = 0;
        for node in &self.nodes {
            if !self.registry.contains_key(&node.doc_id) {
                self.registry.insert(
                    node.doc_id.clone(),
                    RegistryEntry {
                        text_preview: crate::chunk::preview(&node.text, 200),
                        source_path: String::new(),
                    },
                );
                added += 1;
            }
        }

        if dropped > 0 || added > 0 {
            warn!(dropped, added, "Registry reconciled against index");
        }
    }

    /// Serialize the current state without touching the filesystem.
    pub fn snapshot(&self) -> Result<PersistBatch, IndexError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            embedder: self.embedder.clone(),
            nodes: self.nodes.clone(),
        };
        Ok(PersistBatch {
            persist_dir: self.persist_dir.clone(),
            registry_path: self.registry_path.clone(),
            snapshot: serde_json::to_vec(&snapshot)
                .map_err(|e| IndexError::Persist(e.to_string()))?,
            registry: serde_json::to_vec_pretty(&self.registry)
                .map_err(|e| IndexError::Persist(e.to_string()))?,
        })
    }

    /// Serialize and write in the calling thread.
    pub fn persist(&self) -> Result<(), IndexError> {
        self.snapshot()?.write()
    }

    /// Replace every node and the registry entry for `doc_id`.
    ///
    /// Returns what was removed so the caller can [`restore`](Self::restore)
    /// it if persisting fails.
    pub fn upsert_document(
        &mut self,
        doc_id: &str,
        nodes: Vec<Node>,
        entry: RegistryEntry,
    ) -> Undo {
        let (removed, kept): (Vec<Node>, Vec<Node>) = std::mem::take(&mut self.nodes)
            .into_iter()
            .partition(|n| n.doc_id == doc_id);
        self.nodes = kept;
        self.nodes.extend(nodes);
        let previous = self.registry.insert(doc_id.to_string(), entry);

        Undo {
            doc_id: doc_id.to_string(),
            nodes: removed,
            entry: previous,
        }
    }

    /// Roll back an [`upsert_document`](Self::upsert_document).
    pub fn restore(&mut self, undo: Undo) {
        self.nodes.retain(|n| n.doc_id != undo.doc_id);
        self.nodes.extend(undo.nodes);
        match undo.entry {
            Some(entry) => {
                self.registry.insert(undo.doc_id, entry);
            }
            None => {
                self.registry.remove(&undo.doc_id);
            }
        }
    }

    /// The `k` nodes most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<SearchHit> = self
            .nodes
            .iter()
            .map(|node| SearchHit {
                score: cosine_similarity(query, &node.embedding),
                node: node.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Registry snapshot.
    pub fn documents(&self) -> Vec<IndexedDocument> {
        self.registry
            .iter()
            .map(|(id, entry)| IndexedDocument {
                id: id.clone(),
                text_preview: entry.text_preview.clone(),
                source_path: entry.source_path.clone(),
            })
            .collect()
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.registry.contains_key(doc_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn document_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    /// The embedder the stored vectors were produced with.
    pub fn embedder(&self) -> &EmbedderInfo {
        &self.embedder
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), IndexError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data).map_err(|e| IndexError::Persist(format!("{}: {}", tmp.display(), e)))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| IndexError::Persist(format!("{}: {}", path.display(), e)))
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
