//! The Index Service: one [`IndexStore`] behind one exclusive gate.
//!
//! Every operation that touches the store, reads included, goes through
//! [`IndexService::acquire`]. An insert holds the gate from reading the
//! source file until the snapshot is on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use mediadex_core::{IndexedDocument, MediadexConfig};

use crate::api::{Answer, IndexApi, SourceFragment};
use crate::chunk::{preview, split_text};
use crate::embedding::{EmbeddingService, HashingEmbedding};
use crate::error::IndexError;
use crate::store::{IndexStore, Node, RegistryEntry};

/// Runtime settings for the index service.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub persist_dir: PathBuf,
    pub registry_path: PathBuf,
    pub top_k: usize,
    pub preview_chars: usize,
    pub chunk_size: usize,
    pub gate_timeout: Option<Duration>,
}

impl IndexSettings {
    pub fn from_config(config: &MediadexConfig) -> Self {
        Self {
            persist_dir: config.resolve(&config.index.persist_dir),
            registry_path: config.resolve(&config.index.registry_file),
            top_k: config.index.top_k,
            preview_chars: config.index.preview_chars,
            chunk_size: config.index.chunk_size,
            gate_timeout: config.index.gate_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Defaults rooted at `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            persist_dir: dir.join("saved_index"),
            registry_path: dir.join("stored_documents.json"),
            top_k: 2,
            preview_chars: 200,
            chunk_size: 1024,
            gate_timeout: None,
        }
    }
}

pub struct IndexService<E: EmbeddingService = HashingEmbedding> {
    gate: Mutex<IndexStore>,
    embedder: E,
    settings: IndexSettings,
}

impl<E: EmbeddingService> IndexService<E> {
    /// Load the persisted index, or start from an empty one.
    ///
    /// A missing or corrupt index is logged and replaced by an empty one,
    /// which is persisted immediately. An index built by a different
    /// embedder is refused with [`IndexError::Load`] and left on disk.
    pub fn open(settings: IndexSettings, embedder: E) -> Result<Self, IndexError> {
        let expected = embedder.info();
        let store = match IndexStore::load(&settings.persist_dir, &settings.registry_path) {
            Ok(store) if store.embedder() != &expected => {
                return Err(IndexError::Load(format!(
                    "index at {} was built with embedder {}, configured embedder is {}",
                    settings.persist_dir.display(),
                    store.embedder(),
                    expected
                )));
            }
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "Index load failed, starting with an empty index");
                let store =
                    IndexStore::empty(&settings.persist_dir, &settings.registry_path, expected);
                store.persist()?;
                info!("Empty index created at {}", settings.persist_dir.display());
                store
            }
        };

        Ok(Self {
            gate: Mutex::new(store),
            embedder,
            settings,
        })
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Take the exclusive gate, bounded by the configured timeout.
    async fn acquire(&self) -> Result<MutexGuard<'_, IndexStore>, IndexError> {
        match self.settings.gate_timeout {
            Some(limit) => tokio::time::timeout(limit, self.gate.lock())
                .await
                .map_err(|_| {
                    IndexError::Unavailable(format!(
                        "index busy for more than {}s",
                        limit.as_secs_f64()
                    ))
                }),
            None => Ok(self.gate.lock().await),
        }
    }

    /// Embed every chunk that has tokens; separator-only chunks are skipped.
    async fn build_nodes(&self, doc_id: &str, text: &str) -> Result<Vec<Node>, IndexError> {
        let chunks = split_text(text, self.settings.chunk_size);
        let mut nodes = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if !self.embedder.has_tokens(&chunk.text) {
                debug!(doc_id = %doc_id, start = chunk.start, end = chunk.end, "Skipping chunk without tokens");
                continue;
            }
            let embedding = self
                .embedder
                .embed(&chunk.text)
                .await
                .map_err(|e| IndexError::Document(format!("{}: {}", doc_id, e)))?;
            nodes.push(Node {
                doc_id: doc_id.to_string(),
                text: chunk.text,
                start: chunk.start,
                end: chunk.end,
                embedding,
            });
        }
        Ok(nodes)
    }
}

#[async_trait]
impl<E: EmbeddingService + 'static> IndexApi for IndexService<E> {
    async fn query(&self, text: &str) -> Result<Answer, IndexError> {
        let store = self.acquire().await?;
        if store.is_empty() {
            return Err(IndexError::Query("index is empty".to_string()));
        }

        let embedding = self.embedder.embed(text).await?;
        let hits = store.search(&embedding, self.settings.top_k);
        drop(store);

        let sources: Vec<SourceFragment> = hits
            .into_iter()
            .map(|hit| SourceFragment {
                doc_id: hit.node.doc_id,
                text: hit.node.text,
                similarity: (hit.score * 100.0).round() / 100.0,
                start: hit.node.start,
                end: hit.node.end,
            })
            .collect();
        let text = sources
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!(sources = sources.len(), "Query answered");
        Ok(Answer { text, sources })
    }

    async fn insert(&self, path: &Path, doc_id: Option<String>) -> Result<String, IndexError> {
        let mut store = self.acquire().await?;

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| IndexError::Document(format!("{}: {}", path.display(), e)))?;
        let id = doc_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let nodes = self.build_nodes(&id, &text).await?;
        if nodes.is_empty() {
            return Err(IndexError::Document(format!(
                "{}: document has no indexable text",
                path.display()
            )));
        }
        let node_count = nodes.len();

        let entry = RegistryEntry {
            text_preview: preview(&text, self.settings.preview_chars),
            source_path: path.display().to_string(),
        };
        let undo = store.upsert_document(&id, nodes, entry);

        if let Err(e) = persist_off_runtime(&store).await {
            store.restore(undo);
            warn!(doc_id = %id, error = %e, "Persist failed, insert rolled back");
            return Err(e);
        }

        info!(doc_id = %id, nodes = node_count, "Document indexed");
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<IndexedDocument>, IndexError> {
        let store = self.acquire().await?;
        Ok(store.documents())
    }
}

/// Serialize under the gate, then write on the blocking pool.
async fn persist_off_runtime(store: &IndexStore) -> Result<(), IndexError> {
    let batch = store.snapshot()?;
    tokio::task::spawn_blocking(move || batch.write())
        .await
        .map_err(|e| IndexError::Persist(format!("persist task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(dir: &Path) -> IndexService {
        IndexService::open(IndexSettings::in_dir(dir), HashingEmbedding::default()).unwrap()
    }

    fn write_doc(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[tokio::test]
    async fn test_open_creates_empty_index_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        assert!(svc.list().await.unwrap().is_empty());
        assert!(dir.path().join("saved_index").join("index.json").exists());
        assert!(dir.path().join("stored_documents.json").exists());
    }

    #[tokio::test]
    async fn test_query_empty_index_fails() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let err = svc.query("anything").await.unwrap_err();
        assert!(matches!(err, IndexError::Query(_)));
    }

    #[tokio::test]
    async fn test_insert_with_id_and_preview() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let long = "word ".repeat(100);
        let path = write_doc(dir.path(), "doc.txt", &long);

        let id = svc.insert(&path, Some("doc-1".to_string())).await.unwrap();
        assert_eq!(id, "doc-1");

        let docs = svc.list().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text_preview.chars().count(), 200);
        assert_eq!(docs[0].source_path, path.display().to_string());
    }

    #[tokio::test]
    async fn test_insert_without_id_generates_one() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let path = write_doc(dir.path(), "doc.txt", "generated identifiers");

        let id = svc.insert(&path, None).await.unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_insert_missing_file_is_document_error() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let err = svc
            .insert(&dir.path().join("missing.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Document(_)));
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_blank_file_is_document_error() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let path = write_doc(dir.path(), "blank.txt", "   \n  ");
        assert!(matches!(
            svc.insert(&path, None).await,
            Err(IndexError::Document(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_skips_separator_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let text = format!("intro paragraph {}\nclosing words", "-".repeat(1500));
        let path = write_doc(dir.path(), "table.md", &text);

        let id = svc.insert(&path, Some("table".to_string())).await.unwrap();
        assert_eq!(id, "table");

        let store = svc.gate.lock().await;
        assert!(store.node_count() >= 1);
        drop(store);
        let answer = svc.query("closing words").await.unwrap();
        assert!(answer.sources.iter().all(|s| s.text.chars().any(char::is_alphanumeric)));
    }

    #[tokio::test]
    async fn test_insert_symbols_only_is_document_error() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let path = write_doc(dir.path(), "rule.md", &"|---|".repeat(400));
        assert!(matches!(
            svc.insert(&path, None).await,
            Err(IndexError::Document(_))
        ));
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_refuses_index_from_other_embedder() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let path = write_doc(dir.path(), "doc.txt", "kept across restarts");
        svc.insert(&path, Some("kept".to_string())).await.unwrap();
        drop(svc);

        let result = IndexService::open(IndexSettings::in_dir(dir.path()), HashingEmbedding::new(64));
        assert!(matches!(result, Err(IndexError::Load(_))));

        // The refused index is still intact for the matching embedder.
        let svc = service(dir.path());
        assert_eq!(svc.list().await.unwrap()[0].id, "kept");
    }

    #[tokio::test]
    async fn test_query_returns_top_k_sources() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        for (i, text) in ["rust ownership borrowing", "tokio async runtime", "sqlite wal journal"]
            .iter()
            .enumerate()
        {
            let path = write_doc(dir.path(), &format!("{}.txt", i), text);
            svc.insert(&path, Some(format!("doc-{}", i))).await.unwrap();
        }

        let answer = svc.query("async runtime").await.unwrap();
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].doc_id, "doc-1");
        assert!(answer.text.starts_with("tokio async runtime"));
        let sim = answer.sources[0].similarity;
        assert_eq!((sim * 100.0).round() / 100.0, sim);
    }

    #[tokio::test]
    async fn test_persist_failure_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let path = write_doc(dir.path(), "doc.txt", "first version");
        svc.insert(&path, Some("a".to_string())).await.unwrap();

        // Replace the persist directory with a file so the next write fails.
        let persist_dir = dir.path().join("saved_index");
        std::fs::remove_dir_all(&persist_dir).unwrap();
        std::fs::write(&persist_dir, "blocked").unwrap();

        let other = write_doc(dir.path(), "other.txt", "second document");
        let err = svc.insert(&other, Some("b".to_string())).await.unwrap_err();
        assert!(matches!(err, IndexError::Persist(_)));

        let ids: Vec<String> = svc.list().await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_gate_timeout_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = IndexSettings::in_dir(dir.path());
        settings.gate_timeout = Some(Duration::from_millis(20));
        let svc = IndexService::open(settings, HashingEmbedding::default()).unwrap();

        let _held = svc.gate.lock().await;
        let err = svc.list().await.unwrap_err();
        assert!(matches!(err, IndexError::Unavailable(_)));
    }
}
