#![allow(dead_code)]

pub mod mocks;

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tutor::rag::{Embedder, RetrievalService};
use tutor::utils::toml_config::RagConfig;
use tutor_vector::{Config as VectorConfig, VectorDb};

/// `count` distinct space-separated words with the given prefix, e.g. `w0000 w0001`.
pub fn distinct_words(prefix: &str, count: usize) -> String {
    (0..count)
        .map(|i| format!("{}{:04}", prefix, i))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A corpus and index directory inside a temporary root.
pub struct Fixture {
    pub root: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let root = TempDir::new().expect("temp dir");
        std::fs::create_dir_all(root.path().join("docs")).expect("corpus dir");
        Self { root }
    }

    pub fn corpus(&self) -> PathBuf {
        self.root.path().join("docs")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.path().join("index")
    }

    pub fn write_doc(&self, name: &str, content: &str) {
        std::fs::write(self.corpus().join(name), content).expect("write document");
    }

    /// `a.txt` of 2500 characters and `b.txt` of 300, both without repeated words.
    pub fn write_two_document_corpus(&self) -> String {
        // 416 words of 5 chars plus separators: 2495 characters, then " done"
        let a = format!("{} done", distinct_words("w", 416));
        // 50 words of 5 chars plus separators: 299 characters, padded to 300
        let b = format!("{}.", distinct_words("b", 50));
        self.write_doc("a.txt", &a);
        self.write_doc("b.txt", &b);
        a
    }

    pub fn rag_config(&self) -> RagConfig {
        RagConfig {
            index_dir: self.index_dir(),
            corpus_dir: self.corpus(),
            collection: "biology".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            ..RagConfig::default()
        }
    }

    pub async fn service(&self, embedder: Arc<dyn Embedder>) -> RetrievalService {
        let config = self.rag_config();
        let db = VectorDb::open(VectorConfig::persistent(config.index_dir.clone()))
            .await
            .expect("open index dir");
        RetrievalService::new(config, embedder, db).expect("valid service")
    }

    pub fn collection_dir(&self, name: &str) -> PathBuf {
        self.index_dir().join(name)
    }
}
