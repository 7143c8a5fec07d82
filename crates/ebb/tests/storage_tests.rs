//! Integration tests for file-backed session persistence

use std::sync::Arc;

use ebb::ContextEngine;
use ebb::memory::{Category, MemoryPolicy};
use ebb::session::SessionId;
use ebb::storage::{DocumentStore, FileKvStore, KvStore};
use tempfile::tempdir;

fn sid(s: &str) -> SessionId {
    SessionId::try_from(s).unwrap()
}

/// Test fixture: engine and raw store over a temporary directory
async fn create_test_engine() -> (ContextEngine, Arc<FileKvStore>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let store = Arc::new(FileKvStore::open(dir.path()).await.unwrap());
    (ContextEngine::new(store.clone()), store, dir)
}

mod file_store_tests {
    use super::*;

    #[tokio::test]
    async fn test_documents_land_as_json_files() {
        let (engine, _store, dir) = create_test_engine().await;
        let session = sid("on-disk");
        engine.record_fact(&session, Category::Task, "write docs", "manual").await;
        engine.sample_pressure(&session, 0.3).await;

        assert!(dir.path().join("on-disk.memory.json").exists());
        assert!(dir.path().join("on-disk.pressure.json").exists());

        let raw = std::fs::read_to_string(dir.path().join("on-disk.memory.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["session_id"], "on-disk");
        assert_eq!(value["slots"]["task"][0]["content"], "write docs");
        assert_eq!(value["event_counter"], 0);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let session = sid("reopen");
        {
            let store = Arc::new(FileKvStore::open(dir.path()).await.unwrap());
            let engine = ContextEngine::new(store);
            engine.record_fact(&session, Category::Discovery, "cache is cold", "read").await;
            engine.sample_pressure(&session, 0.95).await;
        }

        let store = Arc::new(FileKvStore::open(dir.path()).await.unwrap());
        let engine = ContextEngine::new(store);
        let state = engine.snapshot(&session).await;
        assert_eq!(state.pool.len(), 1);
        assert_eq!(state.event_counter, 1);

        // Still high after reopening, so no second intervention
        let report = engine.sample_pressure(&session, 0.96).await;
        assert!(report.intervention.is_none());
    }

    #[tokio::test]
    async fn test_load_then_save_is_byte_identical() {
        let (engine, store, _dir) = create_test_engine().await;
        let session = sid("fixed-point");
        for i in 0..12 {
            engine
                .record_fact(&session, Category::Discovery, &format!("finding {}", i % 5), "read")
                .await;
        }
        engine.record_fact(&session, Category::Error, "boom", "bash").await;

        let first = store.get("fixed-point.memory").await.unwrap().unwrap();

        let documents = DocumentStore::new(store.clone());
        let policy = MemoryPolicy::default();
        let loaded = documents.load_memory(&session, &policy).await;
        documents.save_memory(&loaded).await.unwrap();

        let second = store.get("fixed-point.memory").await.unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_truncated_file_recovers() {
        let (engine, _store, dir) = create_test_engine().await;
        let session = sid("truncated");
        engine.record_fact(&session, Category::Decision, "keep it", "manual").await;

        let path = dir.path().join("truncated.memory.json");
        let raw = std::fs::read(&path).unwrap();
        std::fs::write(&path, &raw[..raw.len() / 2]).unwrap();

        assert!(engine.snapshot(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_session_deleted_removes_files() {
        let (engine, _store, dir) = create_test_engine().await;
        let session = sid("delete-me");
        engine.record_fact(&session, Category::Task, "x", "manual").await;
        engine.sample_pressure(&session, 0.1).await;

        engine.session_deleted(&session).await;
        assert!(!dir.path().join("delete-me.memory.json").exists());
        assert!(!dir.path().join("delete-me.pressure.json").exists());

        // Deleting again is harmless
        engine.session_deleted(&session).await;
    }
}
