//! End-to-end pipeline tests: dispatch, summarise, persist
//!
//! These exercise the seams between the dispatcher, the summariser,
//! and the transcript store without touching audio hardware or the
//! network, using a scripted in-memory backend.

use ihear::error::DispatchError;
use ihear::store::{NewTranscript, TranscriptStore};
use ihear::summarize::{derive_title, Summarizer};
use ihear::transcribe::{BackendKind, Dispatcher, Transcriber};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A backend that returns a fixed transcript
struct FixedBackend {
    kind: BackendKind,
    text: &'static str,
}

impl Transcriber for FixedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn transcribe(&self, _samples: &[f32]) -> Result<String, DispatchError> {
        Ok(self.text.to_string())
    }
}

/// A backend that always fails with a network error
struct DownBackend {
    kind: BackendKind,
}

impl Transcriber for DownBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn transcribe(&self, _samples: &[f32]) -> Result<String, DispatchError> {
        Err(DispatchError::Network {
            backend: self.kind,
            message: "connection refused".into(),
        })
    }
}

const MEMO: &str = "Remember to send the quarterly report to the finance team. \
    The report needs the updated revenue figures from the sales dashboard. \
    Also book a meeting room for the review on Thursday. \
    Lunch was good today. \
    Finance wants the report before the Thursday review meeting.";

fn samples() -> Arc<Vec<f32>> {
    Arc::new(vec![0.05; 32000])
}

#[tokio::test]
async fn transcript_flows_from_backend_to_store() {
    let dir = TempDir::new().unwrap();
    let store = TranscriptStore::open(&dir.path().join("transcripts.db")).unwrap();

    let dispatcher = Dispatcher::new(
        vec![Arc::new(FixedBackend {
            kind: BackendKind::Local,
            text: MEMO,
        }) as Arc<dyn Transcriber>],
        Duration::from_secs(5),
    )
    .unwrap();

    let result = dispatcher.transcribe(samples()).await.unwrap();
    assert_eq!(result.backend_used, BackendKind::Local);

    let summary = Summarizer::default().summarize(&result.text);
    assert!(!summary.is_empty());
    assert!(summary.len() < result.text.len());

    let record = store
        .create(&NewTranscript {
            title: derive_title(&result.text, 8),
            transcript: result.text.clone(),
            summary: Some(summary),
            backend_used: result.backend_used.to_string(),
            duration_secs: 2.0,
            source: None,
        })
        .unwrap();

    assert_eq!(record.backend_used, "local");
    assert_eq!(record.title, "Remember to send the quarterly report to the\u{2026}");

    let listed = store.list(None).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);
}

#[tokio::test]
async fn fallback_result_records_which_backend_answered() {
    let dispatcher = Dispatcher::new(
        vec![
            Arc::new(DownBackend {
                kind: BackendKind::Remote,
            }) as Arc<dyn Transcriber>,
            Arc::new(FixedBackend {
                kind: BackendKind::Local,
                text: "fallback memo",
            }) as Arc<dyn Transcriber>,
        ],
        Duration::from_secs(5),
    )
    .unwrap();

    let result = dispatcher.transcribe(samples()).await.unwrap();
    assert_eq!(result.backend_used, BackendKind::Local);
    assert_eq!(result.text, "fallback memo");
}

#[test]
fn library_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("transcripts.db");

    {
        let store = TranscriptStore::open(&db_path).unwrap();
        store
            .create(&NewTranscript {
                title: "first memo".into(),
                transcript: "remember the milk".into(),
                summary: None,
                backend_used: "local".into(),
                duration_secs: 1.5,
                source: None,
            })
            .unwrap();
    }

    let store = TranscriptStore::open(&db_path).unwrap();
    let records = store.list(None).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].transcript, "remember the milk");

    // Regenerating a summary updates the stored row
    let updated = store.set_summary(records[0].id, "milk").unwrap();
    assert_eq!(updated.summary.as_deref(), Some("milk"));

    store.delete(records[0].id).unwrap();
    assert!(store.list(None).unwrap().is_empty());
}
