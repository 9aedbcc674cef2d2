use crate::analysis::{AnalysisBackend, Prediction};
use crate::messages::{AppEvent, UploadState};
use crate::store::{AnalysisResult, SessionStore};
use crate::validation::SelectedFile;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Cosmetic progress cadence: roughly two seconds from zero to the cap,
/// regardless of how the real transfer is doing.
const TICK_INTERVAL: Duration = Duration::from_millis(200);
const TICK_STEP: u8 = 10;

const GENERIC_FAILURE: &str = "Failed to analyze heartbeat. Please try again.";

/// What the main loop should do after a settlement was applied.
#[derive(Debug, PartialEq, Eq)]
pub enum Settlement {
    /// The result landed in the store; move to the result view.
    Navigate,
    /// The attempt failed; stay put and show the failure.
    Stay,
    /// A late response for a submission the user already abandoned.
    Discarded,
}

/// Coordinates one upload attempt: the cosmetic progress ticker and the real
/// network call, racing until the call settles.
///
/// The ticker may hit 100% first; only settlement drives the state machine
/// out of `Uploading`. Both tasks report back through the event channel and
/// all transitions happen on the caller's (single) thread.
pub struct UploadPipeline {
    state: UploadState,
    file: Option<SelectedFile>,
    backend: Arc<dyn AnalysisBackend>,
    store: SessionStore,
    events: mpsc::Sender<AppEvent>,
    ticker: Option<JoinHandle<()>>,
    request: Option<JoinHandle<()>>,
    /// Monotonic id of the latest submission; settlements carrying an older
    /// id (or arriving outside `Uploading`) are discarded.
    attempt: u64,
}

impl UploadPipeline {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        store: SessionStore,
        events: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            state: UploadState::Idle,
            file: None,
            backend,
            store,
            events,
            ticker: None,
            request: None,
            attempt: 0,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    /// A new file was accepted by validation. Supersedes whatever was held
    /// before, including a terminal state or a running upload (whose ticker
    /// stops; the request is left to settle and be discarded).
    pub fn file_selected(&mut self, file: SelectedFile) {
        self.cancel_ticker();
        tracing::info!("Selected {} ({} bytes)", file.name, file.size_bytes);
        self.file = Some(file);
        self.state = UploadState::FileSelected;
    }

    /// The held file was removed. Cancels the ticker but deliberately leaves
    /// any in-flight request alone; its settlement is dropped on arrival.
    pub fn file_removed(&mut self) {
        self.cancel_ticker();
        if let Some(file) = self.file.take() {
            tracing::info!("Removed {}", file.name);
        }
        self.state = UploadState::Idle;
    }

    /// `FileSelected`/`Failed` -> `Uploading`. Spawns the ticker and the
    /// network call; returns false when there is nothing to analyze or an
    /// upload is already running.
    pub fn begin_analysis(&mut self) -> bool {
        match self.state {
            UploadState::FileSelected | UploadState::Failed { .. } => {}
            _ => return false,
        }
        let Some(file) = &self.file else {
            return false;
        };

        self.attempt += 1;
        let attempt = self.attempt;
        self.state = UploadState::Uploading { progress: 0 };
        tracing::info!("Analyzing {} (attempt {})", file.name, attempt);

        let events = self.events.clone();
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            interval.tick().await; // the first tick completes immediately
            loop {
                interval.tick().await;
                if events.send(AppEvent::ProgressTick).await.is_err() {
                    break;
                }
            }
        }));

        let backend = self.backend.clone();
        let events = self.events.clone();
        let path = file.path.clone();
        let filename = file.name.clone();
        self.request = Some(tokio::spawn(async move {
            let outcome = async {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                backend.classify(&filename, bytes).await
            }
            .await;
            let _ = events.send(AppEvent::AnalysisSettled { attempt, outcome }).await;
        }));

        true
    }

    /// Cosmetic progress bump. Never drives the state machine out of
    /// `Uploading`; ticks arriving after settlement are ignored.
    pub fn on_tick(&mut self) -> Option<u8> {
        if let UploadState::Uploading { progress } = &mut self.state {
            *progress = progress.saturating_add(TICK_STEP).min(100);
            Some(*progress)
        } else {
            None
        }
    }

    /// Network settlement, the only driver of the `Uploading` exit. Tears
    /// the ticker down whichever way it goes.
    pub fn on_settled(&mut self, attempt: u64, outcome: Result<Prediction>) -> Settlement {
        if attempt != self.attempt || !matches!(self.state, UploadState::Uploading { .. }) {
            tracing::debug!("Dropping settlement for superseded attempt {}", attempt);
            return Settlement::Discarded;
        }

        self.cancel_ticker();
        self.request = None;

        match outcome {
            Ok(prediction) => {
                let filename = self.file.take().map(|f| f.name).unwrap_or_default();
                let record = AnalysisResult {
                    filename,
                    result: prediction.result,
                    confidence: prediction.confidence,
                    suggestion: prediction.suggestion,
                    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                };

                if let Err(e) = self.store.store_result(&record) {
                    tracing::error!("Could not store analysis result: {:#}", e);
                    self.state = UploadState::Failed {
                        message: GENERIC_FAILURE.to_string(),
                    };
                    return Settlement::Stay;
                }

                tracing::info!(
                    "Analysis complete: {} ({:.2})",
                    record.result.as_str(),
                    record.confidence
                );
                self.state = UploadState::Succeeded;
                Settlement::Navigate
            }
            Err(e) => {
                // The user sees one generic message; the cause goes to the log
                tracing::warn!("Analysis failed: {:#}", e);
                self.state = UploadState::Failed {
                    message: GENERIC_FAILURE.to_string(),
                };
                Settlement::Stay
            }
        }
    }

    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for UploadPipeline {
    fn drop(&mut self) {
        self.cancel_ticker();
        if let Some(request) = self.request.take() {
            request.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Category;
    use crate::recommendations::recommendations_for;

    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Backend that returns a pre-scripted settlement.
    struct ScriptedBackend {
        outcome: Mutex<Option<Result<Prediction>>>,
    }

    impl ScriptedBackend {
        fn ok(result: Category, confidence: f64, suggestion: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                outcome: Mutex::new(Some(Ok(Prediction {
                    result,
                    confidence,
                    suggestion: suggestion.map(str::to_string),
                }))),
            })
        }

        fn err(message: &str) -> Arc<Self> {
            let message = message.to_string();
            Arc::new(Self {
                outcome: Mutex::new(Some(Err(anyhow::anyhow!(message)))),
            })
        }
    }

    #[async_trait]
    impl AnalysisBackend for ScriptedBackend {
        async fn classify(&self, _filename: &str, bytes: Vec<u8>) -> Result<Prediction> {
            assert!(!bytes.is_empty(), "file bytes should reach the backend");
            self.outcome
                .lock()
                .unwrap()
                .take()
                .expect("backend called more than once")
        }
    }

    /// Write a small mono 16-bit WAV and return its path.
    fn fixture_wav(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..8000u32 {
            let t = i as f32 / 8000.0;
            let sample = ((t * 220.0 * std::f32::consts::TAU).sin() * 8000.0) as i16;
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn select_fixture(pipeline: &mut UploadPipeline, path: &PathBuf) {
        let size = std::fs::metadata(path).unwrap().len();
        let file = SelectedFile::accept(path, size).unwrap();
        pipeline.file_selected(file);
    }

    /// Pump the event channel until the settlement arrives, feeding ticks to
    /// the pipeline like the app loop does. Returns what on_settled decided.
    async fn drive_to_settlement(
        pipeline: &mut UploadPipeline,
        events: &mut mpsc::Receiver<AppEvent>,
    ) -> Settlement {
        let driven = async {
            loop {
                match events.recv().await.expect("event channel closed") {
                    AppEvent::ProgressTick => {
                        pipeline.on_tick();
                    }
                    AppEvent::AnalysisSettled { attempt, outcome } => {
                        return pipeline.on_settled(attempt, outcome);
                    }
                    AppEvent::PlaybackFinished => {}
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), driven)
            .await
            .expect("settlement never arrived")
    }

    #[tokio::test]
    async fn test_normal_classification_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_wav(&dir, "heart1.wav");
        let store = SessionStore::new();
        let (tx, mut rx) = mpsc::channel(64);
        let mut pipeline =
            UploadPipeline::new(ScriptedBackend::ok(Category::Normal, 0.95, None), store.clone(), tx);

        select_fixture(&mut pipeline, &path);
        assert_eq!(*pipeline.state(), UploadState::FileSelected);
        assert!(pipeline.begin_analysis());

        let settlement = drive_to_settlement(&mut pipeline, &mut rx).await;
        assert_eq!(settlement, Settlement::Navigate);
        assert_eq!(*pipeline.state(), UploadState::Succeeded);

        let record = store.load_result().expect("result stored");
        assert_eq!(record.filename, "heart1.wav");
        assert_eq!(record.result, Category::Normal);
        assert!((record.confidence - 0.95).abs() < f64::EPSILON);
        assert!(!record.timestamp.is_empty());

        let items = recommendations_for(record.result);
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| !i.priority));
    }

    #[tokio::test]
    async fn test_noisy_classification_carries_suggestion() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_wav(&dir, "noisy.wav");
        let store = SessionStore::new();
        let (tx, mut rx) = mpsc::channel(64);
        let backend = ScriptedBackend::ok(Category::Noisy, 0.4, Some("Re-record in a quiet room"));
        let mut pipeline = UploadPipeline::new(backend, store.clone(), tx);

        select_fixture(&mut pipeline, &path);
        assert!(pipeline.begin_analysis());
        assert_eq!(drive_to_settlement(&mut pipeline, &mut rx).await, Settlement::Navigate);

        let record = store.load_result().unwrap();
        assert_eq!(record.result, Category::Noisy);
        assert_eq!(record.suggestion.as_deref(), Some("Re-record in a quiet room"));

        let items = recommendations_for(record.result);
        assert!(items[0].priority);
        assert_eq!(items[0].title, "Re-record Audio");
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_wav(&dir, "heart1.wav");
        let store = SessionStore::new();
        let (tx, mut rx) = mpsc::channel(64);
        let mut pipeline =
            UploadPipeline::new(ScriptedBackend::err("connection refused"), store.clone(), tx);

        select_fixture(&mut pipeline, &path);
        assert!(pipeline.begin_analysis());
        assert_eq!(drive_to_settlement(&mut pipeline, &mut rx).await, Settlement::Stay);

        match pipeline.state() {
            UploadState::Failed { message } => assert!(!message.is_empty()),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(store.load_result(), None);
        // The failure is actionable: the user may retry
        assert!(pipeline.begin_analysis());
    }

    #[tokio::test]
    async fn test_progress_is_capped_and_cosmetic() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_wav(&dir, "heart1.wav");
        let (tx, _rx) = mpsc::channel(64);
        let mut pipeline = UploadPipeline::new(
            ScriptedBackend::ok(Category::Normal, 0.9, None),
            SessionStore::new(),
            tx,
        );

        select_fixture(&mut pipeline, &path);
        assert!(pipeline.begin_analysis());

        // Ticks past the cap stay at 100 and never leave Uploading
        for _ in 0..15 {
            pipeline.on_tick();
        }
        assert_eq!(*pipeline.state(), UploadState::Uploading { progress: 100 });
    }

    #[tokio::test]
    async fn test_removal_mid_upload_discards_late_settlement() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_wav(&dir, "heart1.wav");
        let store = SessionStore::new();
        let (tx, mut rx) = mpsc::channel(64);
        let mut pipeline =
            UploadPipeline::new(ScriptedBackend::ok(Category::Murmur, 0.8, None), store.clone(), tx);

        select_fixture(&mut pipeline, &path);
        assert!(pipeline.begin_analysis());

        // The user moves on while the request is in flight
        pipeline.file_removed();
        assert_eq!(*pipeline.state(), UploadState::Idle);
        assert_eq!(pipeline.on_tick(), None, "ticker output ignored after removal");

        assert_eq!(
            drive_to_settlement(&mut pipeline, &mut rx).await,
            Settlement::Discarded
        );
        assert_eq!(*pipeline.state(), UploadState::Idle);
        assert_eq!(store.load_result(), None);
    }

    #[tokio::test]
    async fn test_analysis_requires_a_selected_file() {
        let (tx, _rx) = mpsc::channel(64);
        let mut pipeline = UploadPipeline::new(
            ScriptedBackend::ok(Category::Normal, 0.9, None),
            SessionStore::new(),
            tx,
        );
        assert!(!pipeline.begin_analysis());
        assert_eq!(*pipeline.state(), UploadState::Idle);
    }

    #[tokio::test]
    async fn test_unreadable_file_settles_as_failure() {
        let store = SessionStore::new();
        let (tx, mut rx) = mpsc::channel(64);
        let mut pipeline = UploadPipeline::new(
            ScriptedBackend::ok(Category::Normal, 0.9, None),
            store.clone(),
            tx,
        );

        let file = SelectedFile::accept(std::path::Path::new("/nonexistent/heart1.wav"), 1024).unwrap();
        pipeline.file_selected(file);
        assert!(pipeline.begin_analysis());

        assert_eq!(drive_to_settlement(&mut pipeline, &mut rx).await, Settlement::Stay);
        assert!(matches!(pipeline.state(), UploadState::Failed { .. }));
        assert_eq!(store.load_result(), None);
    }
}
