use crate::analysis::AnalysisBackend;
use crate::messages::{AppEvent, Command, UploadState, View};
use crate::pipeline::{Settlement, UploadPipeline};
use crate::preview::{Preview, PreviewFactory};
use crate::store::SessionStore;
use crate::validation::SelectedFile;
use crate::view;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Interactive session: the upload view and the result view, driven by
/// stdin commands and background events.
///
/// Owns the single preview handle and the upload pipeline. All state changes
/// happen in this loop, one event at a time. Must run inside a LocalSet
/// because the preview's output stream is !Send.
pub struct App {
    pipeline: UploadPipeline,
    store: SessionStore,
    preview: Option<Box<dyn Preview>>,
    preview_factory: PreviewFactory,
    events_tx: mpsc::Sender<AppEvent>,
    events_rx: mpsc::Receiver<AppEvent>,
    view: View,
}

impl App {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        store: SessionStore,
        preview_factory: PreviewFactory,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        let pipeline = UploadPipeline::new(backend, store.clone(), events_tx.clone());

        Self {
            pipeline,
            store,
            preview: None,
            preview_factory,
            events_tx,
            events_rx,
            view: View::Upload,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        println!("{}", view::HELP);
        self.render();

        // The preview resource is released on every exit path, error included
        let result = self.event_loop().await;
        self.release_preview();
        tracing::info!("Session ended");
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.handle_line(&line).await {
                                return Ok(());
                            }
                        }
                        None => return Ok(()), // stdin closed
                    }
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Returns false when the session should end.
    async fn handle_line(&mut self, line: &str) -> bool {
        let Some(command) = Command::parse(line) else {
            if !line.trim().is_empty() {
                println!("Unknown command. Type `help` for the command list.");
            }
            return true;
        };

        tracing::debug!("Handling command {:?}", command);
        match command {
            Command::Select(path) => self.select_file(&path).await,
            Command::Play => self.toggle_playback(),
            Command::Remove => self.remove_file(),
            Command::Analyze => self.start_analysis(),
            Command::ShowResult => {
                self.view = View::Result;
                self.render();
            }
            Command::Back => {
                self.view = View::Upload;
                self.render();
            }
            Command::Help => println!("{}", view::HELP),
            Command::Quit => return false,
        }
        true
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ProgressTick => {
                if let Some(progress) = self.pipeline.on_tick() {
                    println!("Analyzing heartbeat... {}%", progress);
                }
            }
            AppEvent::AnalysisSettled { attempt, outcome } => {
                match self.pipeline.on_settled(attempt, outcome) {
                    Settlement::Navigate => {
                        // Successful submission discards the held file
                        self.release_preview();
                        self.view = View::Result;
                        self.render();
                    }
                    Settlement::Stay => self.render(),
                    Settlement::Discarded => {}
                }
            }
            AppEvent::PlaybackFinished => {
                if let Some(preview) = &mut self.preview {
                    preview.mark_finished();
                }
            }
        }
    }

    async fn select_file(&mut self, path: &Path) {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                println!("Cannot read {}: {}", path.display(), e);
                return;
            }
        };

        match SelectedFile::accept(path, size) {
            Ok(file) => {
                // The previous handle is always released before a new one attaches
                self.release_preview();
                match (self.preview_factory)(&file.path, self.events_tx.clone()) {
                    Ok(handle) => self.preview = Some(handle),
                    Err(e) => {
                        tracing::warn!("Preview unavailable: {}", e);
                        println!("(preview unavailable, playback disabled)");
                    }
                }
                self.pipeline.file_selected(file);
                self.view = View::Upload;
                self.render();
            }
            Err(reason) => println!("{}", reason),
        }
    }

    fn remove_file(&mut self) {
        self.release_preview();
        self.pipeline.file_removed();
        self.render();
    }

    fn toggle_playback(&mut self) {
        if self.pipeline.file().is_none() {
            println!("Nothing to play. Select a recording first.");
            return;
        }
        match &mut self.preview {
            Some(preview) => {
                preview.toggle();
                if preview.is_playing() {
                    println!("Playing...");
                } else {
                    println!("Paused.");
                }
            }
            None => println!("Preview unavailable for this recording."),
        }
    }

    fn start_analysis(&mut self) {
        match self.pipeline.state() {
            UploadState::Uploading { .. } => println!("Analysis already in progress."),
            UploadState::Idle | UploadState::Succeeded => {
                println!("Select a .wav recording first (`select <path>`).")
            }
            UploadState::FileSelected | UploadState::Failed { .. } => {
                if self.pipeline.begin_analysis() {
                    self.render();
                }
            }
        }
    }

    fn release_preview(&mut self) {
        if let Some(mut preview) = self.preview.take() {
            preview.release();
        }
    }

    fn render(&self) {
        let rendered = match self.view {
            View::Upload => view::upload_view(self.pipeline.state(), self.pipeline.file()),
            View::Result => {
                let result = self.store.load_result();
                view::result_view(result.as_ref())
            }
        };
        println!("{}", rendered);
    }
}
