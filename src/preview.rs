use crate::messages::AppEvent;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// The preview resource could not be created. Non-fatal: playback controls
/// degrade to disabled while upload and analysis still work.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("no audio output available: {0}")]
    Output(String),
    #[error("could not open recording for playback: {0}")]
    Source(String),
}

/// Playable handle bound to one selected recording.
///
/// Exactly one of these exists per selected file. `release` must run on
/// removal or replacement, before any new handle attaches, and repeated
/// calls are no-ops.
pub trait Preview {
    /// Start playback if paused, or pause keeping position if playing.
    fn toggle(&mut self);

    fn is_playing(&self) -> bool;

    /// Called from the main loop when the end-of-stream observer fires.
    fn mark_finished(&mut self);

    /// Stop playback, reset position, drop the device resource.
    fn release(&mut self);
}

/// Creates the preview handle for a newly accepted file. Injected into the
/// app so tests can substitute a fake that counts releases.
pub type PreviewFactory =
    Box<dyn Fn(&Path, mpsc::Sender<AppEvent>) -> Result<Box<dyn Preview>, PreviewError>>;

/// rodio-backed preview of one recording.
///
/// The output stream is !Send, so the handle must live on the LocalSet that
/// runs the main loop.
pub struct RodioPreview {
    path: PathBuf,
    // Dropping the stream tears the device down; it must outlive the sink.
    stream: Option<rodio::OutputStream>,
    sink: Option<Arc<rodio::Sink>>,
    events: mpsc::Sender<AppEvent>,
    playing: bool,
    observer_armed: bool,
}

/// Open the default output device and queue the recording, paused at the
/// start.
pub fn attach(
    path: &Path,
    events: mpsc::Sender<AppEvent>,
) -> Result<Box<dyn Preview>, PreviewError> {
    let stream = rodio::OutputStreamBuilder::open_default_stream()
        .map_err(|e| PreviewError::Output(e.to_string()))?;

    let sink = rodio::Sink::connect_new(stream.mixer());
    sink.pause();
    queue_source(&sink, path)?;

    tracing::debug!("Preview attached for {}", path.display());
    Ok(Box::new(RodioPreview {
        path: path.to_path_buf(),
        stream: Some(stream),
        sink: Some(Arc::new(sink)),
        events,
        playing: false,
        observer_armed: false,
    }))
}

fn queue_source(sink: &rodio::Sink, path: &Path) -> Result<(), PreviewError> {
    let file = File::open(path).map_err(|e| PreviewError::Source(e.to_string()))?;
    let source =
        rodio::Decoder::new(BufReader::new(file)).map_err(|e| PreviewError::Source(e.to_string()))?;
    sink.append(source);
    Ok(())
}

impl Preview for RodioPreview {
    fn toggle(&mut self) {
        let Some(sink) = &self.sink else {
            return;
        };

        if self.playing {
            // Position is kept; only an explicit release resets it
            sink.pause();
            self.playing = false;
            return;
        }

        if sink.empty() {
            // Drained after a natural end; queue the recording again so
            // playback restarts from the top, like re-playing a finished clip
            if let Err(e) = queue_source(sink, &self.path) {
                tracing::warn!("Could not restart preview: {}", e);
                return;
            }
        }

        sink.play();
        self.playing = true;

        if !self.observer_armed {
            self.observer_armed = true;
            let sink = sink.clone();
            let events = self.events.clone();
            tokio::task::spawn_blocking(move || {
                sink.sleep_until_end();
                let _ = events.blocking_send(AppEvent::PlaybackFinished);
            });
        }
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn mark_finished(&mut self) {
        let Some(sink) = &self.sink else {
            self.playing = false;
            return;
        };
        // A stale observer event from a replaced handle finds a non-empty
        // sink here and is ignored
        if sink.empty() {
            self.playing = false;
            self.observer_armed = false;
        }
    }

    fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            // stop() clears the queue, which also wakes a parked observer
            sink.stop();
            tracing::debug!("Preview released for {}", self.path.display());
        }
        self.stream.take();
        self.playing = false;
    }
}
