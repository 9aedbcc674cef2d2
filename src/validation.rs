use std::path::{Path, PathBuf};

use thiserror::Error;

/// Largest accepted recording, boundary inclusive.
pub const MAX_RECORDING_BYTES: u64 = 10 * 1024 * 1024;

/// Reasons a candidate recording is refused before anything is uploaded.
///
/// These are local and recoverable; the user picks another file. They never
/// reach the upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("Please upload a .wav audio file")]
    BadExtension,
    #[error("File size must be less than 10MB")]
    TooLarge,
}

/// A recording that passed validation and is held for preview and upload.
///
/// The bytes are re-read from `path` at submission time, so the struct only
/// carries metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub size_bytes: u64,
    pub mime_hint: String,
    pub path: PathBuf,
}

impl SelectedFile {
    /// Gate a candidate. Extension is checked before size; the first
    /// violation wins.
    pub fn accept(path: &Path, size_bytes: u64) -> Result<Self, RejectReason> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !name.to_lowercase().ends_with(".wav") {
            return Err(RejectReason::BadExtension);
        }

        if size_bytes > MAX_RECORDING_BYTES {
            return Err(RejectReason::TooLarge);
        }

        Ok(Self {
            name,
            size_bytes,
            mime_hint: "audio/wav".to_string(),
            path: path.to_path_buf(),
        })
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }
}
