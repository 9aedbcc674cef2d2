use crate::analysis::Prediction;

use anyhow::Result;
use std::path::PathBuf;

/// Background events delivered to the main loop.
///
/// Tasks never mutate application state directly; everything funnels through
/// these so transitions apply atomically on the one logical thread.
#[derive(Debug)]
pub enum AppEvent {
    /// Cosmetic progress bump from the ticker.
    ProgressTick,
    /// The network call settled. `attempt` identifies which submission this
    /// belongs to, so a superseded response can be discarded.
    AnalysisSettled {
        attempt: u64,
        outcome: Result<Prediction>,
    },
    /// The preview sink drained naturally.
    PlaybackFinished,
}

/// Upload pipeline state.
///
/// `Uploading` implies exactly one in-flight network call; `progress` is a
/// cosmetic percentage unrelated to transfer bytes. The only exits from the
/// terminal states are a new file selection or an explicit retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    FileSelected,
    Uploading { progress: u8 },
    Succeeded,
    Failed { message: String },
}

/// Which of the two views the session is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Upload,
    Result,
}

/// Parsed user commands for the interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select(PathBuf),
    Play,
    Remove,
    Analyze,
    ShowResult,
    Back,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. `None` means unrecognized input.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "select" | "open" if !rest.is_empty() => Some(Command::Select(PathBuf::from(rest))),
            "play" | "pause" | "p" => Some(Command::Play),
            "remove" | "x" => Some(Command::Remove),
            "analyze" | "a" => Some(Command::Analyze),
            "result" | "r" => Some(Command::ShowResult),
            "back" | "b" => Some(Command::Back),
            "help" | "h" | "?" => Some(Command::Help),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}
