use crate::analysis::Category;
use crate::messages::UploadState;
use crate::recommendations::recommendations_for;
use crate::store::AnalysisResult;
use crate::validation::SelectedFile;

use chrono::DateTime;
use std::fmt::Write;

pub const HELP: &str = "\
Commands:
  select <path>   choose a .wav recording (max 10MB)
  play            start/pause preview playback
  remove          discard the selected recording
  analyze         submit the recording for analysis
  result          show the latest analysis
  back            return to the upload view
  help            show this message
  quit            exit";

/// Nearest-integer percent for display.
pub fn confidence_percent(confidence: f64) -> u32 {
    (confidence * 100.0).round() as u32
}

fn headline(category: Category) -> (&'static str, &'static str) {
    match category {
        Category::Normal => (
            "Normal Heartbeat Detected",
            "Your heartbeat analysis shows normal patterns. Keep maintaining your heart health!",
        ),
        Category::Murmur => (
            "Heart Murmur Detected",
            "A heart murmur has been detected. Please consult with a healthcare professional for proper evaluation.",
        ),
        Category::Noisy => (
            "Audio Quality Issue",
            "The audio quality is not clear enough for accurate analysis. Please try recording again in a quieter environment.",
        ),
    }
}

/// Render the upload view for the current pipeline state.
pub fn upload_view(state: &UploadState, file: Option<&SelectedFile>) -> String {
    let mut out = String::from("-- Upload --\n");

    match file {
        Some(file) => {
            let _ = writeln!(out, "File ready for analysis: {} ({:.2} MB)", file.name, file.size_mb());
        }
        None => out.push_str("Drop zone empty. Use `select <path>` to choose a .wav recording.\n"),
    }

    match state {
        UploadState::Idle | UploadState::FileSelected => {}
        UploadState::Uploading { progress } => {
            let _ = writeln!(out, "Analyzing heartbeat... {}%", progress);
        }
        UploadState::Succeeded => out.push_str("Analysis complete. Use `result` to view it.\n"),
        UploadState::Failed { message } => {
            let _ = writeln!(out, "{}", message);
        }
    }

    out
}

/// Render the result view from whatever the session store holds.
///
/// An absent result is a valid state, not an error; it renders a call to
/// action instead.
pub fn result_view(result: Option<&AnalysisResult>) -> String {
    let Some(result) = result else {
        return "-- Results --\n\
                No analysis found. Upload a recording first (`back`, then `select <path>`).\n"
            .to_string();
    };

    let (title, description) = headline(result.result);
    let mut out = String::from("-- Results --\n");
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", description);
    out.push('\n');
    let _ = writeln!(out, "File:       {}", result.filename);
    let _ = writeln!(out, "Confidence: {}%", confidence_percent(result.confidence));
    let _ = writeln!(out, "Analyzed:   {}", analyzed_date(&result.timestamp));
    if let Some(suggestion) = &result.suggestion {
        let _ = writeln!(out, "Suggestion: {}", suggestion);
    }

    out.push_str("\nRecommendations:\n");
    for (i, item) in recommendations_for(result.result).iter().enumerate() {
        let tag = if item.priority { " [priority]" } else { "" };
        let _ = writeln!(out, "  {}. {}{}", i + 1, item.title, tag);
        let _ = writeln!(out, "     {}", item.description);
        let _ = writeln!(out, "     -> {}", item.action_label);
    }

    out
}

fn analyzed_date(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}
