//! Title Marker Extraction
//!
//! The system prompt asks the model to end its answer with a line of the form
//! `TITLE: <a few words>`. That line names the conversation and must never be
//! shown or stored as part of the message.
//!
//! The marker can arrive split across any number of deltas, so extraction is
//! always run over the whole accumulated text rather than per delta.

use std::sync::LazyLock;

use regex::Regex;

/// Literal marker at the start of a line
pub const TITLE_MARKER: &str = "TITLE:";

static TITLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^TITLE:(.*)$").expect("title pattern is a valid regex")
});

/// Result of scanning accumulated text for the title marker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TitleScan {
    /// Text with the marker line (and one trailing newline) removed
    pub display_text: String,
    /// Trimmed title, `None` when absent or blank
    pub title: Option<String>,
}

/// Split accumulated text into display text and title
///
/// Only the first `TITLE:` line is treated as the marker. Matching is
/// case-sensitive and anchored at the start of a line.
#[must_use]
pub fn extract_title(accumulated: &str) -> TitleScan {
    let Some(caps) = TITLE_LINE.captures(accumulated) else {
        return TitleScan {
            display_text: accumulated.to_string(),
            title: None,
        };
    };

    let (Some(line), Some(rest)) = (caps.get(0), caps.get(1)) else {
        return TitleScan {
            display_text: accumulated.to_string(),
            title: None,
        };
    };

    let mut end = line.end();
    if accumulated[end..].starts_with('\n') {
        end += 1;
    }

    let mut display_text = String::with_capacity(accumulated.len() - (end - line.start()));
    display_text.push_str(&accumulated[..line.start()]);
    display_text.push_str(&accumulated[end..]);

    let title = rest.as_str().trim();
    TitleScan {
        display_text,
        title: (!title.is_empty()).then(|| title.to_string()),
    }
}
