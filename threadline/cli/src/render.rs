//! Incremental terminal output for streamed snapshots
//!
//! Snapshots carry the whole message so far. Only the new suffix is printed,
//! and a trailing line that might still become a `TITLE:` marker is held back
//! until it can no longer be stripped.

use threadline_core::streaming::TITLE_MARKER;

/// Tracks how much of the message has been written
#[derive(Debug, Default)]
pub struct SnapshotPrinter {
    printed: String,
}

impl SnapshotPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to write for a new snapshot
    pub fn advance(&mut self, content: &str) -> String {
        let stable = &content[..stable_len(content)];
        self.take_suffix(stable)
    }

    /// Text to write for the finalized message
    pub fn finish(&mut self, content: &str) -> String {
        let mut out = self.take_suffix(content);
        out.push('\n');
        out
    }

    fn take_suffix(&mut self, target: &str) -> String {
        match target.strip_prefix(self.printed.as_str()) {
            Some(suffix) => {
                let suffix = suffix.to_string();
                self.printed.push_str(&suffix);
                suffix
            }
            None => String::new(),
        }
    }
}

/// Length of the prefix that can no longer change
fn stable_len(content: &str) -> usize {
    let line_start = content.rfind('\n').map_or(0, |i| i + 1);
    let last_line = &content[line_start..];
    if !last_line.is_empty() && TITLE_MARKER.starts_with(last_line) {
        line_start
    } else {
        content.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prints_only_new_text() {
        let mut printer = SnapshotPrinter::new();
        assert_eq!(printer.advance("Hel"), "Hel");
        assert_eq!(printer.advance("Hello"), "lo");
        assert_eq!(printer.advance("Hello"), "");
        assert_eq!(printer.finish("Hello"), "\n");
    }

    #[test]
    fn test_holds_back_possible_marker() {
        let mut printer = SnapshotPrinter::new();
        assert_eq!(printer.advance("Answer\nTI"), "Answer\n");
        assert_eq!(printer.advance("Answer\nTITL"), "");
        // Marker completed and stripped
        assert_eq!(printer.advance("Answer\n"), "");
        assert_eq!(printer.finish("Answer"), "\n");
    }

    #[test]
    fn test_releases_line_that_is_not_a_marker() {
        let mut printer = SnapshotPrinter::new();
        assert_eq!(printer.advance("T"), "");
        assert_eq!(printer.advance("The end"), "The end");
    }
}
