use regex::Regex;

const ERROR_OR_WARNING: &str = "WARN|ERROR";
const RESULTS_BEGIN: &str = "DONE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    AwaitingMarker,
    /// Terminal until the end of the stream.
    Collecting,
}

/// What the scanner did with one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Matched the error/warning marker. Never collected.
    ErrorOrWarning,
    /// Matched the results marker and started collection, including this line.
    ResultsBegin,
    Collected,
    /// Blank line while collecting, dropped.
    Blank,
    /// Ordinary output before the results marker.
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub collected: Vec<String>,
    pub had_error_or_warning: bool,
}

/// Classifies client output one line at a time and accumulates the results section.
#[derive(Debug, Clone)]
pub struct OutputScanner {
    error_marker: Regex,
    results_marker: Regex,
    state: ScanState,
    outcome: ScanOutcome,
}

impl Default for OutputScanner {
    fn default() -> Self {
        Self::new(
            Regex::new(ERROR_OR_WARNING).expect("valid error marker"),
            Regex::new(RESULTS_BEGIN).expect("valid results marker"),
        )
    }
}

impl OutputScanner {
    pub fn new(error_marker: Regex, results_marker: Regex) -> Self {
        Self {
            error_marker,
            results_marker,
            state: ScanState::AwaitingMarker,
            outcome: ScanOutcome::default(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn feed(&mut self, line: &str) -> LineClass {
        let line = line.trim_end();

        // Each rule is checked on its own, an error line can still open the results section.
        let is_error = self.error_marker.is_match(line);
        if is_error {
            self.outcome.had_error_or_warning = true;
        }

        let mut class = LineClass::Ignored;
        if self.state == ScanState::AwaitingMarker && self.results_marker.is_match(line) {
            self.state = ScanState::Collecting;
            class = LineClass::ResultsBegin;
        }

        if is_error {
            return LineClass::ErrorOrWarning;
        }

        if self.state == ScanState::Collecting {
            if line.trim().is_empty() {
                return LineClass::Blank;
            }
            self.outcome.collected.push(line.to_string());
            if class != LineClass::ResultsBegin {
                class = LineClass::Collected;
            }
        }

        class
    }

    pub fn finish(self) -> ScanOutcome {
        self.outcome
    }

    /// Scan a whole stream with the default markers.
    pub fn scan<I, S>(lines: I) -> ScanOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut scanner = Self::default();
        for line in lines {
            scanner.feed(line.as_ref());
        }
        scanner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_from_marker_and_flags_errors() {
        let outcome = OutputScanner::scan([
            "noise",
            "ERROR bad",
            "=== Starting ===... DONE",
            "metric: 1.0",
            "",
            "more",
        ]);

        pretty_assertions::assert_eq!(
            outcome,
            ScanOutcome {
                collected: vec![
                    "=== Starting ===... DONE".to_string(),
                    "metric: 1.0".to_string(),
                    "more".to_string(),
                ],
                had_error_or_warning: true,
            }
        );
    }

    #[test]
    fn classifies_each_line() {
        let mut scanner = OutputScanner::default();
        assert_eq!(scanner.feed("Compiling"), LineClass::Ignored);
        assert_eq!(scanner.state(), ScanState::AwaitingMarker);
        assert_eq!(scanner.feed("WARN: slow"), LineClass::ErrorOrWarning);
        assert_eq!(scanner.feed("DONE"), LineClass::ResultsBegin);
        assert_eq!(scanner.state(), ScanState::Collecting);
        assert_eq!(scanner.feed("   "), LineClass::Blank);
        assert_eq!(scanner.feed("Mean: 1.0"), LineClass::Collected);
        assert_eq!(scanner.feed("ERROR late"), LineClass::ErrorOrWarning);
        // A second marker does not restart anything.
        assert_eq!(scanner.feed("DONE again"), LineClass::Collected);

        let outcome = scanner.finish();
        assert_eq!(outcome.collected, vec!["DONE", "Mean: 1.0", "DONE again"]);
        assert!(outcome.had_error_or_warning);
    }

    #[test]
    fn nothing_collected_without_marker() {
        let outcome = OutputScanner::scan(["a", "b", "Mean: 2.0"]);
        assert!(outcome.collected.is_empty());
        assert!(!outcome.had_error_or_warning);
    }

    #[test]
    fn markers_are_case_sensitive() {
        let outcome = OutputScanner::scan(["warning: lowercase", "done", "error"]);
        assert!(outcome.collected.is_empty());
        assert!(!outcome.had_error_or_warning);
    }

    #[test]
    fn error_line_can_open_the_results_section() {
        let mut scanner = OutputScanner::default();
        assert_eq!(scanner.feed("ERROR but DONE"), LineClass::ErrorOrWarning);
        assert_eq!(scanner.state(), ScanState::Collecting);
        assert_eq!(scanner.feed("Mean: 3.0"), LineClass::Collected);
        assert_eq!(scanner.finish().collected, vec!["Mean: 3.0"]);
    }

    #[test]
    fn trailing_whitespace_is_trimmed() {
        let outcome = OutputScanner::scan(["DONE \r", "Reqs/sec: 10\t"]);
        assert_eq!(outcome.collected, vec!["DONE", "Reqs/sec: 10"]);
    }
}
