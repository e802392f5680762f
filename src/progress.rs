// Progress layer: percentages scraped from the download tool's output.
// The tool has no machine-readable progress protocol; percentages just
// sometimes show up in its text output before a `%` sign. `ProgressTracker`
// turns that into a value that only ever moves forward, and `ProgressDisplay`
// draws it with `indicatif`.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};

/// Upper bound of a progress value.
pub const COMPLETE: f64 = 100.0;

/// Extract a percentage from one output line: the last whitespace-delimited
/// token before the first `%`. Anything that does not parse as a finite
/// number is not a progress line. The result is clamped to 0..=100.
pub fn parse_percentage(line: &str) -> Option<f64> {
    let (before, _) = line.split_once('%')?;
    let token = before.split_whitespace().next_back()?;
    let value: f64 = token.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.clamp(0.0, COMPLETE))
}

/// Monotonic completion value for one session.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProgressTracker {
    current: f64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Start over for a new invocation.
    pub fn reset(&mut self) {
        self.current = 0.0;
    }

    /// Feed one output line; returns the new value if it moved forward.
    pub fn observe(&mut self, line: &str) -> Option<f64> {
        parse_percentage(line).and_then(|value| self.advance(value))
    }

    /// Record `value` if it exceeds the current one.
    pub fn advance(&mut self, value: f64) -> Option<f64> {
        if value > self.current {
            self.current = value;
            Some(value)
        } else {
            None
        }
    }

    /// End of stream: jump to 100 once if we are not there yet.
    pub fn finish(&mut self) -> Option<f64> {
        self.advance(COMPLETE)
    }
}

/// Terminal progress bar for one download. Tool output is printed above the
/// bar so the two do not garble each other. When stderr is not a terminal the
/// bar is hidden and output goes straight to stdout.
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    pub fn new(label: &str) -> Self {
        Self::with_bar(ProgressBar::new(COMPLETE as u64), label)
    }

    fn with_bar(bar: ProgressBar, label: &str) -> Self {
        if let Ok(style) =
            ProgressStyle::with_template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}%")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(label.to_string());
        ProgressDisplay { bar }
    }

    pub fn echo(&self, line: &str) {
        self.echo_to(line, &mut io::stdout());
    }

    // `ProgressBar::println` drops the line when the bar is hidden.
    fn echo_to<W: Write>(&self, line: &str, out: &mut W) {
        if self.bar.is_hidden() {
            let _ = writeln!(out, "{}", line);
        } else {
            self.bar.println(line);
        }
    }

    pub fn set_percent(&self, percent: f64) {
        self.bar.set_position(percent.floor() as u64);
    }

    pub fn complete(&self) {
        self.bar.finish();
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}
