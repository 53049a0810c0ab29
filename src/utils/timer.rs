//! Durations of tests, hooks and request phases

use std::iter;
use std::time::{Duration, Instant};

/// Wall-clock span of one test, hook or scheduling pass
#[derive(Debug)]
pub struct Timer {
    label: String,
    started: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Consume the timer; the span is traced under its label
    pub fn stop(self) -> Duration {
        let span = self.started.elapsed();
        tracing::trace!("{} took {}ms", self.label, span.as_millis());
        span
    }
}

/// Phase boundaries of one request, e.g. discovery then execution
#[derive(Debug)]
pub struct Stopwatch {
    started: Instant,
    marks: Vec<(String, Duration)>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            marks: Vec::new(),
        }
    }

    /// Close the phase that has been running since the previous mark
    pub fn lap(&mut self, phase: impl Into<String>) {
        self.marks.push((phase.into(), self.started.elapsed()));
    }

    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }

    /// Length of each closed phase, in the order they closed
    pub fn phases(&self) -> impl Iterator<Item = (&str, Duration)> + '_ {
        let openings = iter::once(Duration::ZERO).chain(self.marks.iter().map(|(_, at)| *at));
        self.marks
            .iter()
            .zip(openings)
            .map(|((phase, closed), opened)| (phase.as_str(), closed.saturating_sub(opened)))
    }

    /// `discovery=3ms execution=41ms total=44ms`
    pub fn format(&self) -> String {
        self.phases()
            .map(|(phase, length)| format!("{}={}ms", phase, length.as_millis()))
            .chain(iter::once(format!("total={}ms", self.total().as_millis())))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
