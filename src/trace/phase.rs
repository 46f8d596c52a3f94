//! Lifecycle checkpoints for a single request.

use std::time::Instant;

use crate::trace::model::PhaseTiming;

/// Captures monotonic timestamps while a request moves through the recorder.
///
/// Only interception entry and the hand-off to the inner service are
/// observable here; `middleware`, `guard` and `interceptor_post` stay `0.0`.
#[derive(Debug, Clone, Copy)]
pub struct PhaseTimer {
    start: Instant,
    handler_start: Option<Instant>,
}

impl PhaseTimer {
    pub fn start() -> Self {
        Self::start_at(Instant::now())
    }

    pub fn start_at(start: Instant) -> Self {
        Self {
            start,
            handler_start: None,
        }
    }

    /// Mark the moment control passes to the handler. Later calls are ignored.
    pub fn mark_handler_start(&mut self) {
        self.mark_handler_start_at(Instant::now());
    }

    pub fn mark_handler_start_at(&mut self, at: Instant) {
        if self.handler_start.is_none() {
            self.handler_start = Some(at.max(self.start));
        }
    }

    /// Close the timer at `end`, returning the phase breakdown and total duration in ms.
    ///
    /// A timer that never saw the handler mark attributes everything to
    /// `interceptor_pre`.
    pub fn finish_at(&self, end: Instant) -> (PhaseTiming, f64) {
        let end = end.max(self.start);
        let handler_start = self.handler_start.unwrap_or(end).min(end);

        let timing = PhaseTiming {
            interceptor_pre: millis(handler_start - self.start),
            handler: millis(end - handler_start),
            ..PhaseTiming::default()
        };
        (timing, millis(end - self.start))
    }

    pub fn finish(&self) -> (PhaseTiming, f64) {
        self.finish_at(Instant::now())
    }
}

fn millis(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
