//! Progress reporting and cooperative cancellation for long operations.
//!
//! Projection, isosurface extraction and volume smoothing accept a
//! [`Monitor`]. The operation reports coarse milestones to the progress sink
//! and polls the cancellation predicate between batches; nothing is ever
//! interrupted mid-batch.

use crate::error::{Result, VisbrainError};

/// Receives `(done, total, stage)` milestones.
pub trait ProgressSink {
    fn progress(&mut self, done: usize, total: usize, stage: &str);
}

impl<F: FnMut(usize, usize, &str)> ProgressSink for F {
    fn progress(&mut self, done: usize, total: usize, stage: &str) {
        self(done, total, stage);
    }
}

/// Optional progress sink plus optional cancellation predicate.
#[derive(Default)]
pub struct Monitor<'a> {
    sink: Option<&'a mut dyn ProgressSink>,
    cancel: Option<&'a dyn Fn() -> bool>,
}

impl<'a> Monitor<'a> {
    /// A monitor that reports nothing and never cancels.
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_progress(mut self, sink: &'a mut dyn ProgressSink) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: &'a dyn Fn() -> bool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Forwards a milestone to the sink, if any.
    pub fn report(&mut self, done: usize, total: usize, stage: &str) {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.progress(done, total, stage);
        }
    }

    /// Returns [`VisbrainError::Cancelled`] once the predicate fires.
    pub fn check(&self) -> Result<()> {
        match self.cancel {
            Some(cancel) if cancel() => {
                log::debug!("operation cancelled by caller");
                Err(VisbrainError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_report_and_cancel() {
        let mut seen = Vec::new();
        let mut sink = |done: usize, total: usize, stage: &str| seen.push((done, total, stage.to_string()));
        let flag = Cell::new(false);
        let cancel = || flag.get();
        {
            let mut monitor = Monitor::none().with_progress(&mut sink).with_cancel(&cancel);
            monitor.report(1, 2, "roi");
            assert!(monitor.check().is_ok());
            flag.set(true);
            assert!(matches!(monitor.check(), Err(VisbrainError::Cancelled)));
        }
        assert_eq!(seen, vec![(1, 2, "roi".to_string())]);
    }

    #[test]
    fn test_none_is_inert() {
        let mut m = Monitor::none();
        m.report(0, 0, "x");
        assert!(m.check().is_ok());
    }
}
