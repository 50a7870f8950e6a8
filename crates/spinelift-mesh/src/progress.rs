//! Progress reporting and cancellation.
//!
//! After each stage the pipeline hands a [`ProgressEvent`] to the
//! caller's [`ProgressSink`]. Sinks are fire-and-forget: the pipeline
//! never waits on them, and a sink that panics is logged and otherwise
//! ignored. Cancellation is cooperative and checked only between stages.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};

use crate::types::Stage;

/// Reported once a stage has completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The stage that just finished.
    pub stage: Stage,
    /// Overall completion, see [`Stage::percent`].
    pub percent: u8,
    /// Short human-readable summary of what the stage produced.
    pub message: String,
}

impl ProgressEvent {
    /// Event for a completed stage.
    #[must_use]
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent: stage.percent(),
            message: message.into(),
        }
    }
}

/// Receives progress events. Implemented for any `Fn(&ProgressEvent)`.
pub trait ProgressSink {
    /// Handle one event. Must not block for long.
    fn report(&self, event: &ProgressEvent);
}

impl<F: Fn(&ProgressEvent)> ProgressSink for F {
    fn report(&self, event: &ProgressEvent) {
        self(event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Forwards events over a channel. A disconnected receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink(Sender<ProgressEvent>);

impl ChannelSink {
    /// Wrap the sending half of a channel.
    #[must_use]
    pub const fn new(sender: Sender<ProgressEvent>) -> Self {
        Self(sender)
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, event: &ProgressEvent) {
        if self.0.send(event.clone()).is_err() {
            tracing::trace!(stage = %event.stage, "progress receiver dropped");
        }
    }
}

/// Deliver an event, containing any panic raised by the sink.
pub(crate) fn deliver(sink: &dyn ProgressSink, event: &ProgressEvent) {
    if catch_unwind(AssertUnwindSafe(|| sink.report(event))).is_err() {
        tracing::warn!(stage = %event.stage, "progress sink panicked; continuing");
    }
}

/// Shared flag a caller sets to stop a run before its next stage.
///
/// Clones share the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// A new, unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Optional collaborators for a single run.
#[derive(Default, Clone, Copy)]
pub struct RunOptions<'a> {
    /// Receives an event after each stage.
    pub progress: Option<&'a dyn ProgressSink>,
    /// Checked before each stage.
    pub cancel: Option<&'a CancellationFlag>,
}

impl<'a> RunOptions<'a> {
    /// Report progress to `sink`.
    #[must_use]
    pub const fn with_progress(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Observe `flag` for cancellation.
    #[must_use]
    pub const fn with_cancel(mut self, flag: &'a CancellationFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancellationFlag::is_cancelled)
    }

    pub(crate) fn report(&self, event: &ProgressEvent) {
        if let Some(sink) = self.progress {
            deliver(sink, event);
        }
    }
}

impl std::fmt::Debug for RunOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("progress", &self.progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}
