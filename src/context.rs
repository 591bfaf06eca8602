//! Request context threaded through every pipeline stage.
//!
//! A [`RunContext`] carries a cooperative [`CancellationToken`], an optional
//! wall-clock deadline and an optional [`ProgressSink`]. Stages publish
//! [`ProgressEvent`]s at fixed checkpoints and never wait on the sink.
//!
//! ```
//! use std::sync::mpsc;
//! use doekit::context::{ProgressEvent, RunContext};
//!
//! let (tx, rx) = mpsc::channel::<ProgressEvent>();
//! let ctx = RunContext::new().with_progress(tx);
//! ctx.emit_progress(doekit::context::Stage::Design, 100.0, "design generated");
//! assert_eq!(rx.try_recv().unwrap().percent, 100.0);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pipeline stage reported in progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Stage {
    /// Design generation.
    Design,
    /// Model fitting.
    Analysis,
    /// Desirability search.
    Optimization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Design => "design",
            Self::Analysis => "analysis",
            Self::Optimization => "optimization",
        })
    }
}

/// A progress notification.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgressEvent {
    /// Stage that emitted the event.
    pub stage: Stage,
    /// Completion of the stage, 0..=100.
    pub percent: f64,
    /// Human-readable description.
    pub message: String,
}

/// Receiver of progress events.
///
/// Implementations must return quickly; the engine calls `publish` inline.
pub trait ProgressSink: Send + Sync {
    /// Deliver one event.
    fn publish(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn publish(&self, event: ProgressEvent) {
        self(event);
    }
}

/// Channel-backed sink. A disconnected receiver is ignored.
#[derive(Debug)]
pub struct ChannelSink(Mutex<Sender<ProgressEvent>>);

impl ChannelSink {
    /// Wrap the sending half of a channel.
    #[must_use]
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self(Mutex::new(tx))
    }
}

impl ProgressSink for ChannelSink {
    fn publish(&self, event: ProgressEvent) {
        if let Ok(tx) = self.0.lock() {
            let _ = tx.send(event);
        }
    }
}

/// Cloneable cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Why a long-running stage stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The cancellation token fired.
    Cancelled,
    /// The deadline passed.
    TimedOut,
}

/// Per-request context: cancellation, deadline and progress reporting.
#[derive(Clone, Default)]
pub struct RunContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("deadline", &self.deadline)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl RunContext {
    /// Context with no deadline, no progress sink and a fresh token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Stop long-running stages after `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Publish progress through a channel.
    #[must_use]
    pub fn with_progress(self, tx: Sender<ProgressEvent>) -> Self {
        self.with_progress_sink(ChannelSink::new(tx))
    }

    /// Publish progress through any sink.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Arc::new(sink));
        self
    }

    /// The cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Tighten the deadline to at most `timeout` from now.
    #[must_use]
    pub(crate) fn bounded_by(&self, timeout: Option<Duration>) -> Self {
        let mut ctx = self.clone();
        if let Some(timeout) = timeout {
            let candidate = Instant::now() + timeout;
            ctx.deadline = Some(ctx.deadline.map_or(candidate, |d| d.min(candidate)));
        }
        ctx
    }

    /// Check whether work should stop.
    #[must_use]
    pub fn interrupted(&self) -> Option<Interrupt> {
        if self.cancel.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupt::TimedOut),
            _ => None,
        }
    }

    /// Publish a progress event if a sink is attached.
    pub fn emit_progress(&self, stage: Stage, percent: f64, message: impl Into<String>) {
        if let Some(sink) = &self.progress {
            sink.publish(ProgressEvent {
                stage,
                percent: percent.clamp(0.0, 100.0),
                message: message.into(),
            });
        }
    }
}
