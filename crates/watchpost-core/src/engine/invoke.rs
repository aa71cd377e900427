//! Detector invocation, inline or on dedicated worker threads.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::panic_message;
use crate::domain::{ClassificationResult, Frame, Timestamp};
use crate::ports::Detector;

/// How the orchestrator calls its detectors for each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvocationMode {
    /// Call each detector in turn on the orchestrator thread.
    #[default]
    Sequential,
    /// Give each detector its own worker thread and call them concurrently.
    /// A detector that has not answered within `timeout` gets an `error`
    /// result for that frame.
    Parallel {
        /// Per-module deadline, measured from when the frame is handed out.
        timeout: Duration,
    },
}

/// Runs one classification, turning panics into errors.
pub(crate) fn classify_guarded(
    detector: &mut dyn Detector,
    frame: &Frame,
    timestamp: &Timestamp,
) -> Result<ClassificationResult> {
    match catch_unwind(AssertUnwindSafe(|| detector.classify(frame, timestamp))) {
        Ok(outcome) => outcome,
        Err(payload) => Err(anyhow::anyhow!(
            "detector panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

/// Owns a detector and calls it on the caller's or a worker's thread.
pub(crate) enum Invoker {
    Inline(Box<dyn Detector>),
    Worker(ModuleWorker),
}

impl Invoker {
    /// Wraps `detector` according to `mode`.
    pub(crate) fn new(detector: Box<dyn Detector>, mode: InvocationMode) -> Result<Self> {
        match mode {
            InvocationMode::Sequential => Ok(Self::Inline(detector)),
            InvocationMode::Parallel { .. } => ModuleWorker::spawn(detector).map(Self::Worker),
        }
    }
}

struct Request {
    seq: u64,
    frame: Arc<Frame>,
    timestamp: Timestamp,
}

struct Reply {
    seq: u64,
    outcome: Result<ClassificationResult>,
}

/// A worker thread that exclusively owns one detector.
///
/// Requests and replies carry a sequence number so that a reply arriving
/// after its frame timed out is recognised and dropped. At most one request
/// is outstanding: while the detector is still working on a timed-out frame,
/// new frames are refused instead of queued.
pub(crate) struct ModuleWorker {
    id: String,
    next_seq: u64,
    in_flight: Option<u64>,
    requests: Option<Sender<Request>>,
    replies: Receiver<Reply>,
}

impl ModuleWorker {
    fn spawn(mut detector: Box<dyn Detector>) -> Result<Self> {
        let id = detector.id().to_string();
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();

        thread::Builder::new()
            .name(format!("detector-{id}"))
            .spawn(move || {
                while let Ok(request) = request_rx.recv() {
                    let outcome =
                        classify_guarded(detector.as_mut(), &request.frame, &request.timestamp);
                    if reply_tx
                        .send(Reply {
                            seq: request.seq,
                            outcome,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                debug!(module = detector.id(), "detector worker exiting");
            })
            .with_context(|| format!("Failed to spawn worker thread for detector '{id}'"))?;

        Ok(Self {
            id,
            next_seq: 0,
            in_flight: None,
            requests: Some(request_tx),
            replies: reply_rx,
        })
    }

    /// Hands a frame to the worker. Returns the request's sequence number.
    ///
    /// Fails without queueing anything if the worker has not yet answered an
    /// earlier request.
    pub(crate) fn submit(&mut self, frame: &Arc<Frame>, timestamp: &Timestamp) -> Result<u64> {
        self.drain_late_replies();
        if let Some(pending) = self.in_flight {
            debug!(
                module = %self.id,
                pending,
                frame = frame.index,
                "detector busy, frame not submitted"
            );
            anyhow::bail!("detector timed out (still busy with an earlier frame)");
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.requests
            .as_ref()
            .context("worker channel closed")?
            .send(Request {
                seq,
                frame: Arc::clone(frame),
                timestamp: timestamp.clone(),
            })
            .map_err(|_| anyhow::anyhow!("detector worker is no longer running"))?;
        self.in_flight = Some(seq);
        Ok(seq)
    }

    /// Discards replies to requests that already timed out.
    fn drain_late_replies(&mut self) {
        while let Ok(reply) = self.replies.try_recv() {
            debug!(module = %self.id, seq = reply.seq, "dropping late reply");
            if self.in_flight == Some(reply.seq) {
                self.in_flight = None;
            }
        }
    }

    /// Waits for the reply to request `seq` until `deadline`.
    pub(crate) fn collect(&mut self, seq: u64, deadline: Instant) -> Result<ClassificationResult> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) if reply.seq == seq => {
                    self.in_flight = None;
                    return reply.outcome;
                }
                Ok(reply) => {
                    debug!(module = %self.id, seq = reply.seq, "dropping late reply");
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(module = %self.id, seq, "detector timed out");
                    anyhow::bail!("detector timed out");
                }
                Err(RecvTimeoutError::Disconnected) => {
                    anyhow::bail!("detector worker is no longer running");
                }
            }
        }
    }
}

impl Drop for ModuleWorker {
    fn drop(&mut self) {
        // Closing the request channel lets the worker exit after its current frame.
        self.requests.take();
    }
}
