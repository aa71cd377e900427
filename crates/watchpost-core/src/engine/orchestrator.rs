//! The frame pump: fans each frame out to every detector, runs the alert
//! state machine per module, and hands fired alerts to the dispatcher.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::alert_state::AlertState;
use super::dispatcher::{AlertDispatcher, SinkFailure};
use super::invoke::{classify_guarded, InvocationMode, Invoker};
use crate::domain::{AlertEvent, ClassificationResult, DetectorConfig, Frame, Timestamp};
use crate::ports::{AlertSink, Detector, FrameSource, PipelineEvent, PipelineObserver};

/// Everything one frame produced.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    /// Frame index.
    pub frame: u64,
    /// Frame timestamp.
    pub timestamp: Timestamp,
    /// One result per registered module, in registration order.
    pub results: Vec<ClassificationResult>,
    /// Alerts fired on this frame, in registration order.
    pub alerts: Vec<AlertEvent>,
    /// Sinks that failed to take an alert.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sink_failures: Vec<SinkFailure>,
}

impl FrameReport {
    /// Number of modules that reported an error on this frame.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }
}

/// Totals for a complete run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Frames that went through every module.
    pub frames_processed: usize,
    /// Frames that could not be loaded.
    pub frames_skipped: usize,
    /// Alerts dispatched.
    pub alerts_fired: usize,
    /// Error results recorded across all modules and frames.
    pub module_errors: usize,
    /// Whether the run was stopped before the source ran out.
    pub cancelled: bool,
}

/// Cooperative cancellation for [`Orchestrator::run`].
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Creates a handle that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the run to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One registry entry: the detector, its alert config, and its alert state.
struct Slot {
    id: String,
    invoker: Invoker,
    config: DetectorConfig,
    state: AlertState,
}

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    registrations: Vec<(Box<dyn Detector>, DetectorConfig)>,
    sinks: Vec<Box<dyn AlertSink>>,
    mode: InvocationMode,
}

impl OrchestratorBuilder {
    /// Registers a detector. Registration order is processing order.
    #[must_use]
    pub fn register(mut self, detector: impl Detector + 'static, config: DetectorConfig) -> Self {
        self.registrations.push((Box::new(detector), config));
        self
    }

    /// Registers an already boxed detector.
    #[must_use]
    pub fn register_boxed(mut self, detector: Box<dyn Detector>, config: DetectorConfig) -> Self {
        self.registrations.push((detector, config));
        self
    }

    /// Adds an alert sink.
    #[must_use]
    pub fn sink(mut self, sink: impl AlertSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Adds an already boxed alert sink.
    #[must_use]
    pub fn sink_boxed(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Sets how detectors are invoked.
    #[must_use]
    pub const fn mode(mut self, mode: InvocationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if a detector id is empty or registered twice, or if
    /// a worker thread cannot be started.
    pub fn build(self) -> Result<Orchestrator> {
        let mut seen = HashSet::new();
        let mut slots = Vec::with_capacity(self.registrations.len());

        for (detector, config) in self.registrations {
            let id = detector.id().to_string();
            if id.trim().is_empty() {
                bail!("detector id must not be empty");
            }
            if !seen.insert(id.clone()) {
                bail!("detector '{id}' is registered more than once");
            }
            debug!(
                module = %id,
                alerting = ?config.alerting_statuses,
                sustain_secs = config.required_sustain_seconds(),
                cooldown_secs = config.cooldown_seconds(),
                "registered detector"
            );
            slots.push(Slot {
                invoker: Invoker::new(detector, self.mode)?,
                id,
                config,
                state: AlertState::new(),
            });
        }

        Ok(Orchestrator {
            slots,
            dispatcher: AlertDispatcher::new(self.sinks),
            mode: self.mode,
        })
    }
}

/// Drives detectors, alert state machines and the dispatcher frame by frame.
pub struct Orchestrator {
    slots: Vec<Slot>,
    dispatcher: AlertDispatcher,
    mode: InvocationMode,
}

impl Orchestrator {
    /// Starts building an orchestrator.
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Registered module ids, in processing order.
    #[must_use]
    pub fn module_ids(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.id.as_str()).collect()
    }

    /// Current alert state of a module.
    #[must_use]
    pub fn state(&self, module_id: &str) -> Option<&AlertState> {
        self.slots
            .iter()
            .find(|s| s.id == module_id)
            .map(|s| &s.state)
    }

    /// Invocation mode in use.
    #[must_use]
    pub const fn mode(&self) -> InvocationMode {
        self.mode
    }

    /// Runs one frame through every module and dispatches any alerts.
    pub fn process_frame(&mut self, frame: &Frame, timestamp: &Timestamp) -> FrameReport {
        let results = self.classify_all(frame, timestamp);
        self.apply(frame.index, timestamp, results)
    }

    /// Pumps `source` until it runs out or `stop` is triggered.
    ///
    /// A frame that is in flight when `stop` fires is discarded without
    /// touching any alert state.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        observer: &dyn PipelineObserver,
        stop: &StopHandle,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        observer.on_event(PipelineEvent::Started {
            modules: self.slots.iter().map(|s| s.id.clone()).collect(),
            total: source.count_hint(),
        });
        info!(modules = self.slots.len(), "pipeline started");

        for (index, item) in source.frames().enumerate() {
            if stop.is_stopped() {
                summary.cancelled = true;
                break;
            }

            let timed = match item {
                Ok(timed) => timed,
                Err(e) => {
                    warn!(index, "skipping frame: {e:#}");
                    observer.on_event(PipelineEvent::FrameSkipped {
                        index,
                        reason: format!("{e:#}"),
                    });
                    summary.frames_skipped += 1;
                    continue;
                }
            };

            let results = self.classify_all(&timed.frame, &timed.timestamp);
            if stop.is_stopped() {
                debug!(frame = timed.frame.index, "stop requested, discarding in-flight frame");
                summary.cancelled = true;
                break;
            }

            let report = self.apply(timed.frame.index, &timed.timestamp, results);
            summary.frames_processed += 1;
            summary.alerts_fired += report.alerts.len();
            summary.module_errors += report.error_count();
            observer.on_event(PipelineEvent::FrameProcessed { report });
        }

        info!(
            frames = summary.frames_processed,
            skipped = summary.frames_skipped,
            alerts = summary.alerts_fired,
            cancelled = summary.cancelled,
            "pipeline finished"
        );
        observer.on_event(PipelineEvent::Finished { summary });
        summary
    }

    /// Collects exactly one result per module, in registration order.
    fn classify_all(&mut self, frame: &Frame, timestamp: &Timestamp) -> Vec<ClassificationResult> {
        let outcomes: Vec<Result<ClassificationResult>> = match self.mode {
            InvocationMode::Sequential => self
                .slots
                .iter_mut()
                .map(|slot| match &mut slot.invoker {
                    Invoker::Inline(detector) => {
                        classify_guarded(detector.as_mut(), frame, timestamp)
                    }
                    Invoker::Worker(_) => Err(anyhow::anyhow!("detector not available inline")),
                })
                .collect(),
            InvocationMode::Parallel { timeout } => {
                let shared = Arc::new(frame.clone());
                let submitted: Vec<Result<u64>> = self
                    .slots
                    .iter_mut()
                    .map(|slot| match &mut slot.invoker {
                        Invoker::Worker(worker) => worker.submit(&shared, timestamp),
                        Invoker::Inline(_) => Err(anyhow::anyhow!("detector has no worker")),
                    })
                    .collect();

                let deadline = Instant::now() + timeout;
                self.slots
                    .iter_mut()
                    .zip(submitted)
                    .map(|(slot, seq)| match (&mut slot.invoker, seq) {
                        (Invoker::Worker(worker), Ok(seq)) => worker.collect(seq, deadline),
                        (_, Err(e)) => Err(e),
                        (Invoker::Inline(_), Ok(_)) => {
                            Err(anyhow::anyhow!("detector has no worker"))
                        }
                    })
                    .collect()
            }
        };

        self.slots
            .iter()
            .zip(outcomes)
            .map(|(slot, outcome)| settle(&slot.id, outcome))
            .collect()
    }

    /// Steps every module's alert state and dispatches what fired.
    fn apply(
        &mut self,
        frame_index: u64,
        timestamp: &Timestamp,
        results: Vec<ClassificationResult>,
    ) -> FrameReport {
        let mut alerts = Vec::new();
        for (slot, result) in self.slots.iter_mut().zip(&results) {
            if let Some(event) = slot.state.step(&slot.config, result, timestamp) {
                info!(
                    module = %event.module_id,
                    status = %event.status,
                    sustained_secs = event.sustained_seconds,
                    "alert fired"
                );
                alerts.push(event);
            }
        }

        let sink_failures = alerts
            .iter()
            .flat_map(|event| self.dispatcher.dispatch(event).failures)
            .collect();

        FrameReport {
            frame: frame_index,
            timestamp: timestamp.clone(),
            results,
            alerts,
            sink_failures,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("modules", &self.module_ids())
            .field("dispatcher", &self.dispatcher)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Turns a detector outcome into the result recorded for the frame.
fn settle(module_id: &str, outcome: Result<ClassificationResult>) -> ClassificationResult {
    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            warn!(module = module_id, "detector failed: {e:#}");
            return ClassificationResult::error(module_id, format!("{e:#}"));
        }
    };

    match result.validate(module_id) {
        Ok(()) => result,
        Err(reason) => {
            warn!(module = module_id, %reason, "detector returned a malformed result");
            ClassificationResult::error(module_id, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::ports::{NoopObserver, TimedFrame};

    /// Replays a fixed status on every frame.
    struct Constant {
        id: &'static str,
        status: &'static str,
    }

    impl Detector for Constant {
        fn id(&self) -> &str {
            self.id
        }

        fn classify(&mut self, _frame: &Frame, _ts: &Timestamp) -> Result<ClassificationResult> {
            Ok(ClassificationResult::new(self.id, self.status, 1.0, ""))
        }
    }

    struct AlwaysFails;

    impl Detector for AlwaysFails {
        fn id(&self) -> &str {
            "broken"
        }

        fn classify(&mut self, _frame: &Frame, _ts: &Timestamp) -> Result<ClassificationResult> {
            anyhow::bail!("model asset missing")
        }
    }

    struct WrongId;

    impl Detector for WrongId {
        fn id(&self) -> &str {
            "honest"
        }

        fn classify(&mut self, _frame: &Frame, _ts: &Timestamp) -> Result<ClassificationResult> {
            Ok(ClassificationResult::new("impostor", "normal", 1.0, ""))
        }
    }

    /// Stalls on the first frame only and records every frame it sees.
    struct StallsOnce {
        seen: Arc<Mutex<Vec<u64>>>,
    }

    impl Detector for StallsOnce {
        fn id(&self) -> &str {
            "stalls"
        }

        fn classify(&mut self, frame: &Frame, _ts: &Timestamp) -> Result<ClassificationResult> {
            if frame.index == 0 {
                std::thread::sleep(Duration::from_millis(200));
            }
            self.seen
                .lock()
                .map_err(|e| anyhow::anyhow!("{e}"))?
                .push(frame.index);
            Ok(ClassificationResult::new("stalls", "normal", 0.0, format!("frame {}", frame.index)))
        }
    }

    struct Collect(Mutex<Vec<String>>);

    impl AlertSink for Collect {
        fn name(&self) -> &str {
            "collect"
        }

        fn notify(&self, event: &AlertEvent) -> Result<()> {
            self.0
                .lock()
                .map_err(|e| anyhow::anyhow!("{e}"))?
                .push(event.module_id.clone());
            Ok(())
        }
    }

    fn immediate(status: &str) -> DetectorConfig {
        DetectorConfig::new([status], Duration::ZERO, Duration::from_secs(60))
    }

    fn frame(index: u64) -> Frame {
        Frame::new(index, image::RgbImage::new(4, 4))
    }

    fn secs(s: u64) -> Timestamp {
        Timestamp::at(Duration::from_secs(s))
    }

    struct VecSource(Vec<Result<TimedFrame>>);

    impl FrameSource for VecSource {
        fn frames(&mut self) -> Box<dyn Iterator<Item = Result<TimedFrame>> + Send + '_> {
            Box::new(self.0.drain(..))
        }

        fn count_hint(&self) -> Option<usize> {
            Some(self.0.len())
        }
    }

    #[test]
    fn test_results_in_registration_order() {
        let mut orchestrator = Orchestrator::builder()
            .register(Constant { id: "b", status: "normal" }, immediate("anomaly"))
            .register(Constant { id: "a", status: "normal" }, immediate("anomaly"))
            .build()
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(orchestrator.module_ids(), vec!["b", "a"]);
        let report = orchestrator.process_frame(&frame(0), &secs(0));
        let ids: Vec<_> = report.results.iter().map(|r| r.module_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(report.alerts.is_empty());
    }

    #[test]
    fn test_failing_module_is_isolated() {
        let mut orchestrator = Orchestrator::builder()
            .register(AlwaysFails, immediate("anomaly"))
            .register(Constant { id: "door", status: "anomaly" }, immediate("anomaly"))
            .build()
            .unwrap_or_else(|e| panic!("{e}"));

        for index in 0..3 {
            let report = orchestrator.process_frame(&frame(index), &secs(index * 100));
            assert_eq!(report.results.len(), 2);
            assert!(report.results[0].is_error());
            assert!(report.results[0].details.contains("model asset missing"));
            assert_eq!(report.results[1].status, "anomaly");
            // Cooldown is 60s and frames are 100s apart, so each frame alerts.
            assert_eq!(report.alerts.len(), 1);
            assert_eq!(report.alerts[0].module_id, "door");
        }
    }

    #[test]
    fn test_malformed_result_becomes_error() {
        let mut orchestrator = Orchestrator::builder()
            .register(WrongId, immediate("anomaly"))
            .build()
            .unwrap_or_else(|e| panic!("{e}"));

        let report = orchestrator.process_frame(&frame(0), &secs(0));
        assert_eq!(report.results[0].module_id, "honest");
        assert!(report.results[0].is_error());
        assert!(report.results[0].details.contains("impostor"));
    }

    #[test]
    fn test_error_status_can_be_alerting() {
        let mut orchestrator = Orchestrator::builder()
            .register(AlwaysFails, immediate("error"))
            .build()
            .unwrap_or_else(|e| panic!("{e}"));

        let report = orchestrator.process_frame(&frame(0), &secs(0));
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].status, "error");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Orchestrator::builder()
            .register(Constant { id: "x", status: "normal" }, immediate("anomaly"))
            .register(Constant { id: "x", status: "normal" }, immediate("anomaly"))
            .build();
        assert!(err.is_err_and(|e| e.to_string().contains("more than once")));
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = Orchestrator::builder()
            .register(Constant { id: " ", status: "normal" }, immediate("anomaly"))
            .build();
        assert!(err.is_err_and(|e| e.to_string().contains("must not be empty")));
    }

    #[test]
    fn test_alerts_reach_sinks() {
        let sink = Arc::new(Collect(Mutex::new(Vec::new())));

        struct Shared(Arc<Collect>);
        impl AlertSink for Shared {
            fn name(&self) -> &str {
                "shared"
            }
            fn notify(&self, event: &AlertEvent) -> Result<()> {
                self.0.notify(event)
            }
        }

        let mut orchestrator = Orchestrator::builder()
            .register(Constant { id: "a", status: "anomaly" }, immediate("anomaly"))
            .register(Constant { id: "b", status: "anomaly" }, immediate("anomaly"))
            .sink(Shared(Arc::clone(&sink)))
            .build()
            .unwrap_or_else(|e| panic!("{e}"));

        orchestrator.process_frame(&frame(0), &secs(0));
        let delivered = sink.0.lock().map(|v| v.clone()).unwrap_or_default();
        assert_eq!(delivered, vec!["a", "b"]);
    }

    #[test]
    fn test_state_is_per_module() {
        let mut orchestrator = Orchestrator::builder()
            .register(Constant { id: "a", status: "anomaly" }, immediate("anomaly"))
            .register(Constant { id: "b", status: "normal" }, immediate("anomaly"))
            .build()
            .unwrap_or_else(|e| panic!("{e}"));

        orchestrator.process_frame(&frame(0), &secs(0));
        assert!(orchestrator.state("a").is_some_and(AlertState::is_active));
        assert!(orchestrator.state("b").is_some_and(|s| !s.is_active()));
        assert!(orchestrator.state("missing").is_none());
    }

    #[test]
    fn test_run_counts_and_skips() {
        let mut orchestrator = Orchestrator::builder()
            .register(Constant { id: "a", status: "anomaly" }, immediate("anomaly"))
            .register(AlwaysFails, immediate("anomaly"))
            .build()
            .unwrap_or_else(|e| panic!("{e}"));

        let mut source = VecSource(vec![
            Ok(TimedFrame { frame: frame(0), timestamp: secs(0) }),
            Err(anyhow::anyhow!("corrupt file")),
            Ok(TimedFrame { frame: frame(2), timestamp: secs(1) }),
        ]);

        let summary = orchestrator.run(&mut source, &NoopObserver, &StopHandle::new());
        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.frames_skipped, 1);
        assert_eq!(summary.alerts_fired, 1);
        assert_eq!(summary.module_errors, 2);
        assert!(!summary.cancelled);
    }

    #[test]
    fn test_run_stops_before_first_frame() {
        let mut orchestrator = Orchestrator::builder()
            .register(Constant { id: "a", status: "anomaly" }, immediate("anomaly"))
            .build()
            .unwrap_or_else(|e| panic!("{e}"));

        let stop = StopHandle::new();
        stop.stop();
        let mut source = VecSource(vec![Ok(TimedFrame { frame: frame(0), timestamp: secs(0) })]);

        let summary = orchestrator.run(&mut source, &NoopObserver, &stop);
        assert!(summary.cancelled);
        assert_eq!(summary.frames_processed, 0);
        assert!(orchestrator.state("a").is_some_and(|s| !s.is_active()));
    }

    #[test]
    fn test_parallel_mode_matches_sequential() {
        let build = |mode| {
            Orchestrator::builder()
                .register(Constant { id: "a", status: "anomaly" }, immediate("anomaly"))
                .register(AlwaysFails, immediate("anomaly"))
                .register(Constant { id: "c", status: "normal" }, immediate("anomaly"))
                .mode(mode)
                .build()
                .unwrap_or_else(|e| panic!("{e}"))
        };

        let mut sequential = build(InvocationMode::Sequential);
        let mut parallel = build(InvocationMode::Parallel {
            timeout: Duration::from_secs(5),
        });
        assert_eq!(sequential.mode(), InvocationMode::Sequential);
        assert!(matches!(parallel.mode(), InvocationMode::Parallel { .. }));

        for index in 0..3 {
            let a = sequential.process_frame(&frame(index), &secs(index));
            let b = parallel.process_frame(&frame(index), &secs(index));
            assert_eq!(a.results, b.results);
            assert_eq!(a.alerts, b.alerts);
        }
    }

    #[test]
    fn test_slow_module_does_not_build_a_backlog() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::builder()
            .register(StallsOnce { seen: Arc::clone(&seen) }, immediate("anomaly"))
            .register(Constant { id: "fast", status: "normal" }, immediate("anomaly"))
            .mode(InvocationMode::Parallel {
                timeout: Duration::from_millis(20),
            })
            .build()
            .unwrap_or_else(|e| panic!("{e}"));

        // Frame 0 times out; frames 1-9 arrive while the module is still busy.
        for index in 0..10 {
            let report = orchestrator.process_frame(&frame(index), &secs(index));
            assert!(report.results[0].is_error());
            assert_eq!(report.results[1].status, "normal");
        }

        std::thread::sleep(Duration::from_millis(300));
        let report = orchestrator.process_frame(&frame(10), &secs(10));
        assert_eq!(report.results[0].status, "normal");
        assert_eq!(report.results[0].details, "frame 10");

        // Frames refused while busy never reached the detector.
        let seen = seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        assert_eq!(seen, vec![0, 10]);
    }
}
