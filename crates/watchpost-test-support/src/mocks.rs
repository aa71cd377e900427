//! Mock implementations of core port traits.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use watchpost_core::{
    AlertEvent, AlertSink, ClassificationResult, Detector, Frame, FrameSource, PipelineEvent,
    PipelineObserver, RunSummary, TimedFrame, Timestamp,
};

/// One entry of a [`MockFrameSource`].
#[derive(Debug, Clone)]
enum Slot {
    Frame(TimedFrame),
    Broken(String),
}

/// Mock implementation of `FrameSource` for testing.
///
/// Yields pre-built frames, optionally interleaved with load failures, and
/// tracks iteration for assertions.
pub struct MockFrameSource {
    slots: Vec<Slot>,
    iteration_count: Arc<Mutex<usize>>,
}

impl MockFrameSource {
    /// Creates a new mock source with the given frames.
    #[must_use]
    pub fn new(frames: Vec<TimedFrame>) -> Self {
        Self {
            slots: frames.into_iter().map(Slot::Frame).collect(),
            iteration_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates an empty mock source.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(vec![])
    }

    /// Appends a frame that fails to load.
    #[must_use]
    pub fn with_broken(mut self, reason: impl Into<String>) -> Self {
        self.slots.push(Slot::Broken(reason.into()));
        self
    }

    /// Appends a frame.
    #[must_use]
    pub fn with_frame(mut self, frame: TimedFrame) -> Self {
        self.slots.push(Slot::Frame(frame));
        self
    }

    /// Returns the number of times the source has been iterated.
    #[must_use]
    pub fn iteration_count(&self) -> usize {
        *self
            .iteration_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameSource for MockFrameSource {
    fn frames(&mut self) -> Box<dyn Iterator<Item = anyhow::Result<TimedFrame>> + Send + '_> {
        if let Ok(mut c) = self.iteration_count.lock() {
            *c += 1;
        }
        Box::new(self.slots.iter().cloned().map(|slot| match slot {
            Slot::Frame(frame) => Ok(frame),
            Slot::Broken(reason) => Err(anyhow::anyhow!(reason)),
        }))
    }

    fn count_hint(&self) -> Option<usize> {
        Some(self.slots.len())
    }
}

/// Detector that replays a script of statuses.
///
/// Once the script runs out the last status repeats. Frame indices seen are
/// recorded for assertions.
pub struct ScriptedDetector {
    id: String,
    script: Vec<String>,
    cursor: usize,
    seen: Arc<Mutex<Vec<u64>>>,
}

impl ScriptedDetector {
    /// Creates a detector that reports `script` in order.
    #[must_use]
    pub fn new<S: Into<String>>(id: &str, script: impl IntoIterator<Item = S>) -> Self {
        Self {
            id: id.to_string(),
            script: script.into_iter().map(Into::into).collect(),
            cursor: 0,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a detector that always reports `status`.
    #[must_use]
    pub fn constant(id: &str, status: &str) -> Self {
        Self::new(id, [status])
    }

    /// Shared handle to the frame indices this detector has classified.
    #[must_use]
    pub fn seen(&self) -> Arc<Mutex<Vec<u64>>> {
        Arc::clone(&self.seen)
    }
}

impl Detector for ScriptedDetector {
    fn id(&self) -> &str {
        &self.id
    }

    fn classify(&mut self, frame: &Frame, _timestamp: &Timestamp) -> anyhow::Result<ClassificationResult> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.index);

        let status = self
            .script
            .get(self.cursor)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_default();
        self.cursor += 1;
        Ok(ClassificationResult::new(&self.id, status, 1.0, format!("frame {}", frame.index)))
    }
}

/// Detector whose every call fails.
pub struct FailingDetector {
    id: String,
    message: String,
}

impl FailingDetector {
    /// Creates a detector that fails with `message`.
    #[must_use]
    pub fn new(id: &str, message: &str) -> Self {
        Self {
            id: id.to_string(),
            message: message.to_string(),
        }
    }
}

impl Detector for FailingDetector {
    fn id(&self) -> &str {
        &self.id
    }

    fn classify(&mut self, _frame: &Frame, _timestamp: &Timestamp) -> anyhow::Result<ClassificationResult> {
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// Detector whose every call panics.
pub struct PanickingDetector {
    id: String,
}

impl PanickingDetector {
    /// Creates a panicking detector.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl Detector for PanickingDetector {
    fn id(&self) -> &str {
        &self.id
    }

    #[allow(clippy::panic)]
    fn classify(&mut self, frame: &Frame, _timestamp: &Timestamp) -> anyhow::Result<ClassificationResult> {
        panic!("{} blew up on frame {}", self.id, frame.index)
    }
}

/// Detector that sleeps before answering.
pub struct SlowDetector {
    id: String,
    delay: Duration,
    status: String,
}

impl SlowDetector {
    /// Creates a detector that reports `status` after `delay`.
    #[must_use]
    pub fn new(id: &str, delay: Duration, status: &str) -> Self {
        Self {
            id: id.to_string(),
            delay,
            status: status.to_string(),
        }
    }
}

impl Detector for SlowDetector {
    fn id(&self) -> &str {
        &self.id
    }

    fn classify(&mut self, _frame: &Frame, _timestamp: &Timestamp) -> anyhow::Result<ClassificationResult> {
        thread::sleep(self.delay);
        Ok(ClassificationResult::new(&self.id, &self.status, 1.0, ""))
    }
}

/// Mock implementation of `AlertSink` that captures every alert.
///
/// Clones share the captured alerts.
#[derive(Clone)]
pub struct RecordingSink {
    name: String,
    events: Arc<Mutex<Vec<AlertEvent>>>,
}

impl RecordingSink {
    /// Creates a new recording sink.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns all captured alerts.
    #[must_use]
    pub fn events(&self) -> Vec<AlertEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the elapsed seconds of every captured alert for `module`.
    #[must_use]
    pub fn fire_times(&self, module: &str) -> Vec<f64> {
        self.events()
            .iter()
            .filter(|e| e.module_id == module)
            .map(|e| e.timestamp.as_secs_f64())
            .collect()
    }
}

impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, event: &AlertEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

/// Sink whose every delivery fails.
pub struct FailingSink {
    name: String,
}

impl FailingSink {
    /// Creates a failing sink.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl AlertSink for FailingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, _event: &AlertEvent) -> anyhow::Result<()> {
        anyhow::bail!("{} is unreachable", self.name)
    }
}

/// Mock implementation of `PipelineObserver` for testing.
///
/// Captures events for later assertions.
#[derive(Default)]
pub struct MockObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MockObserver {
    /// Creates a new mock observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of `FrameProcessed` events.
    #[must_use]
    pub fn processed_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::FrameProcessed { .. }))
            .count()
    }

    /// Returns the number of `FrameSkipped` events.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::FrameSkipped { .. }))
            .count()
    }

    /// Returns the summary from the `Finished` event, if any.
    #[must_use]
    pub fn summary(&self) -> Option<RunSummary> {
        self.events().iter().find_map(|e| match e {
            PipelineEvent::Finished { summary } => Some(*summary),
            _ => None,
        })
    }
}

impl PipelineObserver for MockObserver {
    fn on_event(&self, event: PipelineEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::SyntheticFrameBuilder;

    fn frame(index: u64) -> Frame {
        Frame::new(index, image::RgbImage::new(1, 1))
    }

    #[test]
    fn test_mock_frame_source() {
        let frames = SyntheticFrameBuilder::timed(SyntheticFrameBuilder::still_sequence(2, 4, 4), 1.0);
        let mut source = MockFrameSource::new(frames).with_broken("truncated file");

        assert_eq!(source.count_hint(), Some(3));
        let items: Vec<_> = source.frames().collect();
        assert!(items[0].is_ok());
        assert!(items[1].is_ok());
        assert!(items[2].as_ref().is_err_and(|e| e.to_string() == "truncated file"));
        assert_eq!(source.iteration_count(), 1);
        assert_eq!(MockFrameSource::empty().count_hint(), Some(0));
    }

    #[test]
    fn test_scripted_detector_repeats_last() {
        let mut detector = ScriptedDetector::new("s", ["normal", "anomaly"]);
        let ts = Timestamp::default();
        let statuses: Vec<_> = (0..4)
            .map(|i| detector.classify(&frame(i), &ts).unwrap().status)
            .collect();
        assert_eq!(statuses, vec!["normal", "anomaly", "anomaly", "anomaly"]);
        assert_eq!(*detector.seen().lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_failing_detector() {
        let mut detector = FailingDetector::new("f", "no model");
        let err = detector.classify(&frame(0), &Timestamp::default()).unwrap_err();
        assert_eq!(err.to_string(), "no model");
    }

    #[test]
    fn test_recording_sink_clones_share_events() {
        let sink = RecordingSink::new("rec");
        let handle = sink.clone();
        let result = ClassificationResult::new("m", "anomaly", 1.0, "");
        sink.notify(&AlertEvent::from_result(
            &result,
            &Timestamp::at(Duration::from_secs(4)),
            Duration::ZERO,
        ))
        .unwrap();

        assert_eq!(handle.events().len(), 1);
        assert_eq!(handle.fire_times("m"), vec![4.0]);
        assert!(FailingSink::new("x").notify(&handle.events()[0]).is_err());
    }

    #[test]
    fn test_mock_observer() {
        let observer = MockObserver::new();
        observer.on_event(PipelineEvent::FrameSkipped {
            index: 0,
            reason: "bad".into(),
        });
        observer.on_event(PipelineEvent::Finished {
            summary: RunSummary::default(),
        });

        assert_eq!(observer.skipped_count(), 1);
        assert_eq!(observer.processed_count(), 0);
        assert_eq!(observer.summary(), Some(RunSummary::default()));
    }
}
