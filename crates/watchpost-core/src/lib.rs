//! Watchpost Core - Debounced alerting over per-frame classifiers
//!
//! This crate contains the domain types, the ports detectors and sinks plug
//! into, the per-module alert state machine, and the orchestrator that pumps
//! frames through them. It does no image processing of its own.

pub mod domain;
pub mod engine;
pub mod ports;

pub use domain::{AlertEvent, ClassificationResult, DetectorConfig, Frame, Timestamp, ERROR_STATUS};
pub use engine::{
    AlertDispatcher, AlertState, DispatchReport, FrameReport, InvocationMode, Orchestrator,
    OrchestratorBuilder, RunSummary, SinkFailure, StopHandle,
};
pub use ports::{
    AlertSink, Detector, FrameSource, NoopObserver, PipelineEvent, PipelineObserver, TimedFrame,
};
