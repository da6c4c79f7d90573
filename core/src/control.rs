// core/src/control.rs

/// Signal from a handler indicating whether the pipeline should continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  Continue,
  /// Halt immediately; no further handlers or steps run.
  Stop,
}

/// Outcome of a full pipeline run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  Completed,
  Stopped,
}
