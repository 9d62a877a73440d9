use crate::{
    config::ProcessingConfig,
    pipeline::StageRunner,
    traits::{DebugSink, ProgressReporter},
};

/// Builder for [`StageRunner`] with a fluent API
pub struct StageRunnerBuilder<'a> {
    config: &'a ProcessingConfig,
    progress: Option<&'a mut dyn ProgressReporter>,
    debug: Option<&'a mut dyn DebugSink>,
}

impl<'a> StageRunnerBuilder<'a> {
    pub fn new(config: &'a ProcessingConfig) -> Self {
        Self {
            config,
            progress: None,
            debug: None,
        }
    }

    /// Receive `(fraction, label)` before each stage transition
    pub fn progress(mut self, reporter: &'a mut dyn ProgressReporter) -> Self {
        self.progress = Some(reporter);
        self
    }

    /// Collect intermediate images and contour overlays
    pub fn debug_sink(mut self, sink: &'a mut dyn DebugSink) -> Self {
        self.debug = Some(sink);
        self
    }

    pub fn build(self) -> StageRunner<'a> {
        StageRunner::new(self.config, self.progress, self.debug)
    }
}
