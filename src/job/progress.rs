// Percentage reporting out of the pipeline. The library never prints;
// binaries decide how to surface progress.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f64, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _percent: f64, _message: &str) {}
}

// Rescales a stage's local 0..100 range into its slice of the whole job.
pub struct StageProgress<'a> {
    sink: &'a dyn ProgressSink,
    start: f64,
    span: f64,
}

impl<'a> StageProgress<'a> {
    pub fn new(sink: &'a dyn ProgressSink, start: f64, span: f64) -> Self {
        StageProgress { sink, start, span }
    }
}

impl ProgressSink for StageProgress<'_> {
    fn report(&self, percent: f64, message: &str) {
        let clamped = percent.clamp(0.0, 100.0);
        self.sink.report(self.start + self.span * clamped / 100.0, message);
    }
}
