use super::naming::JobId;
use std::time::Duration;

/// Events emitted while a sweep or the submission loop runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PassStart { pass: u64 },
    /// Tracker counts at the start of a pass.
    Status {
        running: usize,
        codegen: usize,
        integrate: usize,
        finished: usize,
    },
    /// No submission slot is free this pass.
    Throttled,
    Submitted { job: JobId },
    Skipped { job: JobId },
    Resubmitted { job: JobId },
    Waiting { duration: Duration },
    Finished,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
