use gridpack_core::engine::progress::{Progress, ProgressCallback};
use gridpack_core::engine::tracker::format_hms;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// Renders submission events as a single spinner with a running tally.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
    tally: Arc<Mutex<Tally>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    submitted: u64,
    skipped: u64,
    resubmitted: u64,
}

impl Tally {
    fn summary(&self) -> String {
        format!(
            "{} submitted, {} skipped, {} resubmitted",
            self.submitted, self.skipped, self.resubmitted
        )
    }
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new_spinner())
    }

    fn with_bar(pb: ProgressBar) -> Self {
        pb.set_style(Self::spinner_style());
        pb.set_message("Initializing...");
        Self {
            pb: Arc::new(Mutex::new(pb)),
            tally: Arc::new(Mutex::new(Tally::default())),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb_clone = self.pb.clone();
        let tally_clone = self.tally.clone();

        Box::new(move |progress: Progress| {
            let (Ok(pb_guard), Ok(mut tally)) = (pb_clone.lock(), tally_clone.lock()) else {
                warn!("Progress state mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PassStart { pass } => {
                    pb_guard.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    pb_guard.set_prefix(format!("pass {}", pass));
                    pb_guard.set_message(tally.summary());
                }
                Progress::Status {
                    running,
                    codegen,
                    integrate,
                    finished,
                } => {
                    pb_guard.set_message(format!(
                        "running {} (codegen {}, integrate {}), finished {} | {}",
                        running,
                        codegen,
                        integrate,
                        finished,
                        tally.summary()
                    ));
                }
                Progress::Throttled => {
                    pb_guard.set_message(format!("throttled | {}", tally.summary()));
                }
                Progress::Submitted { job } => {
                    tally.submitted += 1;
                    pb_guard.println(format!("  submitted {}", job));
                    pb_guard.set_message(tally.summary());
                }
                Progress::Skipped { job } => {
                    tally.skipped += 1;
                    pb_guard.println(format!("  skipped {} (already exists)", job));
                    pb_guard.set_message(tally.summary());
                }
                Progress::Resubmitted { job } => {
                    tally.resubmitted += 1;
                    pb_guard.println(format!("  resubmitting {}", job));
                    pb_guard.set_message(tally.summary());
                }
                Progress::Waiting { duration } => {
                    pb_guard.set_message(format!(
                        "waiting {} | {}",
                        format_hms(duration),
                        tally.summary()
                    ));
                }
                Progress::Finished => {
                    pb_guard.disable_steady_tick();
                    pb_guard.finish_with_message(format!("✓ Done: {}", tally.summary()));
                }
                Progress::Message(msg) => {
                    if !pb_guard.is_finished() {
                        pb_guard.println(format!("  {}", msg));
                    } else {
                        pb_guard.set_message(msg);
                    }
                }
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {msg}")
            .expect("Failed to create spinner style template")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
