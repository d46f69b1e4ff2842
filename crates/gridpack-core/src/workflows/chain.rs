use super::sweep::{SweepPlan, Submitter};
use crate::core::point::ScanPoint;
use crate::core::process::ProcessDefinition;
use crate::engine::config::ScanType;
use crate::engine::error::EngineError;
use crate::engine::gridpack::Gridpack;
use crate::engine::progress::Progress;
use crate::engine::tracker::classify::{Cutoffs, TrackerState};
use crate::engine::tracker::snapshot::JobFilters;
use crate::engine::tracker::{JobKind, JobTracker, TrackerConfig, TrackerError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const MINUTE: Duration = Duration::from_secs(60);
/// Start value of every DoF in throttled full-random sweeps without explicit start points.
const FULL_RANDOM_START: f64 = 4.0;

/// Caps and timings of the throttled submission loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleLimits {
    pub max_codegen: usize,
    /// Counted against the integrate jobs within `integrate_cutoff`.
    pub max_integrate: usize,
    pub max_running: usize,
    pub max_resubmits: u32,
    pub resubmit: bool,
    pub integrate_cutoff: Option<Duration>,
    pub tarball_cutoff: Option<Duration>,
    /// Pause between polling passes.
    pub delay: Duration,
}

impl Default for ThrottleLimits {
    fn default() -> Self {
        Self {
            max_codegen: 5,
            max_integrate: 7,
            max_running: 25,
            max_resubmits: 5,
            resubmit: true,
            integrate_cutoff: Some(45 * MINUTE),
            tarball_cutoff: Some(5 * MINUTE),
            delay: 5 * MINUTE,
        }
    }
}

impl ThrottleLimits {
    /// Free submission slots: the smallest headroom over the three caps, possibly negative.
    pub fn max_submits(&self, state: &TrackerState) -> i64 {
        let headroom = |cap: usize, used: usize| cap as i64 - used as i64;
        headroom(self.max_codegen, state.codegen.len())
            .min(headroom(self.max_integrate, state.integrate_filtered.len()))
            .min(headroom(self.max_running, state.running.len()))
    }

    /// Finished jobs whose tarball is older than this are no longer resubmitted.
    pub fn resubmit_window(&self) -> Duration {
        3 * (self.tarball_cutoff.unwrap_or(Duration::ZERO) + self.delay)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub passes: u64,
    pub submitted: usize,
    pub resubmitted: usize,
}

/// Polls the working directory and keeps submitting until every configuration
/// of the plan has finished, throttled by the tracker's view of running jobs.
pub struct SubmissionLoop<'p> {
    processes: &'p [ProcessDefinition],
    plan: SweepPlan,
    limits: ThrottleLimits,
    tracker: JobTracker,
}

impl<'p> SubmissionLoop<'p> {
    pub fn new(
        processes: &'p [ProcessDefinition],
        plan: &SweepPlan,
        limits: ThrottleLimits,
        gp: &Gridpack,
    ) -> Result<Self, EngineError> {
        let layout = gp.layout();
        let config = TrackerConfig {
            dir: layout.home_dir.clone(),
            arch: layout.arch.clone(),
            release: layout.release.clone(),
            filters: Self::filters(processes, plan)?,
            cutoffs: Cutoffs {
                integrate: limits.integrate_cutoff,
                stuck: None,
                tarball: limits.tarball_cutoff,
            },
        };

        let mut plan = plan.clone();
        if gp.options().scan == ScanType::FullRandom && plan.start_points.is_empty() {
            let start: ScanPoint = plan
                .dofs
                .iter()
                .map(|d| (d.name(), FULL_RANDOM_START))
                .collect();
            plan.start_points = vec![start; plan.runs as usize];
        }

        Ok(Self {
            processes,
            plan,
            limits,
            tracker: JobTracker::new(config),
        })
    }

    fn filters(processes: &[ProcessDefinition], plan: &SweepPlan) -> Result<JobFilters, TrackerError> {
        let names: Vec<String> = processes
            .iter()
            .map(|p| format!("^{}$", regex::escape(p.name())))
            .collect();
        let mut tags = vec![format!("^{}$", regex::escape(&plan.tag))];
        tags.extend(
            plan.dofs
                .iter()
                .map(|d| format!("^{}$", regex::escape(&plan.axis_tag(d)))),
        );
        Ok(JobFilters::new(&names, &tags, &[])?)
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    #[instrument(skip_all, name = "submission_loop")]
    pub fn run(&mut self, gp: &mut Gridpack, submitter: &mut Submitter) -> Result<LoopSummary, EngineError> {
        let mut summary = LoopSummary::default();
        loop {
            summary.passes += 1;
            submitter.reporter().report(Progress::PassStart { pass: summary.passes });

            let state = self.tracker.update()?;
            submitter.reporter().report(Progress::Status {
                running: state.running.len(),
                codegen: state.codegen.len(),
                integrate: state.integrate_filtered.len(),
                finished: state.finished.len(),
            });
            let max_submits = self.limits.max_submits(state);
            info!("{}", self.tracker.show_jobs(&[JobKind::CodeGen, JobKind::IntegrateFiltered]));

            if max_submits <= 0 {
                info!("Submission slots exhausted, waiting");
                submitter.reporter().report(Progress::Throttled);
                self.wait(submitter);
                continue;
            }
            let max_submits = max_submits as usize;

            if self.limits.resubmit {
                summary.resubmitted += self.resubmit_failed(gp, submitter)?;
            }

            let mut submitted = 0;
            for process in self.processes {
                gp.set_process(process)?;
                submitted += submitter.submit_process(gp, &self.plan, max_submits - submitted)?;
                if submitted >= max_submits {
                    break;
                }
            }
            summary.submitted += submitted;

            if submitted == 0 && self.tracker.state().running.is_empty() {
                info!("All configurations finished after {} passes", summary.passes);
                submitter.reporter().report(Progress::Finished);
                return Ok(summary);
            }
            self.wait(submitter);
        }
    }

    fn wait(&self, submitter: &mut Submitter) {
        submitter.reporter().report(Progress::Waiting {
            duration: self.limits.delay,
        });
        submitter.pause(self.limits.delay);
    }

    /// Cleans finished jobs that failed so the next submission pass recreates them.
    fn resubmit_failed(&mut self, gp: &Gridpack, submitter: &Submitter) -> Result<usize, EngineError> {
        let window = self.limits.resubmit_window();
        let mut resubmitted = 0;
        for job in self.tracker.failed_jobs() {
            if self.tracker.tarball_time(&job) > window {
                debug!("{} finished too long ago to resubmit", job);
                continue;
            }
            let retries = self.tracker.resubmit_count(&job);
            if retries >= self.limits.max_resubmits {
                warn!("{} failed {} times, not resubmitting", job, retries);
                continue;
            }
            let Some(process) = self.processes.iter().find(|p| p.name() == job.process) else {
                continue;
            };

            let mut failed = gp.clone();
            failed.set_process(process)?;
            failed.adopt(&job.tag, job.run);
            if !failed.exists() {
                continue;
            }
            info!(
                "Resubmitting {} (error: {}, xsec: {})",
                job,
                self.tracker.log_has_error(&job),
                self.tracker.log_has_xsec(&job)
            );
            failed.clean()?;
            self.tracker.add_resubmit(&job);
            submitter.reporter().report(Progress::Resubmitted { job });
            resubmitted += 1;
        }
        Ok(resubmitted)
    }
}
