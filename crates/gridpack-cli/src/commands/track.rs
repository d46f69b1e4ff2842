use crate::cli::TrackArgs;
use crate::config::builder::cutoff_from_minutes;
use crate::config::defaults::DefaultsConfig;
use crate::error::Result;
use gridpack_core::engine::error::EngineError;
use gridpack_core::engine::tracker::{
    JobKind, JobTracker, TrackerConfig, classify::Cutoffs, snapshot::JobFilters,
};
use std::fmt::Write as _;
use tracing::{info, warn};

pub fn tracker_config(args: &TrackArgs) -> Result<TrackerConfig> {
    let defaults = DefaultsConfig::default();
    let filters = JobFilters::new(&args.processes, &args.tags, &args.runs)
        .map_err(|e| EngineError::Tracker(e.into()))?;

    Ok(TrackerConfig {
        dir: args.dir.clone(),
        arch: args.arch.clone(),
        release: args.release.clone(),
        filters,
        cutoffs: Cutoffs {
            integrate: args
                .integrate_cutoff
                .map_or(Some(defaults.integrate_cutoff), cutoff_from_minutes),
            stuck: args.stuck_cutoff.and_then(cutoff_from_minutes),
            tarball: args
                .tarball_cutoff
                .map_or(Some(defaults.tarball_cutoff), cutoff_from_minutes),
        },
    })
}

/// One line per problem found in the logs of finished jobs.
pub fn failure_report(tracker: &JobTracker) -> String {
    let mut out = String::new();
    for job in tracker.failed_jobs() {
        if tracker.log_has_error(&job) {
            let _ = writeln!(out, "Finished Job {} has error!", job);
        }
        if !tracker.log_has_xsec(&job) {
            let _ = writeln!(out, "Finished Job {} is missing xsec!", job);
        }
    }
    out
}

pub async fn run(args: TrackArgs) -> Result<()> {
    let config = tracker_config(&args)?;
    info!("Scanning {:?} for gridpack jobs", &config.dir);

    let mut tracker = JobTracker::new(config);
    tracker.update().map_err(EngineError::from)?;

    println!("{}", tracker.show_jobs(&JobKind::ALL));
    if let Some(lines) = args.lines {
        println!("{}", tracker.check_progress(lines).map_err(EngineError::from)?);
    }

    let failures = failure_report(&tracker);
    if !failures.is_empty() {
        warn!("{} finished job(s) failed", tracker.failed_jobs().len());
        print!("{}", failures);
    }
    Ok(())
}
