use crate::engine::naming::JobId;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, SystemTime};

/// What the tracker found in a job's log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSignals {
    /// The code generation failed hard: the log reports the output directory as missing.
    pub output_dir_missing: bool,
    pub error: bool,
    pub xsec: bool,
}

/// File-system facts about a single job, gathered once per update.
///
/// Timestamps are modification times; `None` means the file does not exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobArtifacts {
    pub scanpoints: Option<SystemTime>,
    pub log: Option<SystemTime>,
    pub codegen_log: Option<SystemTime>,
    pub tarball: Option<SystemTime>,
    /// Input tarball or codegen submission files are still present.
    pub codegen_inputs: bool,
    pub signals: LogSignals,
}

/// Time thresholds applied during classification. `None` disables the check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cutoffs {
    /// Integrating jobs running longer than this are left out of the filtered view.
    pub integrate: Option<Duration>,
    /// Running jobs whose log has been silent longer than this are stuck.
    pub stuck: Option<Duration>,
    /// A tarball only counts once it has been untouched this long.
    pub tarball: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Tarball,
    OutputDirectoryMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    CodeGen,
    Integrate { elapsed: Duration },
    Finished(FinishReason),
}

/// Disjoint phase sets of one update. `running` is `jobs - finished`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    pub jobs: BTreeSet<JobId>,
    pub running: BTreeSet<JobId>,
    pub codegen: BTreeSet<JobId>,
    pub integrate: BTreeSet<JobId>,
    /// `integrate` minus jobs over the integrate cutoff.
    pub integrate_filtered: BTreeSet<JobId>,
    pub stuck: BTreeSet<JobId>,
    pub finished: BTreeSet<JobId>,
}

/// Time elapsed from `then` to `now`, zero if `then` lies in the future.
pub fn age(now: SystemTime, then: SystemTime) -> Duration {
    now.duration_since(then).unwrap_or(Duration::ZERO)
}

/// Absolute distance between two timestamps.
pub fn time_between(a: SystemTime, b: SystemTime) -> Duration {
    a.duration_since(b)
        .or_else(|_| b.duration_since(a))
        .unwrap_or(Duration::ZERO)
}

/// Time spent integrating: distance between the codegen log and the main log.
pub fn integrate_time(artifacts: &JobArtifacts) -> Duration {
    match (artifacts.log, artifacts.codegen_log) {
        (Some(log), Some(codegen)) => time_between(log, codegen),
        _ => Duration::ZERO,
    }
}

fn exceeds(value: Duration, cutoff: Option<Duration>) -> bool {
    cutoff.is_none_or(|c| value > c)
}

/// Assigns a job to exactly one phase.
pub fn classify(artifacts: &JobArtifacts, now: SystemTime, cutoffs: &Cutoffs) -> JobPhase {
    if artifacts.signals.output_dir_missing {
        return JobPhase::Finished(FinishReason::OutputDirectoryMissing);
    }
    if artifacts
        .tarball
        .is_some_and(|tarball| exceeds(age(now, tarball), cutoffs.tarball))
    {
        return JobPhase::Finished(FinishReason::Tarball);
    }
    if artifacts.log.is_none() || artifacts.codegen_inputs {
        return JobPhase::CodeGen;
    }
    JobPhase::Integrate {
        elapsed: integrate_time(artifacts),
    }
}

/// True if a running job's log has been silent for longer than the stuck cutoff.
pub fn is_stuck(artifacts: &JobArtifacts, now: SystemTime, cutoffs: &Cutoffs) -> bool {
    match (cutoffs.stuck, artifacts.log) {
        (Some(cutoff), Some(log)) => age(now, log) > cutoff,
        _ => false,
    }
}

/// Classifies every job of a snapshot into the phase sets.
pub fn partition(
    jobs: &BTreeMap<JobId, JobArtifacts>,
    now: SystemTime,
    cutoffs: &Cutoffs,
) -> TrackerState {
    let mut state = TrackerState::default();
    for (id, artifacts) in jobs {
        state.jobs.insert(id.clone());
        match classify(artifacts, now, cutoffs) {
            JobPhase::Finished(_) => {
                state.finished.insert(id.clone());
                continue;
            }
            JobPhase::CodeGen => {
                state.codegen.insert(id.clone());
            }
            JobPhase::Integrate { elapsed } => {
                state.integrate.insert(id.clone());
                if cutoffs.integrate.is_none_or(|c| elapsed <= c) {
                    state.integrate_filtered.insert(id.clone());
                }
            }
        }
        state.running.insert(id.clone());
        if is_stuck(artifacts, now, cutoffs) {
            state.stuck.insert(id.clone());
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_secs(60);

    fn t(minutes: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + MIN * minutes as u32
    }

    fn id(tag: &str) -> JobId {
        JobId::new("ttH", tag, 0)
    }

    fn integrating(log: u64, codegen_log: u64) -> JobArtifacts {
        JobArtifacts {
            scanpoints: Some(t(0)),
            log: Some(t(log)),
            codegen_log: Some(t(codegen_log)),
            ..JobArtifacts::default()
        }
    }

    #[test]
    fn log_without_tarball_or_codegen_inputs_is_integrate() {
        let artifacts = JobArtifacts {
            scanpoints: Some(t(0)),
            log: Some(t(10)),
            ..JobArtifacts::default()
        };
        let phase = classify(&artifacts, t(20), &Cutoffs::default());
        assert_eq!(phase, JobPhase::Integrate { elapsed: Duration::ZERO });
    }

    #[test]
    fn missing_log_or_codegen_inputs_is_codegen() {
        let no_log = JobArtifacts {
            scanpoints: Some(t(0)),
            ..JobArtifacts::default()
        };
        assert_eq!(classify(&no_log, t(5), &Cutoffs::default()), JobPhase::CodeGen);

        let inputs = JobArtifacts {
            codegen_inputs: true,
            ..integrating(4, 2)
        };
        assert_eq!(classify(&inputs, t(5), &Cutoffs::default()), JobPhase::CodeGen);
    }

    #[test]
    fn fresh_tarball_is_not_finished_until_cutoff() {
        let artifacts = JobArtifacts {
            tarball: Some(t(10)),
            ..integrating(10, 2)
        };
        let cutoffs = Cutoffs {
            tarball: Some(5 * MIN),
            ..Cutoffs::default()
        };
        assert!(matches!(classify(&artifacts, t(12), &cutoffs), JobPhase::Integrate { .. }));
        assert_eq!(
            classify(&artifacts, t(16), &cutoffs),
            JobPhase::Finished(FinishReason::Tarball)
        );
        assert_eq!(
            classify(&artifacts, t(10), &Cutoffs::default()),
            JobPhase::Finished(FinishReason::Tarball)
        );
    }

    #[test]
    fn missing_output_directory_finishes_the_job() {
        let artifacts = JobArtifacts {
            signals: LogSignals {
                output_dir_missing: true,
                ..LogSignals::default()
            },
            ..integrating(3, 1)
        };
        assert_eq!(
            classify(&artifacts, t(5), &Cutoffs::default()),
            JobPhase::Finished(FinishReason::OutputDirectoryMissing)
        );
    }

    #[test]
    fn integrate_time_is_symmetric() {
        assert_eq!(integrate_time(&integrating(30, 10)), 20 * MIN);
        assert_eq!(integrate_time(&integrating(10, 30)), 20 * MIN);
        let no_codegen = JobArtifacts {
            log: Some(t(3)),
            ..JobArtifacts::default()
        };
        assert_eq!(integrate_time(&no_codegen), Duration::ZERO);
    }

    #[test]
    fn partition_is_disjoint_and_covers_all_jobs() {
        let mut jobs = BTreeMap::new();
        jobs.insert(id("CodeGen"), JobArtifacts {
            scanpoints: Some(t(0)),
            ..JobArtifacts::default()
        });
        jobs.insert(id("Short"), integrating(20, 10));
        jobs.insert(id("Long"), integrating(100, 10));
        jobs.insert(id("Quiet"), integrating(30, 10));
        jobs.insert(id("Done"), JobArtifacts {
            tarball: Some(t(50)),
            ..integrating(50, 10)
        });

        let cutoffs = Cutoffs {
            integrate: Some(45 * MIN),
            stuck: Some(60 * MIN),
            tarball: Some(5 * MIN),
        };
        let state = partition(&jobs, t(100), &cutoffs);

        assert_eq!(state.jobs.len(), 5);
        assert_eq!(state.finished, BTreeSet::from([id("Done")]));
        assert_eq!(state.codegen, BTreeSet::from([id("CodeGen")]));
        assert_eq!(state.integrate, BTreeSet::from([id("Short"), id("Long"), id("Quiet")]));
        assert_eq!(state.integrate_filtered, BTreeSet::from([id("Short"), id("Quiet")]));
        assert_eq!(state.stuck, BTreeSet::from([id("Short"), id("Quiet")]));
        assert_eq!(state.running.len(), 4);

        assert!(state.finished.is_disjoint(&state.codegen));
        assert!(state.finished.is_disjoint(&state.integrate));
        assert!(state.codegen.is_disjoint(&state.integrate));
        let union: BTreeSet<_> = state
            .finished
            .iter()
            .chain(&state.codegen)
            .chain(&state.integrate)
            .cloned()
            .collect();
        assert_eq!(union, state.jobs);
    }
}
