//! # Job Tracker
//!
//! Classifies gridpack jobs into phases from nothing but the files they leave
//! behind in the working directory.
//!
//! ## Overview
//!
//! - [`snapshot`] walks the directory once per update and records, for every job
//!   discovered through its scan-points file, the modification times of its
//!   artifacts and the signatures found in its log.
//! - [`classify`] turns a snapshot into disjoint phase sets without touching the
//!   file system.
//! - [`JobTracker`] keeps the latest result, the per-job resubmission counters,
//!   and renders the status reports.

pub mod classify;
pub mod snapshot;

use crate::engine::naming::JobId;
use chrono::{DateTime, Local};
use classify::{Cutoffs, JobArtifacts, TrackerState, age, integrate_time, partition, time_between};
use snapshot::{DirectorySnapshot, JobFilters};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid job filter pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, Default)]
pub struct TrackerConfig {
    /// Directory holding scan-points files, logs and tarballs.
    pub dir: PathBuf,
    pub arch: String,
    pub release: String,
    pub filters: JobFilters,
    pub cutoffs: Cutoffs,
}

/// Job lists that [`JobTracker::show_jobs`] can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Running,
    CodeGen,
    Integrate,
    IntegrateFiltered,
    Stuck,
    Finished,
}

impl JobKind {
    pub const ALL: [JobKind; 6] = [
        JobKind::Running,
        JobKind::CodeGen,
        JobKind::Integrate,
        JobKind::IntegrateFiltered,
        JobKind::Stuck,
        JobKind::Finished,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Running => "Running",
            JobKind::CodeGen => "CodeGen",
            JobKind::Integrate => "Integrate",
            JobKind::IntegrateFiltered => "Integrate(f)",
            JobKind::Stuck => "Stuck",
            JobKind::Finished => "Finished",
        }
    }
}

/// Splits a duration into whole hours, minutes and seconds.
pub fn format_time(duration: Duration) -> (u64, u64, u64) {
    let secs = duration.as_secs();
    (secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// `[HH:MM:SS]` rendering of a duration.
pub fn format_hms(duration: Duration) -> String {
    let (h, m, s) = format_time(duration);
    format!("[{:02}:{:02}:{:02}]", h, m, s)
}

pub struct JobTracker {
    config: TrackerConfig,
    snapshot: DirectorySnapshot,
    state: TrackerState,
    resubmits: BTreeMap<JobId, u32>,
    last_update: Option<SystemTime>,
    use_cached_update: bool,
}

impl JobTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            snapshot: DirectorySnapshot::default(),
            state: TrackerState::default(),
            resubmits: BTreeMap::new(),
            last_update: None,
            use_cached_update: false,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn set_cutoffs(&mut self, cutoffs: Cutoffs) {
        self.config.cutoffs = cutoffs;
    }

    /// When set, the job-list accessors reuse the last update instead of rescanning.
    pub fn set_use_cached_update(&mut self, cached: bool) {
        self.use_cached_update = cached;
    }

    /// Rescans the directory and recomputes every phase set.
    #[instrument(skip_all, name = "tracker_update")]
    pub fn update(&mut self) -> Result<&TrackerState, TrackerError> {
        let cfg = &self.config;
        self.snapshot = DirectorySnapshot::capture(&cfg.dir, &cfg.arch, &cfg.release, &cfg.filters)?;
        self.state = partition(&self.snapshot.jobs, self.snapshot.taken_at, &cfg.cutoffs);
        self.last_update = Some(self.snapshot.taken_at);
        debug!(
            jobs = self.state.jobs.len(),
            running = self.state.running.len(),
            codegen = self.state.codegen.len(),
            integrate = self.state.integrate.len(),
            finished = self.state.finished.len(),
            "Tracker updated"
        );
        Ok(&self.state)
    }

    /// Phase sets of the last update.
    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn last_update(&self) -> Option<SystemTime> {
        self.last_update
    }

    fn current(&mut self) -> Result<&TrackerState, TrackerError> {
        if !self.use_cached_update || self.last_update.is_none() {
            self.update()?;
        }
        Ok(&self.state)
    }

    pub fn jobs(&mut self) -> Result<Vec<JobId>, TrackerError> {
        Ok(self.current()?.jobs.iter().cloned().collect())
    }

    pub fn running_jobs(&mut self) -> Result<Vec<JobId>, TrackerError> {
        Ok(self.current()?.running.iter().cloned().collect())
    }

    pub fn codegen_jobs(&mut self) -> Result<Vec<JobId>, TrackerError> {
        Ok(self.current()?.codegen.iter().cloned().collect())
    }

    /// Integrating jobs; with `filtered`, only those within the integrate cutoff.
    pub fn integrate_jobs(&mut self, filtered: bool) -> Result<Vec<JobId>, TrackerError> {
        let state = self.current()?;
        let set = if filtered { &state.integrate_filtered } else { &state.integrate };
        Ok(set.iter().cloned().collect())
    }

    pub fn stuck_jobs(&mut self) -> Result<Vec<JobId>, TrackerError> {
        Ok(self.current()?.stuck.iter().cloned().collect())
    }

    pub fn finished_jobs(&mut self) -> Result<Vec<JobId>, TrackerError> {
        Ok(self.current()?.finished.iter().cloned().collect())
    }

    fn artifacts(&self, job: &JobId) -> Option<&JobArtifacts> {
        self.snapshot.get(job)
    }

    /// Time since the tarball was last written, zero if there is none.
    pub fn tarball_time(&self, job: &JobId) -> Duration {
        self.artifacts(job)
            .and_then(|a| a.tarball)
            .map(|t| age(self.snapshot.taken_at, t))
            .unwrap_or(Duration::ZERO)
    }

    pub fn integrate_time(&self, job: &JobId) -> Duration {
        self.artifacts(job).map(integrate_time).unwrap_or(Duration::ZERO)
    }

    /// Time spent generating code: ongoing age while in codegen, otherwise the
    /// distance between the scan-points file and the codegen log.
    pub fn codegen_time(&self, job: &JobId) -> Duration {
        let Some(a) = self.artifacts(job) else {
            return Duration::ZERO;
        };
        let now = self.snapshot.taken_at;
        match (self.state.codegen.contains(job), a.scanpoints, a.codegen_log) {
            (true, Some(scan), _) => age(now, scan),
            (false, Some(scan), Some(codegen)) => time_between(codegen, scan),
            _ => Duration::ZERO,
        }
    }

    /// Time since the log was last written, zero if there is no log.
    pub fn time_since_last_log(&self, job: &JobId) -> Duration {
        self.artifacts(job)
            .and_then(|a| a.log)
            .map(|t| age(self.snapshot.taken_at, t))
            .unwrap_or(Duration::ZERO)
    }

    pub fn log_has_error(&self, job: &JobId) -> bool {
        self.artifacts(job).is_some_and(|a| a.signals.error)
    }

    pub fn log_has_xsec(&self, job: &JobId) -> bool {
        self.artifacts(job).is_some_and(|a| a.signals.xsec)
    }

    /// Finished jobs whose log reports an error or lacks a cross section.
    pub fn failed_jobs(&self) -> Vec<JobId> {
        self.state
            .finished
            .iter()
            .filter(|job| self.log_has_error(job) || !self.log_has_xsec(job))
            .cloned()
            .collect()
    }

    pub fn add_resubmit(&mut self, job: &JobId) {
        *self.resubmits.entry(job.clone()).or_insert(0) += 1;
    }

    pub fn resubmit_count(&self, job: &JobId) -> u32 {
        self.resubmits.get(job).copied().unwrap_or(0)
    }

    fn list(&self, kind: JobKind) -> Vec<&JobId> {
        let set = match kind {
            JobKind::Running => &self.state.running,
            JobKind::CodeGen => &self.state.codegen,
            JobKind::Integrate => &self.state.integrate,
            JobKind::IntegrateFiltered => &self.state.integrate_filtered,
            JobKind::Stuck => &self.state.stuck,
            JobKind::Finished => &self.state.finished,
        };
        set.iter().collect()
    }

    /// Status report of the last update: timestamp, resubmissions and the requested job lists.
    pub fn show_jobs(&self, kinds: &[JobKind]) -> String {
        let mut out = String::new();
        let stamp = self
            .last_update
            .map(|t| DateTime::<Local>::from(t).format("%Y/%m/%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        let _ = writeln!(out, "Last Update: {}", stamp);

        if !self.resubmits.is_empty() {
            let _ = writeln!(out, "Resubmitted Jobs: {}", self.resubmits.len());
            for (job, count) in &self.resubmits {
                let _ = writeln!(out, "\t{}: {}", job, count);
            }
        }

        for kind in kinds {
            let jobs = self.list(*kind);
            let _ = writeln!(out, "{} Jobs: {}", kind.label(), jobs.len());
            for job in jobs {
                let _ = writeln!(out, "\t{}", job);
            }
        }
        out
    }

    /// Progress of every integrating job, shortest integration first, with the
    /// last `lines` lines of its log.
    pub fn check_progress(&self, lines: usize) -> Result<String, TrackerError> {
        let now = self.snapshot.taken_at;
        let mut jobs: Vec<(&JobId, Duration)> = self
            .state
            .integrate
            .iter()
            .map(|job| (job, self.integrate_time(job)))
            .collect();
        jobs.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        let mut out = String::new();
        for (job, integrate) in jobs {
            let total = self
                .artifacts(job)
                .and_then(|a| a.scanpoints)
                .map(|t| age(now, t))
                .unwrap_or(Duration::ZERO);
            let _ = writeln!(
                out,
                "Checking: {} {} {} {}",
                job,
                format_hms(total),
                format_hms(integrate),
                format_hms(self.time_since_last_log(job))
            );
            for line in self.tail_log(job, lines)? {
                let _ = writeln!(out, "\t{}", line);
            }
        }
        Ok(out)
    }

    fn tail_log(&self, job: &JobId, lines: usize) -> Result<Vec<String>, TrackerError> {
        if lines == 0 {
            return Ok(Vec::new());
        }
        let path = self.config.dir.join(job.log_file());
        let text = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(TrackerError::Io { path, source }),
        };
        let all: Vec<&str> = text.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].iter().map(|l| l.to_string()).collect())
    }
}
