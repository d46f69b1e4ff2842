use super::TrackerError;
use super::classify::{JobArtifacts, LogSignals};
use crate::engine::naming::JobId;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;
use std::time::SystemTime;
use tracing::{debug, trace};

static OUTPUT_DIR_MISSING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Process output directory (\S+) not found\.").expect("valid output-dir regex")
});
static LOG_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Error when reading.*").expect("valid log error regex"));
static LOG_XSEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Cross-section : ").expect("valid xsec regex"));

/// Allow-lists applied to the process, tag and run fields of discovered jobs.
///
/// A field passes if any of its patterns matches anywhere in it. An empty list
/// accepts everything.
#[derive(Debug, Clone, Default)]
pub struct JobFilters {
    processes: Vec<Regex>,
    tags: Vec<Regex>,
    runs: Vec<Regex>,
}

impl JobFilters {
    pub fn new<S: AsRef<str>>(processes: &[S], tags: &[S], runs: &[S]) -> Result<Self, regex::Error> {
        fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>, regex::Error> {
            patterns.iter().map(|p| Regex::new(p.as_ref())).collect()
        }
        Ok(Self {
            processes: compile(processes)?,
            tags: compile(tags)?,
            runs: compile(runs)?,
        })
    }

    pub fn matches(&self, job: &JobId) -> bool {
        fn any(patterns: &[Regex], field: &str) -> bool {
            patterns.is_empty() || patterns.iter().any(|re| re.is_match(field))
        }
        any(&self.processes, &job.process) && any(&self.tags, &job.tag) && any(&self.runs, &job.run_field())
    }
}

/// File-system state of every tracked job at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectorySnapshot {
    pub taken_at: SystemTime,
    pub jobs: BTreeMap<JobId, JobArtifacts>,
}

impl Default for DirectorySnapshot {
    fn default() -> Self {
        Self {
            taken_at: SystemTime::UNIX_EPOCH,
            jobs: BTreeMap::new(),
        }
    }
}

impl DirectorySnapshot {
    /// Discovers jobs from the scan-points files in `dir` and records their artifacts.
    pub fn capture(
        dir: &Path,
        arch: &str,
        release: &str,
        filters: &JobFilters,
    ) -> Result<Self, TrackerError> {
        let entries = fs::read_dir(dir).map_err(|source| TrackerError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut jobs = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| TrackerError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let name = entry.file_name();
            let Some(job) = name.to_str().and_then(JobId::from_scanpoints_file) else {
                continue;
            };
            if !filters.matches(&job) {
                trace!("Filtered out {}", job);
                continue;
            }
            let artifacts = collect_artifacts(dir, &job, arch, release)?;
            jobs.insert(job, artifacts);
        }
        debug!("Captured {} jobs in {}", jobs.len(), dir.display());

        Ok(Self {
            taken_at: SystemTime::now(),
            jobs,
        })
    }

    pub fn get(&self, job: &JobId) -> Option<&JobArtifacts> {
        self.jobs.get(job)
    }
}

fn mtime(path: &Path) -> Result<Option<SystemTime>, TrackerError> {
    match fs::metadata(path) {
        Ok(meta) => meta
            .modified()
            .map(Some)
            .map_err(|source| TrackerError::Io {
                path: path.to_path_buf(),
                source,
            }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TrackerError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn collect_artifacts(
    dir: &Path,
    job: &JobId,
    arch: &str,
    release: &str,
) -> Result<JobArtifacts, TrackerError> {
    let log_path = dir.join(job.log_file());
    let log = mtime(&log_path)?;
    let signals = match log {
        Some(_) => read_signals(&log_path, job)?,
        None => LogSignals::default(),
    };
    let codegen_inputs = [
        job.input_tarball_file(),
        job.codegen_script_file(),
        job.codegen_jdl_file(),
    ]
    .iter()
    .any(|f| dir.join(f).exists());

    Ok(JobArtifacts {
        scanpoints: mtime(&dir.join(job.scanpoints_file()))?,
        log,
        codegen_log: mtime(&dir.join(job.codegen_log_file()))?,
        tarball: mtime(&dir.join(job.tarball_file(arch, release)))?,
        codegen_inputs,
        signals,
    })
}

fn read_signals(log_path: &Path, job: &JobId) -> Result<LogSignals, TrackerError> {
    let bytes = fs::read(log_path).map_err(|source| TrackerError::Io {
        path: log_path.to_path_buf(),
        source,
    })?;
    Ok(scan_log(&String::from_utf8_lossy(&bytes), job))
}

/// Searches log text for the failure and success signatures of `job`.
pub fn scan_log(text: &str, job: &JobId) -> LogSignals {
    let setup = job.setup_string();
    LogSignals {
        output_dir_missing: OUTPUT_DIR_MISSING
            .captures_iter(text)
            .any(|c| &c[1] == setup),
        error: LOG_ERROR.is_match(text),
        xsec: LOG_XSEC.is_match(text),
    }
}
