use crate::core::dof::DegreeOfFreedom;
use crate::core::io::limits::LimitsTable;
use crate::core::point::{ScanPoint, round_to_precision};
use crate::core::process::ProcessDefinition;
use crate::engine::command::CommandRunner;
use crate::engine::config::ScanType;
use crate::engine::error::EngineError;
use crate::engine::gridpack::{Gridpack, SetupOutcome};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::sampling::linspace;
use super::pacer::Pacer;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_SUBMIT_DELAY: Duration = Duration::from_secs(10);

/// What to produce for each process of a sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepPlan {
    pub dofs: Vec<DegreeOfFreedom>,
    /// Requested number of reweight points per configuration.
    pub num_pts: usize,
    /// Number of configurations per DoF (axis sweeps) or in total (full sweeps).
    pub runs: u32,
    /// Tag of full, scan-file and start-point configurations.
    pub tag: String,
    /// Appended to the DoF name to form the tag of axis configurations.
    pub tag_postfix: String,
    /// Run indices allowed per DoF in axis sweeps. DoFs without an entry use every index.
    pub run_whitelist: BTreeMap<String, Vec<u32>>,
    /// Start point per run of a full sweep. Runs past the end draw their start values.
    pub start_points: Vec<ScanPoint>,
    /// Scan-points files, one configuration each.
    pub scan_files: Vec<PathBuf>,
}

impl SweepPlan {
    pub fn axis_tag(&self, dof: &DegreeOfFreedom) -> String {
        format!("{}{}", dof.name(), self.tag_postfix)
    }

    fn run_allowed(&self, dof: &DegreeOfFreedom, run: u32) -> bool {
        self.run_whitelist
            .get(dof.name())
            .is_none_or(|runs| runs.contains(&run))
    }
}

fn limit_reached(submitted: usize, max_submits: usize) -> bool {
    max_submits > 0 && submitted >= max_submits
}

/// Configures, materializes and submits jobs on behalf of the sweep helpers.
pub struct Submitter<'a, 'r> {
    runner: &'a dyn CommandRunner,
    pacer: &'a mut dyn Pacer,
    reporter: &'a ProgressReporter<'r>,
    submit_delay: Duration,
}

impl<'a, 'r> Submitter<'a, 'r> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        pacer: &'a mut dyn Pacer,
        reporter: &'a ProgressReporter<'r>,
    ) -> Self {
        Self {
            runner,
            pacer,
            reporter,
            submit_delay: DEFAULT_SUBMIT_DELAY,
        }
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn runner(&self) -> &'a dyn CommandRunner {
        self.runner
    }

    pub fn reporter(&self) -> &'a ProgressReporter<'r> {
        self.reporter
    }

    pub fn pause(&mut self, duration: Duration) {
        self.pacer.pause(duration);
    }

    /// Runs one configuration through configure, setup and submit.
    ///
    /// Returns `true` if the job was handed to the batch backend; existing
    /// configurations are skipped.
    #[allow(clippy::too_many_arguments)]
    fn submit_one(
        &mut self,
        gp: &mut Gridpack,
        tag: &str,
        run: u32,
        dofs: &[DegreeOfFreedom],
        num_pts: usize,
        start_pt: &ScanPoint,
        scan_file: Option<&Path>,
    ) -> Result<bool, EngineError> {
        gp.configure(tag, run, dofs, num_pts, start_pt, scan_file)?;
        if gp.setup()? == SetupOutcome::Skipped {
            self.reporter.report(Progress::Skipped { job: gp.job_id() });
            return Ok(false);
        }
        info!("{}", gp.base_settings());
        let submitted = gp.submit(self.runner)?;
        if submitted {
            self.reporter.report(Progress::Submitted { job: gp.job_id() });
            self.pacer.pause(self.submit_delay);
        }
        Ok(submitted)
    }

    /// One configuration per DoF and run, with start values spread evenly over the DoF's range.
    ///
    /// Ranges come from the DoF itself, then the limits table, then the
    /// default limits. `max_submits` of zero means no limit.
    #[instrument(skip_all, name = "axis_jobs")]
    pub fn submit_axis_jobs(
        &mut self,
        gp: &mut Gridpack,
        plan: &SweepPlan,
        max_submits: usize,
    ) -> Result<usize, EngineError> {
        let process = gp.process().cloned().ok_or(EngineError::MissingProcess)?;
        let table = load_limits(gp)?;
        let (def_low, def_high) = gp.options().default_limits;

        let mut submitted = 0;
        for dof in &plan.dofs {
            let (low, high) = match (dof.low(), dof.high()) {
                (Some(low), Some(high)) => (low, high),
                _ => table
                    .lookup(process.limits_name(), dof.name())
                    .map(|(l, h)| (round_to_precision(l), round_to_precision(h)))
                    .unwrap_or((def_low, def_high)),
            };
            let tag = plan.axis_tag(dof);
            for (idx, start) in linspace(low, high, plan.runs as usize).into_iter().enumerate() {
                let run = idx as u32;
                if !plan.run_allowed(dof, run) {
                    debug!("Run {} of {} not whitelisted", run, tag);
                    continue;
                }
                let axis = dof.clone().with_limits(start, Some(low), Some(high));
                if self.submit_one(gp, &tag, run, &[axis], plan.num_pts, &ScanPoint::new(), None)? {
                    submitted += 1;
                }
                if limit_reached(submitted, max_submits) {
                    return Ok(submitted);
                }
            }
        }
        Ok(submitted)
    }

    /// `runs` configurations over every DoF at once.
    #[instrument(skip_all, name = "full_jobs")]
    pub fn submit_full_jobs(
        &mut self,
        gp: &mut Gridpack,
        plan: &SweepPlan,
        max_submits: usize,
    ) -> Result<usize, EngineError> {
        let mut submitted = 0;
        for run in 0..plan.runs {
            let dofs: Vec<DegreeOfFreedom> = plan
                .dofs
                .iter()
                .map(|d| d.clone().with_limits(0.0, None, None))
                .collect();
            let start = plan
                .start_points
                .get(run as usize)
                .cloned()
                .unwrap_or_default();
            if self.submit_one(gp, &plan.tag, run, &dofs, plan.num_pts, &start, None)? {
                submitted += 1;
            }
            if limit_reached(submitted, max_submits) {
                break;
            }
        }
        Ok(submitted)
    }

    /// One configuration per existing scan-points file; the file supplies start and reweight points.
    ///
    /// The run number is the file's position in the plan, so a missing file leaves a gap.
    #[instrument(skip_all, name = "scanfile_jobs")]
    pub fn submit_scanfile_jobs(
        &mut self,
        gp: &mut Gridpack,
        plan: &SweepPlan,
        max_submits: usize,
    ) -> Result<usize, EngineError> {
        let mut submitted = 0;
        for (idx, file) in plan.scan_files.iter().enumerate() {
            if !file.exists() {
                warn!("Scan file {} not found, skipping", file.display());
                continue;
            }
            let dofs: Vec<DegreeOfFreedom> = plan
                .dofs
                .iter()
                .map(|d| d.clone().with_limits(0.0, None, None))
                .collect();
            let start = ScanPoint::new();
            if self.submit_one(gp, &plan.tag, idx as u32, &dofs, 0, &start, Some(file))? {
                submitted += 1;
            }
            if limit_reached(submitted, max_submits) {
                break;
            }
        }
        Ok(submitted)
    }

    /// A single configuration at the SM point, without reweighting.
    #[instrument(skip_all, name = "sm_job")]
    pub fn submit_sm_job(&mut self, gp: &mut Gridpack, plan: &SweepPlan) -> Result<usize, EngineError> {
        let start = ScanPoint::sm(plan.dofs.iter().map(|d| d.name()));
        let submitted = self.submit_one(gp, &plan.tag, 0, &plan.dofs, 0, &start, None)?;
        Ok(usize::from(submitted))
    }

    /// Dispatches to the helper matching the gridpack's scan type.
    pub fn submit_process(
        &mut self,
        gp: &mut Gridpack,
        plan: &SweepPlan,
        max_submits: usize,
    ) -> Result<usize, EngineError> {
        match gp.options().scan {
            ScanType::AxisLinspace | ScanType::AxisRandom => {
                self.submit_axis_jobs(gp, plan, max_submits)
            }
            ScanType::FullLinspace | ScanType::FullRandom => {
                self.submit_full_jobs(gp, plan, max_submits)
            }
            ScanType::FromFile => self.submit_scanfile_jobs(gp, plan, max_submits),
            ScanType::None => self.submit_sm_job(gp, plan),
        }
    }
}

fn load_limits(gp: &Gridpack) -> Result<LimitsTable, EngineError> {
    let path = gp.layout().limits_path();
    if path.exists() {
        Ok(LimitsTable::load(&path)?)
    } else {
        Ok(LimitsTable::default())
    }
}

/// Submits the plan for every process once, without throttling.
#[instrument(skip_all, name = "sweep")]
pub fn run_sweep(
    processes: &[ProcessDefinition],
    gp: &mut Gridpack,
    plan: &SweepPlan,
    submitter: &mut Submitter,
) -> Result<usize, EngineError> {
    let mut submitted = 0;
    for process in processes {
        gp.set_process(process)?;
        info!("Sweeping process {} ({})", process.name(), gp.options().scan);
        submitted += submitter.submit_process(gp, plan, 0)?;
    }
    info!("Submitted {} configurations", submitted);
    Ok(submitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::testing::RecordingRunner;
    use crate::engine::config::{BatchType, GridpackOptionsBuilder};
    use crate::engine::gridpack::testing::fixture;
    use std::fs;

    fn plan() -> SweepPlan {
        SweepPlan {
            dofs: vec![DegreeOfFreedom::single("ctG"), DegreeOfFreedom::single("ctW")],
            num_pts: 3,
            runs: 3,
            tag: "FullScan".to_string(),
            tag_postfix: "AxisScan".to_string(),
            ..SweepPlan::default()
        }
    }

    #[test]
    fn axis_jobs_spread_start_values_over_the_range() {
        let (dir, process, layout) = fixture();
        let options = GridpackOptionsBuilder::new()
            .batch(BatchType::Lsf)
            .scan(ScanType::AxisLinspace)
            .build()
            .unwrap();
        let mut gp = Gridpack::with_seed(layout, options, 3);
        gp.set_process(&process).unwrap();

        let runner = RecordingRunner::new();
        let mut pauses = Vec::new();
        let mut pacer = |d: Duration| pauses.push(d);
        let reporter = ProgressReporter::new();
        let mut submitter = Submitter::new(&runner, &mut pacer, &reporter);

        let mut plan = plan();
        plan.run_whitelist.insert("ctW".to_string(), vec![1]);
        let submitted = submitter.submit_axis_jobs(&mut gp, &plan, 0).unwrap();
        assert_eq!(submitted, 4);

        let scan = fs::read_to_string(dir.path().join("ttH_ctGAxisScan_run2_scanpoints.txt")).unwrap();
        assert!(scan.contains("MGStart"));
        assert!(scan.lines().nth(1).unwrap().contains("3.0"));
        assert!(dir.path().join("ttH_ctWAxisScan_run1_scanpoints.txt").exists());
        assert!(!dir.path().join("ttH_ctWAxisScan_run0_scanpoints.txt").exists());

        drop(submitter);
        assert_eq!(pauses, vec![DEFAULT_SUBMIT_DELAY; 4]);
        assert_eq!(runner.calls.borrow().len(), 4);
    }

    #[test]
    fn helpers_skip_existing_and_honour_max_submits() {
        let (_dir, process, layout) = fixture();
        let options = GridpackOptionsBuilder::new()
            .batch(BatchType::Lsf)
            .scan(ScanType::FullRandom)
            .build()
            .unwrap();
        let mut gp = Gridpack::with_seed(layout, options, 5);
        gp.set_process(&process).unwrap();

        let runner = RecordingRunner::new();
        let mut pacer = |_: Duration| {};
        let reporter = ProgressReporter::new();
        let mut submitter = Submitter::new(&runner, &mut pacer, &reporter);

        assert_eq!(submitter.submit_full_jobs(&mut gp, &plan(), 2).unwrap(), 2);
        assert_eq!(submitter.submit_full_jobs(&mut gp, &plan(), 0).unwrap(), 1);
        assert_eq!(submitter.submit_full_jobs(&mut gp, &plan(), 0).unwrap(), 0);
        assert_eq!(runner.calls.borrow().len(), 3);
    }

    #[test]
    fn scanfile_jobs_use_the_file_points() {
        let (dir, process, layout) = fixture();
        let source = dir.path().join("points.txt");
        fs::write(&source, "ctG ctW\nMGStart 1.0 2.0\nrwgt0 0.5 0.5\n").unwrap();

        let options = GridpackOptionsBuilder::new().scan(ScanType::FromFile).build().unwrap();
        let mut gp = Gridpack::with_seed(layout, options, 1);
        gp.set_process(&process).unwrap();

        let runner = RecordingRunner::new();
        let mut pacer = |_: Duration| {};
        let reporter = ProgressReporter::new();
        let mut submitter = Submitter::new(&runner, &mut pacer, &reporter);

        let plan = SweepPlan {
            scan_files: vec![source],
            ..plan()
        };
        assert_eq!(submitter.submit_process(&mut gp, &plan, 0).unwrap(), 1);
        assert_eq!(gp.scan_points().len(), 1);
        assert!(dir.path().join("ttH_FullScan_run0_scanpoints.txt").exists());
    }

    #[test]
    fn scanfile_jobs_skip_missing_files() {
        let (dir, process, layout) = fixture();
        let source = dir.path().join("points.txt");
        fs::write(&source, "ctG ctW\nMGStart 1.0 2.0\nrwgt0 0.5 0.5\n").unwrap();

        let options = GridpackOptionsBuilder::new().scan(ScanType::FromFile).build().unwrap();
        let mut gp = Gridpack::with_seed(layout, options, 1);
        gp.set_process(&process).unwrap();

        let runner = RecordingRunner::new();
        let mut pacer = |_: Duration| {};
        let reporter = ProgressReporter::new();
        let mut submitter = Submitter::new(&runner, &mut pacer, &reporter);

        let plan = SweepPlan {
            scan_files: vec![dir.path().join("missing.txt"), source],
            ..plan()
        };
        assert_eq!(submitter.submit_process(&mut gp, &plan, 0).unwrap(), 1);
        assert!(!dir.path().join("ttH_FullScan_run0_scanpoints.txt").exists());
        assert!(dir.path().join("ttH_FullScan_run1_scanpoints.txt").exists());
    }

    #[test]
    fn run_sweep_without_scan_submits_one_sm_job_per_process() {
        let (dir, process, layout) = fixture();
        let mut gp = Gridpack::with_seed(layout, GridpackOptionsBuilder::new().build().unwrap(), 9);

        let runner = RecordingRunner::new();
        let mut pacer = |_: Duration| {};
        let reporter = ProgressReporter::new();
        let mut submitter = Submitter::new(&runner, &mut pacer, &reporter);

        let submitted = run_sweep(&[process], &mut gp, &plan(), &mut submitter).unwrap();
        assert_eq!(submitted, 1);
        assert!(runner.programs().is_empty());

        let customize = fs::read_to_string(
            dir.path()
                .join("addons/cards/ttH_cards/ttH_FullScan_run0/ttH_FullScan_run0_customizecards.dat"),
        )
        .unwrap();
        assert!(customize.contains("set param_card ctG 0.000000\n"));
    }
}
