use super::command::{CommandRunner, Invocation};
use super::config::{BatchType, ConfigError, GridpackOptions, Layout, ScanType};
use super::error::EngineError;
use super::naming::{CUSTOMIZE_CARD, JobId, PROC_CARD, REWEIGHT_CARD, RUN_CARD};
use super::sampling::{self, DEFAULT_RFACTOR, calculate_start_point, min_full_random_points};
use crate::core::cards::customize_card::CustomizeCard;
use crate::core::cards::reweight::write_reweight_card;
use crate::core::cards::run_card::RunCard;
use crate::core::cards::substitution::apply_named_substitution;
use crate::core::cards::traits::Card;
use crate::core::dof::DegreeOfFreedom;
use crate::core::io::limits::LimitsTable;
use crate::core::io::scanfile::{read_scan_points, write_scan_points};
use crate::core::point::{ScanPoint, round_to_precision};
use crate::core::process::ProcessDefinition;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, error, info, instrument, warn};

static RWSEED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RWSEED=[0-9]*").expect("valid RWSEED regex"));

const NOJPEG_TOKEN: &str = "SUBSETUP -nojpeg";
const SETUP_TOKEN: &str = "SUBSETUP";
const COUPLING_TOKEN: &str = "DIM6=1";
const MODEL_IMPORT: &str = "import model dim6top_LO_UFO";
const COUPLING_ORDER_MODEL: &str = "dim6top_LO_UFO_each_coupling_order";
const DEFAULT_FLAVOR_SCHEME: u32 = 5;

const LSF_SCRIPT: &str = "./submit_gridpack_generation.sh";
const CMSCONNECT_SCRIPT: &str = "./submit_cmsconnect_gridpack_generation.sh";
const DIAGRAM_SCRIPT: &str = "./diagram_generation.sh";
const CMSCONNECT_CORES: u32 = 1;
const CMSCONNECT_MEMORY: &str = "15 Gb";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// Cards, reweight card and scan-points file were written.
    Materialized,
    /// Artifacts of this configuration already exist; nothing was touched.
    Skipped,
}

/// Configures, materializes and submits gridpack jobs, one `(process, tag, run)` at a time.
///
/// A single `Gridpack` is reused across a sweep: [`configure`](Self::configure)
/// re-targets it at a new identity, [`setup`](Self::setup) writes the card
/// instances, and [`submit`](Self::submit) hands them to the batch backend.
/// All paths are resolved against [`Layout::home_dir`].
#[derive(Debug, Clone)]
pub struct Gridpack {
    layout: Layout,
    options: GridpackOptions,
    process: Option<ProcessDefinition>,
    flavor_scheme: Option<u32>,
    tag: String,
    run: u32,
    coeffs: Vec<DegreeOfFreedom>,
    scan_points: Vec<ScanPoint>,
    num_rwgt_pts: usize,
    is_configured: bool,
    rng: StdRng,
}

impl Gridpack {
    pub fn new(layout: Layout, options: GridpackOptions) -> Self {
        Self::with_rng(layout, options, StdRng::from_entropy())
    }

    /// Deterministic variant used for reproducible sweeps and tests.
    pub fn with_seed(layout: Layout, options: GridpackOptions, seed: u64) -> Self {
        Self::with_rng(layout, options, StdRng::seed_from_u64(seed))
    }

    fn with_rng(layout: Layout, options: GridpackOptions, rng: StdRng) -> Self {
        let num_rwgt_pts = options.num_rwgt_pts;
        Self {
            layout,
            options,
            process: None,
            flavor_scheme: Some(DEFAULT_FLAVOR_SCHEME),
            tag: "Test".to_string(),
            run: 0,
            coeffs: Vec::new(),
            scan_points: Vec::new(),
            num_rwgt_pts,
            is_configured: false,
            rng,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn options(&self) -> &GridpackOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut GridpackOptions {
        &mut self.options
    }

    pub fn process(&self) -> Option<&ProcessDefinition> {
        self.process.as_ref()
    }

    pub fn flavor_scheme(&self) -> Option<u32> {
        self.flavor_scheme
    }

    pub fn coeffs(&self) -> &[DegreeOfFreedom] {
        &self.coeffs
    }

    pub fn scan_points(&self) -> &[ScanPoint] {
        &self.scan_points
    }

    pub fn num_rwgt_pts(&self) -> usize {
        self.num_rwgt_pts
    }

    pub fn is_configured(&self) -> bool {
        self.is_configured
    }

    pub fn job_id(&self) -> JobId {
        let process = self.process.as_ref().map(|p| p.name()).unwrap_or_default();
        JobId::new(process, self.tag.clone(), self.run)
    }

    pub fn setup_string(&self) -> String {
        self.job_id().setup_string()
    }

    /// Switches to another process and reads its flavour scheme from the template run card.
    pub fn set_process(&mut self, process: &ProcessDefinition) -> Result<(), EngineError> {
        let card_dir = self.layout.home_dir.join(&self.layout.card_dir);
        self.flavor_scheme = process.flavor_scheme(&card_dir)?;
        self.process = Some(process.clone());
        Ok(())
    }

    /// Points the gridpack at an existing `(tag, run)` without re-deriving limits,
    /// so that its artifacts can be inspected or cleaned.
    pub fn adopt(&mut self, tag: &str, run: u32) {
        self.tag = tag.to_string();
        self.run = run;
        self.is_configured = true;
    }

    // --- Paths -------------------------------------------------------------------------------

    fn home_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.layout.home_dir.join(name)
    }

    /// Card directory of this configuration, relative to the home directory.
    pub fn target_dir_relative(&self) -> PathBuf {
        let process = self.process.as_ref().map(|p| p.name()).unwrap_or_default();
        self.layout
            .card_dir
            .join(format!("{}_cards", process))
            .join(self.setup_string())
    }

    pub fn target_dir(&self) -> PathBuf {
        self.home_path(self.target_dir_relative())
    }

    /// Working directory the generation script creates for this configuration.
    pub fn setup_dir(&self) -> PathBuf {
        self.home_path(self.setup_string())
    }

    pub fn gridrun_dir_relative(&self) -> PathBuf {
        let process = self.process.as_ref().map(|p| p.name()).unwrap_or_default();
        self.layout
            .gridrun_dir
            .join(process)
            .join(self.setup_string())
    }

    pub fn gridrun_dir(&self) -> PathBuf {
        self.home_path(self.gridrun_dir_relative())
    }

    pub fn tarball_file(&self) -> String {
        self.job_id()
            .tarball_file(&self.layout.arch, &self.layout.release)
    }

    pub fn tarball_path(&self) -> PathBuf {
        self.home_path(self.tarball_file())
    }

    pub fn scanfile_path(&self) -> PathBuf {
        self.home_path(self.job_id().scanpoints_file())
    }

    fn card_path(&self, card_base: &str) -> PathBuf {
        self.target_dir().join(self.job_id().card_file(card_base))
    }

    // --- Lifecycle ---------------------------------------------------------------------------

    /// Re-targets the gridpack at `(tag, run)` and resolves limits for every DoF.
    ///
    /// Limits come from the DoF itself if already set, then from the limits
    /// table, then from the default range. Start values come from `start_pt`
    /// or are drawn with [`calculate_start_point`]. With a `scan_file`, its
    /// first row becomes the start point and the remaining rows the scan
    /// points; DoFs missing from the file are pinned to zero.
    ///
    /// # Errors
    ///
    /// Fails, leaving the gridpack unconfigured, if the default range is
    /// malformed, no process is set, or a file cannot be read.
    #[instrument(skip_all, fields(tag = tag, run = run))]
    pub fn configure(
        &mut self,
        tag: &str,
        run: u32,
        dofs: &[DegreeOfFreedom],
        num_pts: usize,
        start_pt: &ScanPoint,
        scan_file: Option<&Path>,
    ) -> Result<(), EngineError> {
        self.is_configured = false;
        let (def_low, def_high) = self.options.default_limits;
        if !(def_low <= def_high) {
            error!("Invalid input for default limits: ({}, {})", def_low, def_high);
            return Err(ConfigError::InvalidDefaultLimits {
                low: def_low,
                high: def_high,
            }
            .into());
        }
        let limits_name = self
            .process
            .as_ref()
            .ok_or(EngineError::MissingProcess)?
            .limits_name()
            .to_string();

        self.tag = tag.to_string();
        self.run = run;
        self.coeffs = dofs.to_vec();
        self.scan_points.clear();

        if let Some(path) = scan_file {
            self.load_scan_file(path)?;
            self.num_rwgt_pts = self.scan_points.len();
        }

        if self.scan_points.is_empty() {
            let mut n = num_pts;
            if n > 0 {
                n = match self.options.scan {
                    ScanType::FullRandom => n.max(min_full_random_points(self.coeffs.len())),
                    ScanType::AxisLinspace => n.max(3),
                    _ => n,
                };
            }
            self.num_rwgt_pts = n;

            let limits_path = self.layout.limits_path();
            let table = if limits_path.exists() {
                LimitsTable::load(&limits_path)?
            } else {
                debug!("No limits file at {}", limits_path.display());
                LimitsTable::default()
            };

            for dof in self.coeffs.iter_mut() {
                if dof.has_limits() {
                    continue;
                }
                let (low, high) = match table.lookup(&limits_name, dof.name()) {
                    Some((low, high)) => (round_to_precision(low), round_to_precision(high)),
                    None => (def_low, def_high),
                };
                let start = if start_pt.contains(dof.name()) {
                    start_pt.get(dof.name())
                } else {
                    calculate_start_point(low, high, DEFAULT_RFACTOR, &mut self.rng)?
                };
                dof.set_limits(start, Some(low), Some(high));
            }
        }

        self.is_configured = true;
        debug!("Configured {}", self.setup_string());
        Ok(())
    }

    fn load_scan_file(&mut self, path: &Path) -> Result<(), EngineError> {
        let points = read_scan_points(path)?;
        let mut missing = Vec::new();
        let mut extra = BTreeSet::new();

        for (idx, point) in points.into_iter().enumerate() {
            let mut kept = ScanPoint::new();
            for (name, value) in point.iter() {
                if self.coeffs.iter().any(|d| d.name() == name) {
                    kept.insert(name, value);
                } else {
                    extra.insert(name.to_string());
                }
            }
            if idx == 0 {
                for dof in self.coeffs.iter_mut() {
                    let start = if kept.contains(dof.name()) {
                        kept.get(dof.name())
                    } else {
                        missing.push(dof.name().to_string());
                        0.0
                    };
                    dof.set_limits(start, Some(0.0), Some(0.0));
                }
            } else {
                self.scan_points.push(kept);
            }
        }

        if !missing.is_empty() {
            warn!(
                "Scanpoints file is missing DoFs used in this configuration, pinning to SM: {:?}",
                missing
            );
        }
        if !extra.is_empty() {
            warn!(
                "Scanpoints file has DoFs not used in this configuration, ignoring: {:?}",
                extra
            );
        }
        Ok(())
    }

    /// True if any artifact of this configuration is already present.
    pub fn exists(&self) -> bool {
        self.setup_dir().exists()
            || self.tarball_path().exists()
            || self.scanfile_path().exists()
            || self.gridrun_dir().exists()
    }

    /// Writes the card instances, reweight card and scan-points file.
    ///
    /// Returns [`SetupOutcome::Skipped`] without touching anything if the
    /// configuration already [`exists`](Self::exists).
    #[instrument(skip_all, fields(setup = %self.setup_string()))]
    pub fn setup(&mut self) -> Result<SetupOutcome, EngineError> {
        let setup = self.setup_string();
        if !self.is_configured {
            return Err(EngineError::NotConfigured(setup));
        }
        if self.exists() {
            info!("Skipping gridpack setup: {}", setup);
            return Ok(SetupOutcome::Skipped);
        }
        if self.options.save_diagrams && self.options.batch != BatchType::Local {
            return Err(EngineError::InvalidBatchForDiagrams(self.options.batch));
        }
        let process = self.process.clone().ok_or(EngineError::MissingProcess)?;
        if self.options.scan == ScanType::None {
            self.scan_points.clear();
        }

        info!("Setup gridpack: {}...", setup);

        let card_dir = self.layout.home_dir.join(&self.layout.card_dir);
        let customize = self.build_customize_card(&process, &card_dir)?;
        let run_card = self.build_run_card(&process, &card_dir)?;

        self.reseed_generation_script()?;

        let target_dir = self.target_dir();
        if target_dir.exists() {
            info!("The cards directory already exists, will overwrite existing cards");
        } else {
            fs::create_dir_all(&target_dir)?;
        }

        customize.save(&self.card_path(CUSTOMIZE_CARD), true)?;
        run_card.save(&self.card_path(RUN_CARD), true)?;
        self.save_reweight_card()?;
        self.save_process_card(&process)?;
        Ok(SetupOutcome::Materialized)
    }

    fn build_customize_card(
        &self,
        process: &ProcessDefinition,
        card_dir: &Path,
    ) -> Result<CustomizeCard, EngineError> {
        let mut card = CustomizeCard::parse(&process.customize_card_template(card_dir))?;
        if self.flavor_scheme == Some(5) {
            card.push_option("set param_card MB 0.0");
            card.push_option("set param_card ymb 0.0");
        }
        for dof in &self.coeffs {
            for (coupling, value) in dof.eval(dof.start()) {
                card.push_option(&format!("set param_card {} {:.6}", coupling, value));
            }
        }
        Ok(card)
    }

    fn build_run_card(
        &self,
        process: &ProcessDefinition,
        card_dir: &Path,
    ) -> Result<RunCard, EngineError> {
        let mut card = RunCard::parse(&process.run_card_template(card_dir))?;
        for (key, value) in &self.options.runcard_ops {
            card.set_option(key, value);
        }
        if let Some(key) = card.added_keys().next() {
            error!("Unknown run card option: {}", key);
            return Err(EngineError::UnknownRunCardOption(key.to_string()));
        }
        Ok(card)
    }

    fn reseed_generation_script(&mut self) -> Result<(), EngineError> {
        let script = self.home_path(&self.layout.genprod_script);
        if !script.is_file() {
            debug!("Generation script {} not found, skipping reseed", script.display());
            return Ok(());
        }
        let seed: u32 = self.rng.gen_range(1..1_000_000);
        info!("Seed: {}", seed);
        let text = fs::read_to_string(&script)?;
        let updated = RWSEED_PATTERN.replace_all(&text, format!("RWSEED={}", seed).as_str());
        if updated != text {
            fs::write(&script, updated.as_ref())?;
        }
        Ok(())
    }

    fn save_reweight_card(&mut self) -> Result<(), EngineError> {
        if self.scan_points.is_empty() {
            self.scan_points = sampling::generate(
                self.options.scan,
                &self.coeffs,
                self.num_rwgt_pts,
                &mut self.rng,
            )?;
        }
        write_scan_points(&self.scanfile_path(), &self.coeffs, &self.scan_points)?;
        write_reweight_card(&self.card_path(REWEIGHT_CARD), &self.coeffs, &self.scan_points)?;
        Ok(())
    }

    fn save_process_card(&self, process: &ProcessDefinition) -> Result<(), EngineError> {
        let src = self
            .home_path(&self.layout.proc_card_dir)
            .join(process.process_card());
        let mut text = fs::read_to_string(&src)?;

        if self.options.save_diagrams {
            info!("Saving diagrams!");
            text = apply_named_substitution(&text, NOJPEG_TOKEN, SETUP_TOKEN);
        }
        if let Some(couplings) = &self.options.coupling_string {
            info!("Custom couplings: {}", couplings);
            text = apply_named_substitution(&text, COUPLING_TOKEN, couplings);
        }
        let model = match (&self.options.replace_model, self.options.use_coupling_model) {
            (Some(model), _) => Some(model.as_str()),
            (None, true) => Some(COUPLING_ORDER_MODEL),
            (None, false) => None,
        };
        if let Some(model) = model {
            info!("Using {} model", model);
            text = apply_named_substitution(&text, MODEL_IMPORT, &format!("import model {}", model));
        }
        text = apply_named_substitution(&text, SETUP_TOKEN, &self.setup_string());

        fs::write(self.card_path(PROC_CARD), text)?;
        Ok(())
    }

    /// Hands the materialized configuration to the batch backend.
    ///
    /// Returns `Ok(false)` if the card directory is missing. Only the local
    /// backend blocks until the generation finishes.
    #[instrument(skip_all, fields(setup = %self.setup_string()))]
    pub fn submit(&self, runner: &dyn CommandRunner) -> Result<bool, EngineError> {
        let setup = self.setup_string();
        if !self.target_dir().exists() {
            error!("Can't find target directory, {}", self.target_dir().display());
            return Ok(false);
        }
        let home = &self.layout.home_dir;
        let target = self.target_dir_relative().display().to_string();
        let (setup, target) = (setup.as_str(), target.as_str());
        let (arch, release) = (self.layout.arch.as_str(), self.layout.release.as_str());
        let cores = CMSCONNECT_CORES.to_string();

        info!("Submit gridpack: {} (batch type: {})", setup, self.options.batch);
        match self.options.batch {
            BatchType::Local => {
                let inv = if self.options.save_diagrams {
                    Invocation::new(DIAGRAM_SCRIPT, home).args([setup, target])
                } else {
                    Invocation::new(format!("./{}", self.layout.genprod_script), home)
                        .args([setup, target, "local", "ALL", arch, release])
                };
                runner.run(&inv)?;
            }
            BatchType::Lsf => {
                let inv = Invocation::new(LSF_SCRIPT, home)
                    .args(["15000", "15000", "1nd", setup, target, "8nh"]);
                runner.run(&inv)?;
            }
            BatchType::CmsConnect => {
                let inv = Invocation::new(CMSCONNECT_SCRIPT, home).args([
                    setup,
                    target,
                    cores.as_str(),
                    CMSCONNECT_MEMORY,
                    arch,
                    release,
                ]);
                info!("Will execute: {}", inv);
                runner.spawn_detached(&inv, &self.home_path(self.job_id().debug_file()))?;
            }
            BatchType::Condor => {
                warn!("Condor running is not currently supported, {} was not submitted", setup);
            }
            BatchType::None => {
                info!("Skipping gridpack generation, {}", setup);
            }
        }
        Ok(true)
    }

    /// Removes every artifact of this configuration and resets the configured flag.
    ///
    /// If any removal fails the flag stays set and the failed paths are returned
    /// in [`EngineError::CleanFailed`], so the caller can retry.
    #[instrument(skip_all, fields(setup = %self.setup_string()))]
    pub fn clean(&mut self) -> Result<(), EngineError> {
        if !self.is_configured {
            warn!("The gridpack has not been configured yet, so no cleaning can be done");
            return Ok(());
        }
        info!("Cleaning files related to gridpack configuration: {}", self.setup_string());

        let id = self.job_id();
        let dirs = [self.target_dir(), self.setup_dir(), self.gridrun_dir()];
        let files = [
            self.tarball_path(),
            self.scanfile_path(),
            self.home_path(id.log_file()),
            self.home_path(id.debug_file()),
            self.home_path(id.codegen_log_file()),
        ];

        let mut failed = Vec::new();
        for dir in dirs.into_iter().filter(|d| d.is_dir()) {
            info!("Removing existing directory: {}", dir.display());
            if let Err(e) = fs::remove_dir_all(&dir) {
                warn!("Failed to remove {}: {}", dir.display(), e);
                failed.push(dir);
            }
        }
        for file in files.into_iter().filter(|f| f.is_file()) {
            info!("Removing existing file: {}", file.display());
            if let Err(e) = fs::remove_file(&file) {
                warn!("Failed to remove {}: {}", file.display(), e);
                failed.push(file);
            }
        }

        if !failed.is_empty() {
            return Err(EngineError::CleanFailed { job: id, failed });
        }
        self.is_configured = false;
        Ok(())
    }

    /// Unpacks the produced tarball into the gridrun directory and generates events from it.
    ///
    /// Returns `Ok(false)` if no tarball has been produced yet.
    #[instrument(skip_all, fields(setup = %self.setup_string()))]
    pub fn run(
        &self,
        events: u64,
        seed: u64,
        cores: u32,
        runner: &dyn CommandRunner,
    ) -> Result<bool, EngineError> {
        info!("Running gridpack: {}", self.setup_string());
        let output_dir = self.gridrun_dir();
        if output_dir.exists() {
            info!("Removing existing output directory: {}", output_dir.display());
            fs::remove_dir_all(&output_dir)?;
        }
        fs::create_dir_all(&output_dir)?;

        if !self.tarball_path().exists() {
            warn!("No tarball file found for {}, skipping", self.setup_string());
            return Ok(false);
        }

        info!("Extracting tarball...");
        let extract = Invocation::new("tar", &self.layout.home_dir).args([
            "xaf".to_string(),
            self.tarball_file(),
            "-C".to_string(),
            self.gridrun_dir_relative().display().to_string(),
        ]);
        runner.run(&extract)?;

        info!("Running gridpack...");
        let generate = Invocation::new("./runcmsgrid.sh", &output_dir).args([
            events.to_string(),
            seed.to_string(),
            cores.to_string(),
        ]);
        runner.run(&generate)?;
        Ok(true)
    }

    // --- Settings summaries ------------------------------------------------------------------

    pub fn limit_settings(&self) -> String {
        let limits_name = self.process.as_ref().map(|p| p.limits_name()).unwrap_or_default();
        let mut out = format!("Limit Settings: {}\n", self.setup_string());
        for dof in &self.coeffs {
            let key = format!("{}_{}", limits_name, dof.name());
            let fmt = |v: Option<f64>| match v {
                Some(v) => format!("{:>7.2}", v),
                None => format!("{:>7}", "None"),
            };
            let _ = writeln!(
                out,
                "\t{:<11}: [{},{},{}]",
                key,
                fmt(Some(dof.start())),
                fmt(dof.low()),
                fmt(dof.high())
            );
        }
        out
    }

    pub fn directory_settings(&self) -> String {
        let template = self
            .process
            .as_ref()
            .map(|p| self.layout.card_dir.join(p.template_dir()))
            .unwrap_or_default();
        let mut out = format!("Directory Settings: {}\n", self.setup_string());
        let _ = writeln!(out, "\tHome Dir    : {}", self.layout.home_dir.display());
        let _ = writeln!(out, "\tTarget Dir  : ./{}", self.target_dir_relative().display());
        let _ = writeln!(out, "\tTemplate Dir: ./{}", template.display());
        let _ = writeln!(out, "\tGridrun Dir : ./{}", self.gridrun_dir_relative().display());
        out
    }

    pub fn base_settings(&self) -> String {
        let mut out = format!("Base Settings: {}\n", self.setup_string());
        self.write_common_settings(&mut out, false);
        out.push_str(&indent(&self.limit_settings()));
        out
    }

    pub fn all_settings(&self) -> String {
        let mut out = format!("All Settings: {}\n", self.setup_string());
        self.write_common_settings(&mut out, true);
        let dirs = self.directory_settings();
        out.push_str(&indent(dirs.split_once('\n').map(|(_, rest)| rest).unwrap_or("")));
        out.push_str(&indent(&self.limit_settings()));
        out
    }

    fn write_common_settings(&self, out: &mut String, verbose: bool) {
        let process = self.process.as_ref();
        let flavor = self
            .flavor_scheme
            .map(|f| f.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let _ = writeln!(out, "\tProcess     : {}", process.map(|p| p.name()).unwrap_or_default());
        if verbose {
            let _ = writeln!(
                out,
                "\tLimits Name : {}",
                process.map(|p| p.limits_name()).unwrap_or_default()
            );
        }
        let _ = writeln!(
            out,
            "\tProcess Card: {}",
            process.map(|p| p.process_card()).unwrap_or_default()
        );
        let _ = writeln!(out, "\tFlavorScheme: {}", flavor);
        let _ = writeln!(out, "\tScanType    : {}", self.options.scan);
        let _ = writeln!(out, "\tBatchType   : {}", self.options.batch);
        if verbose {
            let _ = writeln!(out, "\tTarball File: {}", self.tarball_file());
            let _ = writeln!(out, "\tScan File   : {}", self.job_id().scanpoints_file());
        }
        let _ = writeln!(out, "\tRwgt Points : {}", self.num_rwgt_pts);
        let _ = writeln!(out, "\tScan Points : {}", self.scan_points.len());
    }
}

fn indent(text: &str) -> String {
    text.lines().map(|l| format!("\t{}\n", l)).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tempfile::{TempDir, tempdir};

    const RUN_CARD_TEXT: &str = "\
#*********************************************************************
  tag_1     = run_tag ! name of the run
  10000 = nevents ! Number of unweighted events requested
     5 = maxjetflavor    ! Maximum jet pdg code
";
    pub(crate) const CUSTOMIZE_TEXT: &str = "set param_card mass 6 172.5\n";
    const PROC_CARD_TEXT: &str = "\
import model dim6top_LO_UFO
generate p p > t t~ h DIM6=1
output SUBSETUP -nojpeg
";

    pub(crate) fn fixture() -> (TempDir, ProcessDefinition, Layout) {
        let dir = tempdir().unwrap();
        let layout = Layout::with_home(dir.path());
        let process = ProcessDefinition::new("ttH", "ttH", "ttH.dat", "EFT-ttH_template");

        let tdir = dir.path().join(&layout.card_dir).join(process.template_dir());
        fs::create_dir_all(&tdir).unwrap();
        fs::write(tdir.join("run_card.dat"), RUN_CARD_TEXT).unwrap();
        fs::write(tdir.join("customizecards.dat"), CUSTOMIZE_TEXT).unwrap();

        let pdir = dir.path().join(&layout.proc_card_dir);
        fs::create_dir_all(&pdir).unwrap();
        fs::write(pdir.join("ttH.dat"), PROC_CARD_TEXT).unwrap();

        let ldir = dir.path().join(&layout.limits_dir);
        fs::create_dir_all(&ldir).unwrap();
        fs::write(ldir.join(&layout.limits_file), "ttH_ctG -2.0 3.0\n").unwrap();

        fs::write(dir.path().join(&layout.genprod_script), "#!/bin/bash\nRWSEED=123\n").unwrap();
        (dir, process, layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::testing::RecordingRunner;
    use crate::engine::config::GridpackOptionsBuilder;
    use testing::{CUSTOMIZE_TEXT, fixture};

    fn gridpack(layout: Layout, process: &ProcessDefinition, options: GridpackOptions) -> Gridpack {
        let mut gp = Gridpack::with_seed(layout, options, 17);
        gp.set_process(process).unwrap();
        gp
    }

    fn dofs() -> Vec<DegreeOfFreedom> {
        vec![
            DegreeOfFreedom::single("ctG"),
            DegreeOfFreedom::single("ctW"),
            DegreeOfFreedom::new("ctei", ["cte1", "cte2"], 1.0).with_limits(1.0, Some(-4.0), Some(4.0)),
        ]
    }

    fn start_point() -> ScanPoint {
        [("ctG", 1.0), ("ctW", -2.0)].into_iter().collect()
    }

    #[test]
    fn set_process_reads_flavor_scheme() {
        let (_dir, process, layout) = fixture();
        let gp = gridpack(layout, &process, GridpackOptions::default());
        assert_eq!(gp.flavor_scheme(), Some(5));
        assert_eq!(gp.setup_string(), "ttH_Test_run0");
    }

    #[test]
    fn configure_resolves_limits_in_priority_order() {
        let (_dir, process, layout) = fixture();
        let mut gp = gridpack(layout, &process, GridpackOptions::default());
        gp.configure("AxisScan", 2, &dofs(), 5, &start_point(), None).unwrap();

        assert!(gp.is_configured());
        assert_eq!(gp.setup_string(), "ttH_AxisScan_run2");
        let c = gp.coeffs();
        assert_eq!((c[0].start(), c[0].low(), c[0].high()), (1.0, Some(-2.0), Some(3.0)));
        assert_eq!((c[1].start(), c[1].low(), c[1].high()), (-2.0, Some(-10.0), Some(10.0)));
        assert_eq!((c[2].start(), c[2].low(), c[2].high()), (1.0, Some(-4.0), Some(4.0)));
    }

    #[test]
    fn configure_draws_missing_start_values() {
        let (_dir, process, layout) = fixture();
        let mut gp = gridpack(layout, &process, GridpackOptions::default());
        gp.configure("Test", 0, &dofs(), 0, &ScanPoint::new(), None).unwrap();

        let ctw = &gp.coeffs()[1];
        assert!(ctw.start().abs() * DEFAULT_RFACTOR > 10.0);
    }

    #[test]
    fn configure_fails_closed_on_bad_default_limits() {
        let (_dir, process, layout) = fixture();
        let options = GridpackOptions {
            default_limits: (5.0, -5.0),
            ..GridpackOptions::default()
        };
        let mut gp = gridpack(layout, &process, options);
        let err = gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::InvalidDefaultLimits { .. })));
        assert!(!gp.is_configured());
        assert!(matches!(gp.setup(), Err(EngineError::NotConfigured(_))));
    }

    #[test]
    fn configure_auto_sizes_point_counts() {
        let (_dir, process, layout) = fixture();
        let options = GridpackOptionsBuilder::new().scan(ScanType::FullRandom).build().unwrap();
        let mut gp = gridpack(layout.clone(), &process, options);
        gp.configure("Test", 0, &dofs(), 1, &start_point(), None).unwrap();
        assert_eq!(gp.num_rwgt_pts(), 12);

        let options = GridpackOptionsBuilder::new().scan(ScanType::AxisLinspace).build().unwrap();
        let mut gp = gridpack(layout, &process, options);
        gp.configure("Test", 0, &dofs(), 1, &start_point(), None).unwrap();
        assert_eq!(gp.num_rwgt_pts(), 3);
        gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap();
        assert_eq!(gp.num_rwgt_pts(), 0);
    }

    #[test]
    fn configure_from_scan_file_pins_missing_dofs() {
        let (dir, process, layout) = fixture();
        let scan = dir.path().join("ttH_Old_run0_scanpoints.txt");
        fs::write(&scan, "  ctG  cQq13\nMGStart 2.0 1.0\nrwgt0 1.5 3.0\nrwgt1 0.0 0.0\n").unwrap();

        let mut gp = gridpack(layout, &process, GridpackOptions::default());
        gp.configure("Test", 0, &dofs(), 0, &ScanPoint::new(), Some(&scan)).unwrap();

        let c = gp.coeffs();
        assert_eq!((c[0].start(), c[0].low(), c[0].high()), (2.0, Some(0.0), Some(0.0)));
        assert_eq!((c[1].start(), c[1].low(), c[1].high()), (0.0, Some(0.0), Some(0.0)));
        assert_eq!(gp.scan_points().len(), 2);
        assert_eq!(gp.num_rwgt_pts(), 2);
        assert!(!gp.scan_points()[0].contains("cQq13"));
        assert_eq!(gp.scan_points()[0].get("ctG"), 1.5);
    }

    #[test]
    fn setup_materializes_all_cards() {
        let (dir, process, layout) = fixture();
        let options = GridpackOptionsBuilder::new()
            .scan(ScanType::AxisLinspace)
            .num_rwgt_pts(3)
            .runcard_op("nevents", "500")
            .coupling_string("DIM6^2==1")
            .use_coupling_model(true)
            .build()
            .unwrap();
        let mut gp = gridpack(layout, &process, options);
        gp.configure("Test", 0, &dofs(), 3, &start_point(), None).unwrap();

        assert_eq!(gp.setup().unwrap(), SetupOutcome::Materialized);

        let target = dir.path().join("addons/cards/ttH_cards/ttH_Test_run0");
        let customize = fs::read_to_string(target.join("ttH_Test_run0_customizecards.dat")).unwrap();
        assert!(customize.starts_with(CUSTOMIZE_TEXT));
        assert!(customize.contains("set param_card MB 0.0\nset param_card ymb 0.0\n"));
        assert!(customize.contains("set param_card ctG 1.000000\n"));
        assert!(customize.contains("set param_card cte2 1.000000\n"));

        let run_card = fs::read_to_string(target.join("ttH_Test_run0_run_card.dat")).unwrap();
        assert!(run_card.contains("500 = nevents"));
        assert!(run_card.contains("  tag_1     = run_tag ! name of the run\n"));

        let proc_card = fs::read_to_string(target.join("ttH_Test_run0_proc_card.dat")).unwrap();
        assert_eq!(
            proc_card,
            "import model dim6top_LO_UFO_each_coupling_order\n\
             generate p p > t t~ h DIM6^2==1\n\
             output ttH_Test_run0 -nojpeg\n"
        );

        assert!(target.join("ttH_Test_run0_reweight_card.dat").is_file());
        assert!(dir.path().join("ttH_Test_run0_scanpoints.txt").is_file());
        assert!(!gp.scan_points().is_empty());

        let script = fs::read_to_string(dir.path().join("gridpack_generation.sh")).unwrap();
        assert!(!script.contains("RWSEED=123\n"));
        assert!(script.contains("RWSEED="));
    }

    #[test]
    fn setup_is_idempotent() {
        let (dir, process, layout) = fixture();
        let mut gp = gridpack(layout, &process, GridpackOptions::default());
        gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap();
        assert_eq!(gp.setup().unwrap(), SetupOutcome::Materialized);

        let scanfile = dir.path().join("ttH_Test_run0_scanpoints.txt");
        let before = fs::read_to_string(&scanfile).unwrap();
        assert_eq!(gp.setup().unwrap(), SetupOutcome::Skipped);
        assert_eq!(fs::read_to_string(&scanfile).unwrap(), before);
    }

    #[test]
    fn setup_without_scan_writes_no_reweight_card() {
        let (dir, process, layout) = fixture();
        let mut gp = gridpack(layout, &process, GridpackOptions::default());
        gp.configure("Test", 0, &dofs(), 5, &start_point(), None).unwrap();
        gp.setup().unwrap();

        let target = dir.path().join("addons/cards/ttH_cards/ttH_Test_run0");
        assert!(!target.join("ttH_Test_run0_reweight_card.dat").exists());
        assert!(dir.path().join("ttH_Test_run0_scanpoints.txt").is_file());
    }

    #[test]
    fn setup_rejects_unknown_run_card_option_before_writing() {
        let (dir, process, layout) = fixture();
        let options = GridpackOptionsBuilder::new().runcard_op("xqcut", "30").build().unwrap();
        let mut gp = gridpack(layout, &process, options);
        gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap();

        let err = gp.setup().unwrap_err();
        assert!(matches!(err, EngineError::UnknownRunCardOption(ref k) if k == "xqcut"));
        assert!(!dir.path().join("addons/cards/ttH_cards").exists());
        assert!(!gp.exists());
    }

    #[test]
    fn setup_rejects_diagrams_on_batch_backends() {
        let (_dir, process, layout) = fixture();
        let options = GridpackOptionsBuilder::new()
            .batch(BatchType::CmsConnect)
            .save_diagrams(true)
            .build()
            .unwrap();
        let mut gp = gridpack(layout, &process, options);
        gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap();
        assert!(matches!(
            gp.setup(),
            Err(EngineError::InvalidBatchForDiagrams(BatchType::CmsConnect))
        ));
    }

    #[test]
    fn replace_model_takes_precedence() {
        let (dir, process, layout) = fixture();
        let options = GridpackOptionsBuilder::new()
            .use_coupling_model(true)
            .replace_model("dim6top_LO_UFO_HanV4_2")
            .build()
            .unwrap();
        let mut gp = gridpack(layout, &process, options);
        gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap();
        gp.setup().unwrap();

        let proc_card = fs::read_to_string(
            dir.path()
                .join("addons/cards/ttH_cards/ttH_Test_run0/ttH_Test_run0_proc_card.dat"),
        )
        .unwrap();
        assert!(proc_card.starts_with("import model dim6top_LO_UFO_HanV4_2\n"));
    }

    #[test]
    fn exists_detects_any_single_artifact() {
        let (dir, process, layout) = fixture();
        let mut gp = gridpack(layout, &process, GridpackOptions::default());
        gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap();
        assert!(!gp.exists());

        let artifacts: Vec<Box<dyn Fn(&Path)>> = vec![
            Box::new(|p: &Path| fs::create_dir_all(p.join("ttH_Test_run0")).unwrap()),
            Box::new(|p: &Path| {
                fs::write(
                    p.join("ttH_Test_run0_slc6_amd64_gcc630_CMSSW_9_3_0_tarball.tar.xz"),
                    "",
                )
                .unwrap()
            }),
            Box::new(|p: &Path| fs::write(p.join("ttH_Test_run0_scanpoints.txt"), "").unwrap()),
            Box::new(|p: &Path| fs::create_dir_all(p.join("gridruns/ttH/ttH_Test_run0")).unwrap()),
        ];
        for make in artifacts {
            make(dir.path());
            assert!(gp.exists());
            gp.clean().unwrap();
            assert!(!gp.exists());
            gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap();
        }
    }

    #[test]
    fn clean_removes_artifacts_and_resets_flag() {
        let (dir, process, layout) = fixture();
        let mut gp = gridpack(layout, &process, GridpackOptions::default());
        gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap();
        gp.setup().unwrap();
        fs::write(dir.path().join("ttH_Test_run0.log"), "log").unwrap();
        fs::write(dir.path().join("ttH_Test_run0_codegen.log"), "log").unwrap();
        fs::write(dir.path().join("ttH_Test_run0.debug"), "log").unwrap();

        gp.clean().unwrap();
        assert!(!gp.is_configured());
        assert!(!gp.exists());
        assert!(!gp.target_dir().exists());
        assert!(!dir.path().join("ttH_Test_run0.log").exists());
        assert!(!dir.path().join("ttH_Test_run0_codegen.log").exists());
        assert!(!dir.path().join("ttH_Test_run0.debug").exists());
    }

    #[test]
    fn adopt_allows_cleaning_an_existing_job() {
        let (dir, process, layout) = fixture();
        fs::write(dir.path().join("ttH_Old_run4_scanpoints.txt"), "").unwrap();

        let mut gp = gridpack(layout, &process, GridpackOptions::default());
        gp.adopt("Old", 4);
        assert!(gp.exists());
        gp.clean().unwrap();
        assert!(!gp.exists());
    }

    #[test]
    fn submit_dispatches_per_batch_type() {
        let (_dir, process, layout) = fixture();
        let cases = [
            (BatchType::Local, Some("./gridpack_generation.sh")),
            (BatchType::Lsf, Some("./submit_gridpack_generation.sh")),
            (BatchType::CmsConnect, Some("./submit_cmsconnect_gridpack_generation.sh")),
            (BatchType::Condor, None),
            (BatchType::None, None),
        ];
        for (run, (batch, program)) in cases.into_iter().enumerate() {
            let options = GridpackOptionsBuilder::new().batch(batch).build().unwrap();
            let mut gp = gridpack(layout.clone(), &process, options);
            gp.configure("Test", run as u32, &dofs(), 0, &start_point(), None).unwrap();
            gp.setup().unwrap();

            let runner = RecordingRunner::new();
            assert!(gp.submit(&runner).unwrap());
            assert_eq!(runner.programs(), program.into_iter().map(String::from).collect::<Vec<_>>());
        }
    }

    #[test]
    fn submit_passes_positional_arguments() {
        let (dir, process, layout) = fixture();
        let options = GridpackOptionsBuilder::new().batch(BatchType::CmsConnect).build().unwrap();
        let mut gp = gridpack(layout, &process, options);
        gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap();
        gp.setup().unwrap();

        let runner = RecordingRunner::new();
        gp.submit(&runner).unwrap();
        let detached = runner.detached.borrow();
        let (inv, log) = &detached[0];
        assert_eq!(
            inv.args,
            vec![
                "ttH_Test_run0",
                "addons/cards/ttH_cards/ttH_Test_run0",
                "1",
                "15 Gb",
                "slc6_amd64_gcc630",
                "CMSSW_9_3_0"
            ]
        );
        assert_eq!(log, &dir.path().join("ttH_Test_run0.debug"));
    }

    #[test]
    fn submit_without_cards_is_refused() {
        let (_dir, process, layout) = fixture();
        let mut gp = gridpack(layout, &process, GridpackOptions::default());
        gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap();
        let runner = RecordingRunner::new();
        assert!(!gp.submit(&runner).unwrap());
        assert!(runner.programs().is_empty());
    }

    #[test]
    fn run_requires_tarball() {
        let (dir, process, layout) = fixture();
        let mut gp = gridpack(layout, &process, GridpackOptions::default());
        gp.adopt("Test", 0);
        let runner = RecordingRunner::new();

        assert!(!gp.run(100, 42, 1, &runner).unwrap());
        assert!(runner.programs().is_empty());
        assert!(gp.gridrun_dir().is_dir());

        fs::write(gp.tarball_path(), "").unwrap();
        assert!(gp.run(100, 42, 1, &runner).unwrap());
        assert_eq!(runner.programs(), vec!["tar", "./runcmsgrid.sh"]);
        let calls = runner.calls.borrow();
        assert_eq!(calls[1].args, vec!["100", "42", "1"]);
        assert_eq!(calls[1].cwd, dir.path().join("gridruns/ttH/ttH_Test_run0"));
    }

    #[test]
    fn settings_summaries_name_the_setup() {
        let (_dir, process, layout) = fixture();
        let mut gp = gridpack(layout, &process, GridpackOptions::default());
        gp.configure("Test", 0, &dofs(), 0, &start_point(), None).unwrap();

        let limits = gp.limit_settings();
        assert!(limits.starts_with("Limit Settings: ttH_Test_run0\n"));
        assert!(limits.contains("\tttH_ctG    : [   1.00,  -2.00,   3.00]\n"));

        let base = gp.base_settings();
        assert!(base.contains("\tScanType    : none\n"));
        assert!(base.contains("\t\tttH_ctW"));

        let all = gp.all_settings();
        assert!(all.contains("\tTarball File: ttH_Test_run0_slc6_amd64_gcc630_CMSSW_9_3_0_tarball.tar.xz\n"));
        assert!(all.contains("\tTarget Dir  : ./addons/cards/ttH_cards/ttH_Test_run0\n"));
    }
}
