use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid default limits: low ({low}) must not exceed high ({high})")]
    InvalidDefaultLimits { low: f64, high: f64 },
    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Backend used to run the gridpack generation for a materialized configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchType {
    /// Run the generation script in the foreground.
    Local,
    /// Shared-filesystem batch queue.
    Lsf,
    /// Pooled batch submission, detached with its own debug log.
    CmsConnect,
    /// Not functional yet; submission only logs a warning.
    Condor,
    /// Configure and materialize only.
    #[default]
    None,
}

impl BatchType {
    pub const ALL: [BatchType; 5] = [
        BatchType::Local,
        BatchType::Lsf,
        BatchType::CmsConnect,
        BatchType::Condor,
        BatchType::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchType::Local => "local",
            BatchType::Lsf => "lsf",
            BatchType::CmsConnect => "cmsconnect",
            BatchType::Condor => "condor",
            BatchType::None => "none",
        }
    }
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownVariant {
                kind: "batch type",
                value: s.to_string(),
            })
    }
}

/// Strategy used to choose the reweight points of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    /// Uniform samples over the full hyper-rectangle.
    FullRandom,
    /// Uniform samples along each axis, all other DoFs at zero.
    AxisRandom,
    /// Cartesian grid of evenly spaced values.
    FullLinspace,
    /// Evenly spaced values along each axis, all other DoFs at zero.
    AxisLinspace,
    /// Start and reweight points read from a scan-points file.
    FromFile,
    /// No reweighting.
    #[default]
    None,
}

impl ScanType {
    pub const ALL: [ScanType; 6] = [
        ScanType::FullRandom,
        ScanType::AxisRandom,
        ScanType::FullLinspace,
        ScanType::AxisLinspace,
        ScanType::FromFile,
        ScanType::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::FullRandom => "full_random",
            ScanType::AxisRandom => "axis_random",
            ScanType::FullLinspace => "full_linspace",
            ScanType::AxisLinspace => "axis_linspace",
            ScanType::FromFile => "from_file",
            ScanType::None => "none",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownVariant {
                kind: "scan type",
                value: s.to_string(),
            })
    }
}

/// Directory conventions of the gridpack-generation checkout.
///
/// All relative paths are resolved against `home_dir`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub home_dir: PathBuf,
    pub card_dir: PathBuf,
    pub limits_dir: PathBuf,
    pub proc_card_dir: PathBuf,
    pub gridrun_dir: PathBuf,
    pub limits_file: String,
    pub genprod_script: String,
    pub arch: String,
    pub release: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            home_dir: PathBuf::from("."),
            card_dir: PathBuf::from("addons/cards"),
            limits_dir: PathBuf::from("addons/limits"),
            proc_card_dir: PathBuf::from("addons/cards/process_cards"),
            gridrun_dir: PathBuf::from("gridruns"),
            limits_file: "dim6top_LO_UFO_limits.txt".to_string(),
            genprod_script: "gridpack_generation.sh".to_string(),
            arch: "slc6_amd64_gcc630".to_string(),
            release: "CMSSW_9_3_0".to_string(),
        }
    }
}

impl Layout {
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
            ..Self::default()
        }
    }

    pub fn limits_path(&self) -> PathBuf {
        self.home_dir.join(&self.limits_dir).join(&self.limits_file)
    }
}

/// Per-sweep options shared by every configuration a [`Gridpack`](super::gridpack::Gridpack) produces.
#[derive(Debug, Clone, PartialEq)]
pub struct GridpackOptions {
    pub batch: BatchType,
    pub scan: ScanType,
    pub num_rwgt_pts: usize,
    /// Run-card keys to overwrite in the template. Every key must exist in the template.
    pub runcard_ops: BTreeMap<String, String>,
    /// Keep the Feynman diagrams (local batch only).
    pub save_diagrams: bool,
    /// Switch to the `each_coupling_order` variant of the default model.
    pub use_coupling_model: bool,
    /// Replaces the default coupling-order expression in the process card.
    pub coupling_string: Option<String>,
    /// Replaces the default model. Takes precedence over `use_coupling_model`.
    pub replace_model: Option<String>,
    pub default_limits: (f64, f64),
}

impl Default for GridpackOptions {
    fn default() -> Self {
        Self {
            batch: BatchType::None,
            scan: ScanType::None,
            num_rwgt_pts: 0,
            runcard_ops: BTreeMap::new(),
            save_diagrams: false,
            use_coupling_model: false,
            coupling_string: None,
            replace_model: None,
            default_limits: (-10.0, 10.0),
        }
    }
}

#[derive(Default)]
pub struct GridpackOptionsBuilder {
    batch: Option<BatchType>,
    scan: Option<ScanType>,
    num_rwgt_pts: Option<usize>,
    runcard_ops: BTreeMap<String, String>,
    save_diagrams: Option<bool>,
    use_coupling_model: Option<bool>,
    coupling_string: Option<String>,
    replace_model: Option<String>,
    default_limits: Option<(f64, f64)>,
}

impl GridpackOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch(mut self, batch: BatchType) -> Self {
        self.batch = Some(batch);
        self
    }
    pub fn scan(mut self, scan: ScanType) -> Self {
        self.scan = Some(scan);
        self
    }
    pub fn num_rwgt_pts(mut self, n: usize) -> Self {
        self.num_rwgt_pts = Some(n);
        self
    }
    pub fn runcard_op(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.runcard_ops.insert(key.into(), value.into());
        self
    }
    pub fn save_diagrams(mut self, save: bool) -> Self {
        self.save_diagrams = Some(save);
        self
    }
    pub fn use_coupling_model(mut self, enable: bool) -> Self {
        self.use_coupling_model = Some(enable);
        self
    }
    pub fn coupling_string(mut self, s: impl Into<String>) -> Self {
        self.coupling_string = Some(s.into());
        self
    }
    pub fn replace_model(mut self, model: impl Into<String>) -> Self {
        self.replace_model = Some(model.into());
        self
    }
    pub fn default_limits(mut self, low: f64, high: f64) -> Self {
        self.default_limits = Some((low, high));
        self
    }

    pub fn build(self) -> Result<GridpackOptions, ConfigError> {
        let defaults = GridpackOptions::default();
        let (low, high) = self.default_limits.unwrap_or(defaults.default_limits);
        if !(low <= high) {
            return Err(ConfigError::InvalidDefaultLimits { low, high });
        }
        Ok(GridpackOptions {
            batch: self.batch.unwrap_or(defaults.batch),
            scan: self.scan.unwrap_or(defaults.scan),
            num_rwgt_pts: self.num_rwgt_pts.unwrap_or(defaults.num_rwgt_pts),
            runcard_ops: self.runcard_ops,
            save_diagrams: self.save_diagrams.unwrap_or(defaults.save_diagrams),
            use_coupling_model: self
                .use_coupling_model
                .unwrap_or(defaults.use_coupling_model),
            coupling_string: self.coupling_string,
            replace_model: self.replace_model,
            default_limits: (low, high),
        })
    }
}
