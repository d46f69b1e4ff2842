use crate::error::{CliError, Result};
use gridpack_core::core::dof::DegreeOfFreedom;
use gridpack_core::core::process::ProcessDefinition;
use gridpack_core::engine::config::{BatchType, ScanType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileLayoutConfig {
    pub home_dir: Option<PathBuf>,
    pub card_dir: Option<PathBuf>,
    pub limits_dir: Option<PathBuf>,
    pub proc_card_dir: Option<PathBuf>,
    pub gridrun_dir: Option<PathBuf>,
    pub limits_file: Option<String>,
    pub genprod_script: Option<String>,
    pub arch: Option<String>,
    pub release: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileGridpackConfig {
    pub batch: Option<BatchType>,
    pub scan: Option<ScanType>,
    pub num_rwgt_pts: Option<usize>,
    pub save_diagrams: Option<bool>,
    pub use_coupling_model: Option<bool>,
    pub coupling_string: Option<String>,
    pub replace_model: Option<String>,
    pub default_limits: Option<(f64, f64)>,
    #[serde(default)]
    pub runcard: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileProcess {
    pub name: String,
    /// Prefix used in the limits table; defaults to `name`.
    pub limits_name: Option<String>,
    pub process_card: String,
    pub template_dir: PathBuf,
}

impl From<FileProcess> for ProcessDefinition {
    fn from(p: FileProcess) -> Self {
        let limits_name = p.limits_name.unwrap_or_else(|| p.name.clone());
        ProcessDefinition::new(p.name, limits_name, p.process_card, p.template_dir)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileDof {
    pub name: String,
    /// Couplings scaled by this DoF; defaults to the DoF name itself.
    #[serde(default)]
    pub couplings: Vec<String>,
    pub scale: Option<f64>,
    pub start: Option<f64>,
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl TryFrom<FileDof> for DegreeOfFreedom {
    type Error = CliError;

    fn try_from(d: FileDof) -> Result<Self> {
        let dof = DegreeOfFreedom::new(d.name, d.couplings, d.scale.unwrap_or(1.0));
        match (d.low, d.high, d.start) {
            (Some(low), Some(high), start) => {
                Ok(dof.with_limits(start.unwrap_or(0.0), Some(low), Some(high)))
            }
            (None, None, None) => Ok(dof),
            _ => Err(CliError::Config(format!(
                "DoF '{}' needs both 'low' and 'high' when any of 'start', 'low' or 'high' is set",
                dof.name()
            ))),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSweepConfig {
    pub runs: Option<u32>,
    pub num_pts: Option<usize>,
    pub tag: Option<String>,
    pub tag_postfix: Option<String>,
    #[serde(default)]
    pub run_whitelist: BTreeMap<String, Vec<u32>>,
    #[serde(default)]
    pub start_points: Vec<BTreeMap<String, f64>>,
    #[serde(default)]
    pub scan_files: Vec<PathBuf>,
    pub submit_delay_secs: Option<u64>,
    /// Use the throttled submission loop; defaults to on for the pooled backend only.
    pub throttled: Option<bool>,
    pub seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileThrottleConfig {
    pub max_codegen: Option<usize>,
    pub max_integrate: Option<usize>,
    pub max_running: Option<usize>,
    pub max_resubmits: Option<u32>,
    pub resubmit: Option<bool>,
    /// Minutes; a negative value disables the cutoff.
    pub integrate_cutoff_min: Option<i64>,
    /// Minutes; a negative value disables the cutoff.
    pub tarball_cutoff_min: Option<i64>,
    pub delay_min: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub layout: Option<FileLayoutConfig>,
    pub gridpack: Option<FileGridpackConfig>,
    #[serde(default)]
    pub process: Vec<FileProcess>,
    #[serde(default)]
    pub dof: Vec<FileDof>,
    pub sweep: Option<FileSweepConfig>,
    pub throttle: Option<FileThrottleConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading sweep configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
