use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const SCANFILE_SUFFIX: &str = "_scanpoints.txt";
pub const TARBALL_POSTFIX: &str = "tarball";
pub const TARBALL_TYPE: &str = "tar.xz";

pub const PROC_CARD: &str = "proc_card.dat";
pub const CUSTOMIZE_CARD: &str = "customizecards.dat";
pub const REWEIGHT_CARD: &str = "reweight_card.dat";
pub const RUN_CARD: &str = "run_card.dat";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid job identifier '{0}': expected <process>_<tag>_run<N>")]
pub struct JobIdError(pub String);

/// Identity of one gridpack configuration: `(process, tag, run)`.
///
/// Its [`Display`](fmt::Display) form is the setup string `{process}_{tag}_run{run}`,
/// the stem of every artifact the configuration produces. The job tracker
/// recovers the same identity from file names, so this type is the only place
/// the convention lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId {
    pub process: String,
    pub tag: String,
    pub run: u32,
}

impl JobId {
    pub fn new(process: impl Into<String>, tag: impl Into<String>, run: u32) -> Self {
        Self {
            process: process.into(),
            tag: tag.into(),
            run,
        }
    }

    pub fn setup_string(&self) -> String {
        self.to_string()
    }

    /// The `run{N}` field as it appears in artifact names.
    pub fn run_field(&self) -> String {
        format!("run{}", self.run)
    }

    /// Recovers the job identity from a `{setup}_scanpoints.txt` file name.
    pub fn from_scanpoints_file(file_name: &str) -> Option<Self> {
        file_name.strip_suffix(SCANFILE_SUFFIX)?.parse().ok()
    }

    pub fn scanpoints_file(&self) -> String {
        format!("{}{}", self, SCANFILE_SUFFIX)
    }

    pub fn tarball_file(&self, arch: &str, release: &str) -> String {
        format!(
            "{}_{}_{}_{}.{}",
            self, arch, release, TARBALL_POSTFIX, TARBALL_TYPE
        )
    }

    pub fn log_file(&self) -> String {
        format!("{}.log", self)
    }

    pub fn codegen_log_file(&self) -> String {
        format!("{}_codegen.log", self)
    }

    pub fn debug_file(&self) -> String {
        format!("{}.debug", self)
    }

    pub fn input_tarball_file(&self) -> String {
        format!("input_{}.tar.gz", self)
    }

    pub fn codegen_script_file(&self) -> String {
        format!("codegen_{}.sh", self)
    }

    pub fn codegen_jdl_file(&self) -> String {
        format!("codegen_{}.jdl", self)
    }

    /// Name of a card instance, e.g. `ttH_Test_run0_run_card.dat`.
    pub fn card_file(&self, card_base: &str) -> String {
        format!("{}_{}", self, card_base)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_run{}", self.process, self.tag, self.run)
    }
}

impl FromStr for JobId {
    type Err = JobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || JobIdError(s.to_string());
        let mut fields = s.split('_');
        let (Some(process), Some(tag), Some(run), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(err());
        };
        if process.is_empty() || tag.is_empty() {
            return Err(err());
        }
        let run = run
            .strip_prefix("run")
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(err)?;
        Ok(Self::new(process, tag, run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_string_follows_convention() {
        let id = JobId::new("ttH", "ctGAxisScan", 3);
        assert_eq!(id.setup_string(), "ttH_ctGAxisScan_run3");
        assert_eq!(id.run_field(), "run3");
    }

    #[test]
    fn artifact_names_share_setup_stem() {
        let id = JobId::new("ttll", "Test", 0);
        assert_eq!(id.scanpoints_file(), "ttll_Test_run0_scanpoints.txt");
        assert_eq!(
            id.tarball_file("slc6_amd64_gcc630", "CMSSW_9_3_0"),
            "ttll_Test_run0_slc6_amd64_gcc630_CMSSW_9_3_0_tarball.tar.xz"
        );
        assert_eq!(id.log_file(), "ttll_Test_run0.log");
        assert_eq!(id.codegen_log_file(), "ttll_Test_run0_codegen.log");
        assert_eq!(id.debug_file(), "ttll_Test_run0.debug");
        assert_eq!(id.input_tarball_file(), "input_ttll_Test_run0.tar.gz");
        assert_eq!(id.codegen_script_file(), "codegen_ttll_Test_run0.sh");
        assert_eq!(id.codegen_jdl_file(), "codegen_ttll_Test_run0.jdl");
        assert_eq!(id.card_file(RUN_CARD), "ttll_Test_run0_run_card.dat");
    }

    #[test]
    fn parse_round_trips_display() {
        let id = JobId::new("tllq4f", "16D", 12);
        assert_eq!(id.to_string().parse::<JobId>(), Ok(id));
    }

    #[test]
    fn parse_rejects_malformed_identifiers() {
        assert!("ttH_Test".parse::<JobId>().is_err());
        assert!("ttH_Test_0".parse::<JobId>().is_err());
        assert!("ttH_Test_runX".parse::<JobId>().is_err());
        assert!("ttH_Test_run0_extra".parse::<JobId>().is_err());
        assert!("_Test_run0".parse::<JobId>().is_err());
    }

    #[test]
    fn from_scanpoints_file_requires_suffix() {
        assert_eq!(
            JobId::from_scanpoints_file("ttH_Test_run0_scanpoints.txt"),
            Some(JobId::new("ttH", "Test", 0))
        );
        assert_eq!(JobId::from_scanpoints_file("ttH_Test_run0.log"), None);
        assert_eq!(JobId::from_scanpoints_file("a_b_c_run0_scanpoints.txt"), None);
    }
}
