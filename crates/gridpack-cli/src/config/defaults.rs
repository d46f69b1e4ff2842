use gridpack_core::engine::config::{BatchType, ScanType};
use std::time::Duration;

pub struct DefaultsConfig {
    pub batch: BatchType,
    pub scan: ScanType,
    pub runs: u32,
    pub num_pts: usize,
    pub tag: String,
    pub tag_postfix: String,
    pub submit_delay: Duration,
    pub max_codegen: usize,
    pub max_integrate: usize,
    pub max_running: usize,
    pub max_resubmits: u32,
    pub resubmit: bool,
    pub integrate_cutoff: Duration,
    pub tarball_cutoff: Duration,
    pub delay: Duration,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            batch: BatchType::None,
            scan: ScanType::None,
            runs: 1,
            num_pts: 0,
            tag: "Test".to_string(),
            tag_postfix: String::new(),
            submit_delay: Duration::from_secs(10),
            max_codegen: 5,
            max_integrate: 7,
            max_running: 25,
            max_resubmits: 5,
            resubmit: true,
            integrate_cutoff: Duration::from_secs(45 * 60),
            tarball_cutoff: Duration::from_secs(5 * 60),
            delay: Duration::from_secs(5 * 60),
        }
    }
}
