use gridpack_core::core::process::ProcessDefinition;
use gridpack_core::engine::config::{GridpackOptions, Layout};
use gridpack_core::workflows::chain::ThrottleLimits;
use gridpack_core::workflows::sweep::SweepPlan;
use std::time::Duration;

pub struct AppConfig {
    pub layout: Layout,
    pub options: GridpackOptions,
    pub processes: Vec<ProcessDefinition>,
    pub plan: SweepPlan,
    pub throttle: ThrottleLimits,
    pub throttled: bool,
    pub submit_delay: Duration,
    pub seed: Option<u64>,
}

impl AppConfig {
    pub fn find_process(&self, name: &str) -> Option<&ProcessDefinition> {
        self.processes.iter().find(|p| p.name() == name)
    }
}
