pub mod clean;
pub mod run;
pub mod submit;
pub mod track;

use crate::cli::JobArgs;
use crate::config::builder::build_config;
use crate::error::{CliError, Result};
use gridpack_core::engine::gridpack::Gridpack;

/// Builds the sweep configuration and points a gridpack at one existing job.
pub(crate) fn adopt_job(args: &JobArgs) -> Result<Gridpack> {
    let config = build_config(&args.config, &[], false)?;
    let process = config.find_process(&args.process).cloned().ok_or_else(|| {
        CliError::Argument(format!(
            "Process '{}' is not defined in {}",
            args.process,
            args.config.display()
        ))
    })?;

    let mut gp = Gridpack::new(config.layout, config.options);
    gp.set_process(&process)?;
    gp.adopt(&args.tag, args.run);
    Ok(gp)
}
