use super::adopt_job;
use crate::cli::RunArgs;
use crate::error::Result;
use gridpack_core::engine::command::SystemRunner;
use tracing::{info, warn};

pub async fn run(args: RunArgs) -> Result<()> {
    let gp = adopt_job(&args.job)?;
    info!(
        "Generating {} events (seed {}, {} cores) from {}",
        args.events,
        args.seed,
        args.cores,
        gp.tarball_file()
    );

    let ran = tokio::task::block_in_place(|| {
        gp.run(args.events, args.seed, args.cores, &SystemRunner)
    })?;

    if ran {
        println!("Events written to {}.", gp.gridrun_dir().display());
    } else {
        warn!("No tarball found for {}", gp.setup_string());
        println!("Warning: no tarball found at {}.", gp.tarball_path().display());
    }
    Ok(())
}
