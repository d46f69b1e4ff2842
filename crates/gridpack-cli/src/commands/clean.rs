use super::adopt_job;
use crate::cli::JobArgs;
use crate::error::Result;
use tracing::info;

pub async fn run(args: JobArgs) -> Result<()> {
    let mut gp = adopt_job(&args)?;

    if !gp.exists() {
        println!("Nothing to clean for {}.", gp.setup_string());
        return Ok(());
    }

    info!("{}", gp.directory_settings());
    tokio::task::block_in_place(|| gp.clean())?;
    println!("Removed all artifacts of {}.", gp.setup_string());
    Ok(())
}
