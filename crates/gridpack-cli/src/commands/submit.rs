use crate::cli::SubmitArgs;
use crate::config::builder::build_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use gridpack_core::{
    engine::{command::SystemRunner, gridpack::Gridpack, progress::ProgressReporter},
    workflows::{
        chain::SubmissionLoop,
        pacer::ThreadSleep,
        sweep::{Submitter, run_sweep},
    },
};
use tracing::info;

pub async fn run(args: SubmitArgs) -> Result<()> {
    info!("Building sweep configuration from {:?}", &args.config);
    let config = build_config(&args.config, &args.set_values, args.dry_run)?;

    let mut gp = match config.seed {
        Some(seed) => Gridpack::with_seed(config.layout.clone(), config.options.clone(), seed),
        None => Gridpack::new(config.layout.clone(), config.options.clone()),
    };

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let runner = SystemRunner;
    let mut pacer = ThreadSleep;

    println!(
        "Submitting {} process(es) with scan type '{}' to '{}'...",
        config.processes.len(),
        config.options.scan,
        config.options.batch
    );

    tokio::task::block_in_place(|| -> Result<()> {
        let mut submitter =
            Submitter::new(&runner, &mut pacer, &reporter).with_submit_delay(config.submit_delay);

        if config.throttled {
            info!("Invoking the throttled submission loop...");
            let mut chain =
                SubmissionLoop::new(&config.processes, &config.plan, config.throttle, &gp)?;
            let summary = chain.run(&mut gp, &mut submitter)?;
            println!(
                "Submission loop finished after {} pass(es): {} submitted, {} resubmitted.",
                summary.passes, summary.submitted, summary.resubmitted
            );
        } else {
            info!("Invoking the one-shot sweep...");
            let submitted = run_sweep(&config.processes, &mut gp, &config.plan, &mut submitter)?;
            println!("Sweep finished: {} configuration(s) submitted.", submitted);
        }
        Ok(())
    })
}
