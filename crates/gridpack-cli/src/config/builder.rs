use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileLayoutConfig, FileThrottleConfig};
use super::models::AppConfig;
use crate::error::{CliError, Result};
use gridpack_core::core::dof::DegreeOfFreedom;
use gridpack_core::core::point::ScanPoint;
use gridpack_core::engine::config::{BatchType, GridpackOptionsBuilder, Layout, ScanType};
use gridpack_core::workflows::chain::ThrottleLimits;
use gridpack_core::workflows::sweep::SweepPlan;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

/// Reads the sweep file, applies `-S` overrides and fills the remaining values from the defaults.
///
/// With `dry_run`, configurations are materialized but never handed to a batch backend.
pub fn build_config(path: &Path, set_values: &[String], dry_run: bool) -> Result<AppConfig> {
    let file_config = FileConfig::from_file(path)?;
    build_from(file_config, set_values, dry_run)
}

pub fn build_from(file_config: FileConfig, set_values: &[String], dry_run: bool) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let mut file_config = apply_set_values(file_config, set_values)?;

    if file_config.process.is_empty() {
        return Err(CliError::Config("at least one [[process]] is required".to_string()));
    }

    let layout = merge_layout(file_config.layout.take().unwrap_or_default());

    let gp_file = file_config.gridpack.take().unwrap_or_default();
    let batch = if dry_run {
        BatchType::None
    } else {
        gp_file.batch.unwrap_or(defaults.batch)
    };
    let mut options = GridpackOptionsBuilder::new()
        .batch(batch)
        .scan(gp_file.scan.unwrap_or(defaults.scan))
        .num_rwgt_pts(gp_file.num_rwgt_pts.unwrap_or(defaults.num_pts))
        .save_diagrams(gp_file.save_diagrams.unwrap_or(false))
        .use_coupling_model(gp_file.use_coupling_model.unwrap_or(false));
    if let Some(couplings) = gp_file.coupling_string {
        options = options.coupling_string(couplings);
    }
    if let Some(model) = gp_file.replace_model {
        options = options.replace_model(model);
    }
    if let Some((low, high)) = gp_file.default_limits {
        options = options.default_limits(low, high);
    }
    for (key, value) in gp_file.runcard {
        options = options.runcard_op(key, value);
    }
    let options = options
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let sweep = file_config.sweep.take().unwrap_or_default();
    let plan = SweepPlan {
        dofs: file_config
            .dof
            .into_iter()
            .map(DegreeOfFreedom::try_from)
            .collect::<Result<Vec<_>>>()?,
        num_pts: sweep.num_pts.unwrap_or(defaults.num_pts),
        runs: sweep.runs.unwrap_or(defaults.runs),
        tag: sweep.tag.unwrap_or_else(|| defaults.tag.clone()),
        tag_postfix: sweep
            .tag_postfix
            .unwrap_or_else(|| defaults.tag_postfix.clone()),
        run_whitelist: sweep.run_whitelist,
        start_points: sweep
            .start_points
            .into_iter()
            .map(|p| p.into_iter().collect::<ScanPoint>())
            .collect(),
        scan_files: sweep.scan_files,
    };
    if plan.tag.is_empty() {
        return Err(CliError::Config("sweep.tag must not be empty".to_string()));
    }

    let throttle = merge_throttle(file_config.throttle.take().unwrap_or_default(), &defaults);
    let throttled = sweep
        .throttled
        .unwrap_or(options.batch == BatchType::CmsConnect);

    Ok(AppConfig {
        layout,
        options,
        processes: file_config.process.into_iter().map(Into::into).collect(),
        plan,
        throttle,
        throttled,
        submit_delay: if dry_run {
            Duration::ZERO
        } else {
            sweep
                .submit_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.submit_delay)
        },
        seed: sweep.seed,
    })
}

fn merge_layout(file: FileLayoutConfig) -> Layout {
    let base = Layout::default();
    Layout {
        home_dir: file.home_dir.unwrap_or(base.home_dir),
        card_dir: file.card_dir.unwrap_or(base.card_dir),
        limits_dir: file.limits_dir.unwrap_or(base.limits_dir),
        proc_card_dir: file.proc_card_dir.unwrap_or(base.proc_card_dir),
        gridrun_dir: file.gridrun_dir.unwrap_or(base.gridrun_dir),
        limits_file: file.limits_file.unwrap_or(base.limits_file),
        genprod_script: file.genprod_script.unwrap_or(base.genprod_script),
        arch: file.arch.unwrap_or(base.arch),
        release: file.release.unwrap_or(base.release),
    }
}

/// Minutes to an optional cutoff; negative values disable it.
pub fn cutoff_from_minutes(minutes: i64) -> Option<Duration> {
    u32::try_from(minutes).ok().map(|m| MINUTE * m)
}

fn merge_throttle(file: FileThrottleConfig, defaults: &DefaultsConfig) -> ThrottleLimits {
    ThrottleLimits {
        max_codegen: file.max_codegen.unwrap_or(defaults.max_codegen),
        max_integrate: file.max_integrate.unwrap_or(defaults.max_integrate),
        max_running: file.max_running.unwrap_or(defaults.max_running),
        max_resubmits: file.max_resubmits.unwrap_or(defaults.max_resubmits),
        resubmit: file.resubmit.unwrap_or(defaults.resubmit),
        integrate_cutoff: match file.integrate_cutoff_min {
            Some(m) => cutoff_from_minutes(m),
            None => Some(defaults.integrate_cutoff),
        },
        tarball_cutoff: match file.tarball_cutoff_min {
            Some(m) => cutoff_from_minutes(m),
            None => Some(defaults.tarball_cutoff),
        },
        delay: file
            .delay_min
            .and_then(|m| u32::try_from(m).ok())
            .map(|m| MINUTE * m)
            .unwrap_or(defaults.delay),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "layout.home-dir" => {
                config.layout.get_or_insert_with(Default::default).home_dir = Some(value.into());
            }
            "layout.arch" => {
                config.layout.get_or_insert_with(Default::default).arch = Some(value.to_string());
            }
            "layout.release" => {
                config.layout.get_or_insert_with(Default::default).release = Some(value.to_string());
            }
            "gridpack.batch" => {
                let batch = value
                    .parse::<BatchType>()
                    .map_err(|e| CliError::Config(e.to_string()))?;
                config.gridpack.get_or_insert_with(Default::default).batch = Some(batch);
            }
            "gridpack.scan" => {
                let scan = value
                    .parse::<ScanType>()
                    .map_err(|e| CliError::Config(e.to_string()))?;
                config.gridpack.get_or_insert_with(Default::default).scan = Some(scan);
            }
            "gridpack.num-rwgt-pts" => {
                config.gridpack.get_or_insert_with(Default::default).num_rwgt_pts =
                    Some(parse_value(key, value)?);
            }
            "sweep.runs" => {
                config.sweep.get_or_insert_with(Default::default).runs = Some(parse_value(key, value)?);
            }
            "sweep.num-pts" => {
                config.sweep.get_or_insert_with(Default::default).num_pts = Some(parse_value(key, value)?);
            }
            "sweep.tag" => {
                config.sweep.get_or_insert_with(Default::default).tag = Some(value.to_string());
            }
            "sweep.tag-postfix" => {
                config.sweep.get_or_insert_with(Default::default).tag_postfix = Some(value.to_string());
            }
            "sweep.seed" => {
                config.sweep.get_or_insert_with(Default::default).seed = Some(parse_value(key, value)?);
            }
            "throttle.max-codegen" => {
                config.throttle.get_or_insert_with(Default::default).max_codegen =
                    Some(parse_value(key, value)?);
            }
            "throttle.max-integrate" => {
                config.throttle.get_or_insert_with(Default::default).max_integrate =
                    Some(parse_value(key, value)?);
            }
            "throttle.max-running" => {
                config.throttle.get_or_insert_with(Default::default).max_running =
                    Some(parse_value(key, value)?);
            }
            "throttle.delay-min" => {
                config.throttle.get_or_insert_with(Default::default).delay_min =
                    Some(parse_value(key, value)?);
            }
            key if key.starts_with("gridpack.runcard.") => {
                let option = &key["gridpack.runcard.".len()..];
                config
                    .gridpack
                    .get_or_insert_with(Default::default)
                    .runcard
                    .insert(option.to_string(), value.to_string());
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
