use anyhow::{Context, Result};
use serde_json::json;
use tracing::{error, info, warn};

use cloak_engine::config::Config;
use cloak_engine::driver::{DryRunDriver, VmDriver};
use cloak_engine::fields;
use cloak_engine::machine::{BuildError, BuildStatus, Machine};
use cloak_engine::profile::{ProfileError, ProfileStore};
use cloak_engine::template::FieldTemplate;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    shared::init_logging(config.logging.log_config()?)?;

    info!("Starting cloak-engine (dry run)");

    let store = ProfileStore::new(&config.profiles.directory);
    let template = match &config.resolution.template_path {
        Some(path) => FieldTemplate::from_file(path)?,
        None => fields::virtualbox_template()?,
    };

    let driver = DryRunDriver::new(&config.machine.name);
    let mut machine = Machine::new(&config.machine_spec(), driver)?;
    machine.driver_mut().create_vm().await?;

    let report = match machine
        .init_fields(&store, &config.profiles.name, &template, config.resolution.seed)
        .await
    {
        Ok(report) => report,
        Err(BuildError::Profile(e @ ProfileError::NotFound { .. })) => {
            error!("{}", e);
            if let Ok(available) = store.list() {
                info!("Available profiles: {}", available.join(", "));
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if report.status() == BuildStatus::SuccessWithWarnings {
        for fallback in report.profile_gaps() {
            warn!("{} fell back to placeholder ({:?})", fallback.path, fallback.reason);
        }
        for failure in &report.failures {
            warn!("{} failed at {:?}: {}", failure.path, failure.stage, failure.error);
        }
    }

    let settings = machine.driver_mut().list_settings().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "report": report,
            "settings": settings,
        }))?
    );

    info!(status = ?report.status(), "Done");
    Ok(())
}
