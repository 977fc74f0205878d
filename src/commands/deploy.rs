//! `sqldash deploy` - converge the workspace to the local definitions

use anyhow::{Context as AnyhowContext, Result, bail};
use dashkit::{Reconciler, load_groups};

use crate::Context;
use crate::cli::DeployArgs;
use crate::config::SqldashConfig;
use crate::ui;

pub fn run(ctx: &Context, args: &DeployArgs) -> Result<()> {
    let mut config = SqldashConfig::load()?;
    config.apply(&args.overrides);
    if let Some(prefix) = &args.name_prefix {
        config.name_prefix = Some(prefix.clone());
    }

    let folder = config.local_folder(args.folder.as_deref())?;
    let groups = load_groups(&folder, &config.loader_options())
        .with_context(|| format!("Could not load definitions from {}", folder.display()))?;
    if groups.is_empty() {
        ui::warn(&format!("No dashboards found under {}", folder.display()));
        return Ok(());
    }

    let (backend, settings) = super::connect(&config)?;
    if !ctx.quiet {
        ui::header("Deploying Dashboards");
        ui::kv("Definitions", &folder.display().to_string());
        ui::kv("Remote folder", &settings.remote_folder);
        println!();
    }

    let reconciler = Reconciler::new(&backend, &backend, settings);
    let report = match reconciler.reconcile(&groups) {
        Ok(report) => report,
        Err(e) => {
            ui::report(&e);
            bail!("Deployment failed");
        }
    };

    if !ctx.quiet {
        for group in &groups {
            if let Some(id) = report.dashboards.get(&group.reference) {
                ui::dashboard(&group.dashboard_name, &reconciler.dashboard_link(id));
            }
        }
        ui::summary(&report.summary, ctx.verbose > 0);
    }
    Ok(())
}
