//! `sqldash state` - inspect the persisted deployment state

use anyhow::Result;
use dashkit::{Reconciler, ResourceKind};

use crate::Context;
use crate::cli::{Overrides, StateCommand};
use crate::config::SqldashConfig;
use crate::ui;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    match cmd {
        StateCommand::Show { json, overrides } => show(ctx, json, &overrides),
        StateCommand::Links { overrides } => links(&overrides),
    }
}

fn load(overrides: &Overrides) -> Result<SqldashConfig> {
    let mut config = SqldashConfig::load()?;
    config.apply(overrides);
    Ok(config)
}

fn show(ctx: &Context, json: bool, overrides: &Overrides) -> Result<()> {
    let config = load(overrides)?;
    let (backend, settings) = super::connect(&config)?;
    let reconciler = Reconciler::new(&backend, &backend, settings);
    let state = reconciler.read_state()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    if state.is_empty() {
        ui::info("No state recorded yet");
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Deployment State");
        ui::kv("Remote folder", &reconciler.settings().remote_folder);
    }
    for kind in ResourceKind::ALL {
        let entries: Vec<_> = state.of_kind(kind).collect();
        if entries.is_empty() {
            continue;
        }
        ui::section(&kind.to_string(), entries.len());
        for (key, id) in entries {
            ui::kv(key.reference(), id.as_str());
        }
    }
    Ok(())
}

fn links(overrides: &Overrides) -> Result<()> {
    let config = load(overrides)?;
    let (backend, settings) = super::connect(&config)?;
    let links = Reconciler::new(&backend, &backend, settings).links()?;
    if links.is_empty() {
        ui::info("No dashboards deployed yet");
    }
    for (reference, link) in links {
        ui::kv(reference.as_str(), &link);
    }
    Ok(())
}
