use anyhow::Result;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::{SqldashConfig, redact};
use crate::{paths, ui};

pub fn run(_ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(),
    }
}

fn show() -> Result<()> {
    ui::header("Configuration");

    let path = paths::config_file()?;
    ui::kv("Config file", &path.display().to_string());
    if !path.exists() {
        ui::info("Not found; all values must be passed as flags");
    }
    let config = SqldashConfig::load()?;

    println!();
    let unset = || "(not set)".to_string();
    ui::kv("host", &config.host.clone().unwrap_or_else(unset));
    ui::kv("local_folder", &config.local_folder.clone().unwrap_or_else(unset));
    ui::kv("remote_folder", &config.remote_folder.clone().unwrap_or_else(unset));
    ui::kv("name_prefix", &config.name_prefix.clone().unwrap_or_else(unset));
    ui::kv(
        "warehouse_id",
        &config
            .warehouse_id
            .clone()
            .unwrap_or_else(|| "(first available)".to_string()),
    );
    ui::kv("principal", config.principal());
    ui::kv(
        &format!("token ({})", config.token_env()),
        &redact(config.token().ok().as_deref()),
    );
    Ok(())
}
