//! `sqldash validate` - check definitions without remote calls

use anyhow::{Result, bail};
use dashkit::{Error, load_groups, validate_all};

use crate::Context;
use crate::cli::ValidateArgs;
use crate::config::SqldashConfig;
use crate::ui;

pub fn run(ctx: &Context, args: &ValidateArgs) -> Result<()> {
    let config = SqldashConfig::load()?;
    let folder = config.local_folder(args.folder.as_deref())?;

    let groups = match load_groups(&folder, &config.loader_options()) {
        Ok(groups) => groups,
        Err(e) => {
            ui::report(&e);
            bail!("Could not load definitions from {}", folder.display());
        }
    };
    let queries: usize = groups.iter().map(|g| g.queries.len()).sum();

    match validate_all(&groups) {
        Ok(()) => {
            if !ctx.quiet {
                ui::success(&format!(
                    "{} queries in {} dashboards are valid",
                    queries,
                    groups.len()
                ));
            }
            Ok(())
        }
        Err(Error::Validation(errors)) => {
            let failed = errors.len();
            ui::report(&Error::Validation(errors));
            bail!("{} of {} queries failed validation", failed, queries)
        }
        Err(e) => Err(e.into()),
    }
}
