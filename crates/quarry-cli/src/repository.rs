use nu_ansi_term::Color::{Blue, Cyan, Green, Red};
use quarry_core::{error::QuarryError, QuarryResult};
use quarry_registry::error::RegistryError;
use tracing::{error, info};

use crate::{context::AppContext, utils::Colored};

pub fn translate_repositories(ctx: &AppContext, names: &[String]) -> QuarryResult<()> {
    for location in ctx.locations(names)? {
        let effective = ctx.manager().translate(&location);
        if effective == location.url {
            info!("{} {}", Colored(Blue, &location.id), location.url);
        } else {
            info!(
                "{} {} -> {}",
                Colored(Blue, &location.id),
                location.url,
                Colored(Cyan, effective)
            );
        }
    }
    Ok(())
}

/// Loads each repository in turn, reporting every one. Fails if any load
/// failed.
pub fn load_repositories(ctx: &AppContext, names: &[String]) -> QuarryResult<()> {
    let locations = ctx.locations(names)?;
    let mut failed = 0;

    for location in &locations {
        match ctx.manager().load_repository(location, ctx.cancel()) {
            Ok(entry) => {
                info!(
                    "{} {} ({} artifacts from {})",
                    Colored(Green, "Loaded"),
                    Colored(Blue, &location.id),
                    entry.metadata.artifacts.len(),
                    entry.effective_location
                );
            }
            Err(err @ RegistryError::Cancelled { .. }) => return Err(err.into()),
            Err(err) => {
                failed += 1;
                error!("{} {}: {}", Colored(Red, "Failed"), location.id, err);
            }
        }
    }

    if failed > 0 {
        return Err(QuarryError::Custom(format!(
            "{failed} of {} repositories failed to load",
            locations.len()
        )));
    }
    Ok(())
}
