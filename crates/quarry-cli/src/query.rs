use nu_ansi_term::Color::{Blue, Cyan, Green};
use quarry_core::{
    artifact::ArtifactKey, error::QuarryError, query::ArtifactQuery, QuarryResult,
};
use tracing::info;

use crate::{context::AppContext, utils::Colored};

pub fn query_artifacts(ctx: &AppContext, query: &str, repos: &[String]) -> QuarryResult<()> {
    let query = ArtifactQuery::try_from(query)?;
    let provider = ctx.provider(repos)?;

    let keys = provider.query(&|key| query.matches(key));
    if keys.is_empty() {
        info!("No artifacts found");
        return Ok(());
    }

    // Keys are ordered by version first; group them by coordinates for display.
    let mut keys: Vec<_> = keys.into_iter().collect();
    keys.sort_by(|a, b| {
        (&a.classifier, &a.id, &a.version).cmp(&(&b.classifier, &b.id, &b.version))
    });

    for key in &keys {
        info!(
            "{}/{} {}",
            Colored(Blue, &key.classifier),
            Colored(Cyan, &key.id),
            Colored(Green, &key.version)
        );
    }
    info!("{} artifacts", keys.len());

    Ok(())
}

pub fn show_descriptors(ctx: &AppContext, artifact: &str) -> QuarryResult<()> {
    let key: ArtifactKey = artifact.parse()?;
    let provider = ctx.provider(&[])?;

    let descriptors = provider.descriptors_for(&key);
    if descriptors.is_empty() {
        return Err(QuarryError::NotFound(key.to_string()));
    }

    for descriptor in &descriptors {
        let repositories: Vec<_> = provider
            .repositories()
            .iter()
            .filter(|repo| repo.contains(descriptor))
            .map(|repo| repo.name())
            .collect();
        info!(
            "{} {}",
            Colored(Cyan, &descriptor.format),
            Colored(Blue, repositories.join(", "))
        );
    }

    Ok(())
}
