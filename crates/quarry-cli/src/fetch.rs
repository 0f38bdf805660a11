use std::{io, path::PathBuf};

use nu_ansi_term::Color::{Cyan, Green};
use quarry_core::{
    artifact::{ArtifactDescriptor, ArtifactFormat, ArtifactKey, ArtifactRef},
    error::QuarryError,
    policy::TransferPolicy,
    provider::CompositeProvider,
    sink::{ArtifactSink, FileSink, RawSink, StreamSink},
    status::StatusCode,
    QuarryResult,
};
use quarry_utils::{cancel::CancellationToken, fs::sanitize_file_name};
use tracing::info;

use crate::{cli::PolicyArg, context::AppContext, utils::Colored};

pub struct FetchOptions {
    pub output: Option<PathBuf>,
    pub raw: Option<String>,
    pub format: Option<String>,
    pub policy: Option<PolicyArg>,
}

/// Whether `output` names stdout.
pub fn is_stdout(output: Option<&PathBuf>) -> bool {
    output.is_some_and(|path| path.as_os_str() == "-")
}

fn target_for(key: &ArtifactKey, options: &FetchOptions) -> QuarryResult<ArtifactRef> {
    let format = options.raw.as_deref().or(options.format.as_deref());
    Ok(match format {
        Some(format) => {
            let format: ArtifactFormat = format.parse()?;
            ArtifactRef::Descriptor(ArtifactDescriptor::new(key.clone(), format))
        }
        None => ArtifactRef::Key(key.clone()),
    })
}

fn default_output(key: &ArtifactKey) -> PathBuf {
    PathBuf::from(sanitize_file_name(&format!("{}-{}", key.id, key.version)))
}

pub fn fetch_artifact(ctx: &AppContext, artifact: &str, options: FetchOptions) -> QuarryResult<()> {
    let key: ArtifactKey = artifact.parse()?;
    let target = target_for(&key, &options)?;

    let mut provider = ctx.provider(&[])?;
    if let Some(policy) = options.policy {
        provider = provider.with_policy(Some(match policy {
            PolicyArg::Local => TransferPolicy::Local,
            PolicyArg::Remote => TransferPolicy::Remote,
        }));
    }

    if is_stdout(options.output.as_ref()) {
        let sink = StreamSink::new(key.clone(), io::stdout());
        return run(&provider, sink, &target, options.raw.is_some(), ctx.cancel());
    }

    let path = options.output.unwrap_or_else(|| default_output(&key));
    let sink = FileSink::new(key.clone(), &path);
    run(&provider, sink, &target, options.raw.is_some(), ctx.cancel())?;

    info!(
        "{} {} to {}",
        Colored(Green, "Fetched"),
        Colored(Cyan, &target),
        path.display()
    );
    Ok(())
}

fn run<S: ArtifactSink>(
    provider: &CompositeProvider,
    mut sink: S,
    target: &ArtifactRef,
    raw: bool,
    cancel: &CancellationToken,
) -> QuarryResult<()> {
    let status = if raw {
        let ArtifactRef::Descriptor(descriptor) = target else {
            return Err(QuarryError::IllegalState(
                "raw fetch requires an explicit encoding".into(),
            ));
        };
        let mut sink = RawSink::new(sink, descriptor.clone())?;
        provider.fetch(&mut sink, target, cancel)?
    } else {
        provider.fetch(&mut sink, target, cancel)?
    };

    if status.is_success() {
        if !status.is_ok() {
            status.log();
        }
        return Ok(());
    }

    status.log();
    match status.code {
        Some(StatusCode::NotFound) => Err(QuarryError::NotFound(target.to_string())),
        _ => Err(QuarryError::Custom(status.message)),
    }
}
