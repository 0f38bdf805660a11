use std::{fs, path::PathBuf};

use clap::Parser;
use cli::{Args, Commands};
use context::AppContext;
use fetch::{fetch_artifact, is_stdout, FetchOptions};
use logging::setup_logging;
use quarry_config::config::{config_path, generate_default_config, Config};
use quarry_core::{error::ErrorContext, QuarryResult};
use query::{query_artifacts, show_descriptors};
use repository::{load_repositories, translate_repositories};
use tracing::info;
use utils::set_color;

mod cli;
mod context;
mod fetch;
mod logging;
mod query;
mod repository;
mod utils;

fn config_file(args: &Args) -> PathBuf {
    args.config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(config_path)
}

fn print_config(args: &Args) -> QuarryResult<()> {
    let path = config_file(args);
    let content = if path.exists() {
        fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?
    } else {
        info!("No configuration at {}, showing defaults", path.display());
        Config::default_config().to_annotated_document()?.to_string()
    };
    println!("{content}");
    Ok(())
}

fn handle_cli() -> QuarryResult<()> {
    let args = Args::parse();

    let stdout_is_data = matches!(
        &args.command,
        Commands::Fetch { output, .. } if is_stdout(output.as_ref())
    );
    setup_logging(&args, stdout_is_data);

    if args.no_color {
        set_color(false);
    }

    match &args.command {
        Commands::DefConfig => {
            let path = config_file(&args);
            generate_default_config(&path)?;
            return Ok(());
        }
        Commands::Config => return print_config(&args),
        _ => {}
    }

    let ctx = AppContext::new(&args)?;

    match args.command {
        Commands::Query {
            query,
            repo,
        } => query_artifacts(&ctx, &query, &repo.unwrap_or_default())?,
        Commands::Descriptors {
            artifact,
        } => show_descriptors(&ctx, &artifact)?,
        Commands::Fetch {
            artifact,
            output,
            raw,
            format,
            policy,
        } => {
            fetch_artifact(
                &ctx,
                &artifact,
                FetchOptions {
                    output,
                    raw,
                    format,
                    policy,
                },
            )?
        }
        Commands::Translate {
            repositories,
        } => translate_repositories(&ctx, &repositories)?,
        Commands::Load {
            repositories,
        } => load_repositories(&ctx, &repositories)?,
        Commands::DefConfig | Commands::Config => {}
    }

    Ok(())
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli() {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
