use std::sync::Arc;

use quarry_config::config::{config_path, Config};
use quarry_core::{
    error::QuarryError,
    policy::TransferPolicy,
    provider::CompositeProvider,
    remote::load_repositories,
    status::{Severity, Status},
    QuarryResult,
};
use quarry_dl::{
    http_client::ClientConfig,
    transport::{DefaultTransport, Transport},
};
use quarry_events::{EventSinkHandle, TracingSink};
use quarry_registry::{manager::RepositoryManager, mirror::RepositoryLocation};
use quarry_utils::cancel::CancellationToken;
use tracing::debug;
use ureq::http::{HeaderMap, HeaderName, HeaderValue};

use crate::cli::Args;

/// Everything a command needs, built once from the arguments and the
/// configuration file.
pub struct AppContext {
    config: Config,
    transport: Arc<dyn Transport>,
    manager: RepositoryManager,
    events: EventSinkHandle,
    cancel: CancellationToken,
}

impl AppContext {
    pub fn new(args: &Args) -> QuarryResult<Self> {
        let mut config = match &args.config {
            Some(path) => Config::load(path)?,
            None => Config::new()?,
        };
        if args.offline {
            config.offline = Some(true);
        }

        let client = client_config(&config, args)?;
        let transport: Arc<dyn Transport> = Arc::new(DefaultTransport::new(&client));
        let events: EventSinkHandle = Arc::new(TracingSink);
        let manager =
            RepositoryManager::from_config(&config, transport.clone())?.with_events(events.clone());

        Ok(Self {
            config,
            transport,
            manager,
            events,
            cancel: CancellationToken::new(),
        })
    }

    pub fn manager(&self) -> &RepositoryManager {
        &self.manager
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Locations of the named repositories, or of every enabled one when
    /// `names` is empty.
    pub fn locations(&self, names: &[String]) -> QuarryResult<Vec<RepositoryLocation>> {
        let repositories: Vec<_> = if names.is_empty() {
            self.config.enabled_repositories().collect()
        } else {
            names
                .iter()
                .map(|name| {
                    self.config.get_repository(name).ok_or_else(|| {
                        QuarryError::Custom(format!("Repository '{name}' is not configured or disabled"))
                    })
                })
                .collect::<QuarryResult<_>>()?
        };

        if repositories.is_empty() {
            return Err(QuarryError::Custom(format!(
                "No repositories configured. Add one to {}",
                config_path().display()
            )));
        }

        repositories
            .into_iter()
            .map(|repo| Ok(RepositoryLocation::parse(&repo.name, &repo.url)?))
            .collect()
    }

    /// Loads the named repositories and combines them in priority order.
    ///
    /// Repositories that fail to load are reported and left out; it is an
    /// error only when none of them could be loaded.
    pub fn provider(&self, names: &[String]) -> QuarryResult<CompositeProvider> {
        let locations = self.locations(names)?;
        let (repositories, status) =
            load_repositories(&self.manager, &locations, self.transport.clone(), &self.cancel);
        report_load(&status)?;

        debug!("loaded {} repositories", repositories.len());
        Ok(CompositeProvider::new(repositories)
            .with_policy(TransferPolicy::from_setting(self.config.get_transfer_policy()))
            .with_max_mirror_attempts(self.config.get_max_mirror_attempts())
            .with_events(self.events.clone()))
    }
}

fn report_load(status: &Status) -> QuarryResult<()> {
    match status.severity {
        Severity::Ok => Ok(()),
        Severity::Warning => {
            status.log();
            Ok(())
        }
        Severity::Error | Severity::Cancel => {
            status.log();
            Err(QuarryError::Custom(status.message.clone()))
        }
    }
}

fn client_config(config: &Config, args: &Args) -> QuarryResult<ClientConfig> {
    let proxy = args
        .proxy
        .as_deref()
        .map(|proxy| {
            ureq::Proxy::new(proxy)
                .map_err(|err| QuarryError::Custom(format!("Invalid proxy '{proxy}': {err}")))
        })
        .transpose()?;

    let headers = args.header.as_deref().map(parse_headers).transpose()?;

    Ok(ClientConfig {
        user_agent: Some(
            args.user_agent
                .clone()
                .unwrap_or_else(|| config.get_user_agent()),
        ),
        headers,
        proxy,
        timeout: config.get_timeout(),
    })
}

/// Parses `name: value` pairs into a header map.
pub fn parse_headers(headers: &[String]) -> QuarryResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for header in headers {
        let (name, value) = header.split_once(':').ok_or_else(|| {
            QuarryError::Custom(format!("Invalid header '{header}', expected 'name: value'"))
        })?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|err| QuarryError::Custom(format!("Invalid header name in '{header}': {err}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|err| QuarryError::Custom(format!("Invalid header value in '{header}': {err}")))?;
        map.append(name, value);
    }
    Ok(map)
}
