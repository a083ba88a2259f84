pub mod cli;

use core::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use derive_more::Display;
use error_stack::Report;
use error_stack::ResultExt;
use url::Url;

pub use cli::*;

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display("cluster location must be in-cluster or out-cluster")]
    MissingLocation,
    #[display("--bark-server-address is required")]
    MissingServerAddress,
    #[display("--bark-token is required")]
    MissingToken,
    #[display("invalid Bark server address: {address}")]
    InvalidServerAddress { address: String },
    #[display("{name} must be greater than zero")]
    ZeroInterval { name: &'static str },
}

impl Error for ConfigError {}

/// Notifier endpoint settings.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub base_url: Url,
    pub token: String,
    pub request_timeout: Duration,
    pub probe_interval: Duration,
}

/// Validated runtime configuration, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub location: ClusterLocation,
    pub kubeconfig: Option<PathBuf>,
    /// Empty means every namespace.
    pub namespaces: Vec<String>,
    pub list_timeout: Duration,
    /// `None` disables the census.
    pub census_interval: Option<Duration>,
    pub notifier: NotifierConfig,
}

impl TryFrom<WatchArgs> for WatcherConfig {
    type Error = Report<ConfigError>;

    fn try_from(args: WatchArgs) -> Result<Self, Self::Error> {
        let location = args
            .location
            .ok_or_else(|| Report::new(ConfigError::MissingLocation))?;
        let address = args
            .bark_server_address
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| Report::new(ConfigError::MissingServerAddress))?;
        let token = args
            .bark_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Report::new(ConfigError::MissingToken))?;

        for (name, value) in [
            ("--health-interval-secs", args.health_interval_secs),
            ("--request-timeout-secs", args.request_timeout_secs),
            ("--list-timeout-secs", args.list_timeout_secs),
        ] {
            if value == 0 {
                return Err(Report::new(ConfigError::ZeroInterval { name }));
            }
        }

        let mut namespaces: Vec<String> = args
            .namespaces
            .into_iter()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .collect();
        namespaces.sort();
        namespaces.dedup();

        Ok(Self {
            location,
            kubeconfig: args.kubeconfig,
            namespaces,
            list_timeout: Duration::from_secs(args.list_timeout_secs),
            census_interval: (args.census_interval_secs > 0)
                .then(|| Duration::from_secs(args.census_interval_secs)),
            notifier: NotifierConfig {
                base_url: parse_server_address(&address)?,
                token,
                request_timeout: Duration::from_secs(args.request_timeout_secs),
                probe_interval: Duration::from_secs(args.health_interval_secs),
            },
        })
    }
}

/// Accepts `host[:port][/path]` (plain HTTP is assumed) or a full http(s) URL.
pub fn parse_server_address(address: &str) -> Result<Url, Report<ConfigError>> {
    let address = address.trim();
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };

    let invalid = || ConfigError::InvalidServerAddress {
        address: address.to_string(),
    };
    let url = Url::parse(&candidate).change_context_lazy(invalid)?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() || url.host().is_none()
    {
        return Err(Report::new(invalid()));
    }
    Ok(url)
}
