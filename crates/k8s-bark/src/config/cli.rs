use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use utils::version;

/// A service that watches a Kubernetes cluster's pods and pushes lifecycle
/// notifications to a Bark server.
#[derive(Parser)]
#[command(
    name = "k8s-bark",
    about,
    long_about,
    version = &**version::VERSION,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub watch: WatchArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the version of k8s-bark
    Version,
}

/// Where k8s-bark runs relative to the watched cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClusterLocation {
    /// Use the pod's service account
    InCluster,
    /// Use a kubeconfig file
    OutCluster,
}

#[derive(Args, Clone, Debug)]
pub struct WatchArgs {
    #[arg(value_enum, required = true, help = "Cluster location: in-cluster or out-cluster")]
    pub location: Option<ClusterLocation>,

    #[arg(
        short = 's',
        long,
        env = "BARK_SERVER_ADDRESS",
        help = "Bark server address, e.g. bark.example.com:8080 or https://bark.example.com"
    )]
    pub bark_server_address: Option<String>,

    #[arg(short = 't', long, env = "BARK_TOKEN", help = "Bark token")]
    pub bark_token: Option<String>,

    #[arg(
        short = 'n',
        long,
        env = "BARK_NAMESPACES",
        value_delimiter = ',',
        help = "Namespaces to watch (empty for all namespaces)"
    )]
    pub namespaces: Vec<String>,

    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file for out-cluster mode (defaults to ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(long, default_value = "5", help = "Seconds between notifier liveness probes")]
    pub health_interval_secs: u64,

    #[arg(long, default_value = "10", help = "Timeout in seconds for notifier requests")]
    pub request_timeout_secs: u64,

    #[arg(
        long,
        default_value = "60",
        help = "Seconds to wait for the initial pod listing before giving up"
    )]
    pub list_timeout_secs: u64,

    #[arg(
        long,
        default_value = "10",
        help = "Seconds between pod census log lines, 0 disables"
    )]
    pub census_interval_secs: u64,

    #[arg(
        long,
        env = "LOG_PATH",
        value_hint = clap::ValueHint::FilePath,
        help = "Also write logs to this file, rotated daily"
    )]
    pub log_path: Option<PathBuf>,
}
