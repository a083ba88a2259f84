use anyhow::Result;
use clap::Parser;
use k8s_bark::app::ApplicationBuilder;
use k8s_bark::config::Cli;
use k8s_bark::config::Commands;
use k8s_bark::config::WatchArgs;
use k8s_bark::config::WatcherConfig;
use utils::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("{}", &**version::VERSION);
            Ok(())
        }
        None => run_watch(cli.watch).await,
    }
}

async fn run_watch(args: WatchArgs) -> Result<()> {
    let _guard = logging::init(args.log_path.clone());

    let config = WatcherConfig::try_from(args)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e:?}"))?;

    tracing::info!(
        location = ?config.location,
        notifier = %config.notifier.base_url,
        namespaces = ?config.namespaces,
        "Starting k8s-bark {}",
        &**version::VERSION
    );

    let app = ApplicationBuilder::new(config).build().await?;
    app.run().await
}
