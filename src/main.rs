use clap::Parser;
use page_despeckle::config::{tool_description, Args, Config};
use page_despeckle::{Despeckler, FsWorkspace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.dump_json {
        println!("{}", serde_json::to_string_pretty(&tool_description())?);
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::try_from(args)?;

    tracing::info!("Starting page-despeckle v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Workspace {}: {} -> {},{} at {} level",
        config.workspace.display(),
        config.input_grp,
        config.output.page,
        config.output.image,
        config.parameters.level_of_operation.as_str()
    );

    let workspace = FsWorkspace::new(&config.workspace, &config.input_grp);
    let summary = Despeckler::new(&workspace, &config).run()?;

    tracing::info!(
        "Processed {} document(s), {} image(s) written, {} failed",
        summary.processed,
        summary.artifacts,
        summary.failed
    );

    if summary.failed > 0 {
        anyhow::bail!("{} document(s) could not be processed", summary.failed);
    }
    Ok(())
}
