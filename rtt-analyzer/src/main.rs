use anyhow::{bail, Context, Result};
use clap::Parser;
use rtt_analyzer::protocol::ProcessFileRequest;
use rtt_analyzer::{
    serve, wait_for_health, Cli, Command, Reporter, ServiceClient, Settings, TerminalReporter,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// How long client commands wait for the service to answer its health check.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    // Load settings and apply CLI overrides
    let mut settings = Settings::load_from(cli.config.as_deref())?;
    cli.apply_to_settings(&mut settings);
    debug!("Settings: {:?}", settings);

    match cli.command {
        Command::Serve { .. } => {
            let options = settings.service_options();
            info!("Data directory: {}", settings.data_dir().display());
            serve(options, settings.bind_addr())
                .await
                .context("Service failed")?;
        }
        Command::Analyze {
            files, output_dir, ..
        } => {
            let client = connect(&settings).await?;
            analyze(&client, files, output_dir).await?;
        }
        Command::History { all, .. } => {
            let client = connect(&settings).await?;
            let view = client.get_comparisons().await?;
            let reporter = TerminalReporter::new();
            if all {
                reporter.report_history(&view.all_rows, 0)?;
            } else {
                reporter.report_history(&view.rows, view.rows_offset())?;
            }
        }
        Command::Merge { indices, .. } => {
            let client = connect(&settings).await?;
            let merged = client.merge_rows(indices).await?;
            println!("Merged {} rows", merged);
        }
        Command::Delete { indices, .. } => {
            let client = connect(&settings).await?;
            let deleted = client.delete_rows(indices).await?;
            println!("Deleted {} rows", deleted);
        }
        Command::Clear { .. } => {
            let client = connect(&settings).await?;
            client.clear_comparisons().await?;
            println!("Comparison history cleared");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("rtt_analyzer=debug,rtt_analyzer_service=debug")
            .add_directive("tower_http=debug".parse()?),
        Err(_) => EnvFilter::new("rtt_analyzer=info,rtt_analyzer_service=info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

async fn connect(settings: &Settings) -> Result<ServiceClient> {
    let client = ServiceClient::connect(
        &settings.client.url,
        Duration::from_millis(settings.client.timeout_ms),
    )?;
    wait_for_health(&client, HEALTH_TIMEOUT)
        .await
        .context("Is the service running? Start it with `rtt-analyzer serve`")?;
    Ok(client)
}

/// Process files one after another; a failure does not stop the queue.
async fn analyze(
    client: &ServiceClient,
    files: Vec<PathBuf>,
    output_dir: Option<String>,
) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let reporter = TerminalReporter::new();
    let total = files.len();
    let mut failed = 0;

    for file in files {
        let path = cwd.join(&file);
        let mut request = ProcessFileRequest::new(path.display().to_string());
        if let Some(dir) = &output_dir {
            request = request.with_output_base_dir(dir);
        }

        match client.process_file(&request).await {
            Ok(result) => reporter.report(&result)?,
            Err(e) => {
                error!("{}: {}", file.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} files failed", failed, total);
    }
    Ok(())
}
