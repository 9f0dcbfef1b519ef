use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use aero_intel::{
    config::Config,
    models::{AnalysisRequest, AnalyzeResponse, WorkflowResult},
    routes::create_router,
    utils::init_logger,
    AppState, WorkflowController,
};

#[derive(Parser)]
#[command(name = "aero-intel", version, about = "Competitive intelligence for aerospace products")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one analysis and write a PDF report
    Analyze {
        /// Honeywell product to analyze
        #[arg(long, default_value = "TFE731 Engine")]
        product: String,
        /// Free-text competitor description
        #[arg(long, default_value = "compare with Pratt & Whitney PW500")]
        competitor: String,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the HTTP API
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    let _log_guard = init_logger(&config.logging);
    info!("Configuration loaded: {:?}", config.server);

    match cli.command.unwrap_or(Command::Analyze {
        product: "TFE731 Engine".to_string(),
        competitor: "compare with Pratt & Whitney PW500".to_string(),
        json: false,
    }) {
        Command::Analyze {
            product,
            competitor,
            json,
        } => run_analysis(&config, product, competitor, json).await,
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_analysis(
    config: &Config,
    product: String,
    competitor: String,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let request = AnalysisRequest::new(product, competitor).map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let workflow = WorkflowController::from_config(config);
    info!(tools = ?workflow.enabled_tools(), "Starting analysis");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling analysis");
            on_interrupt.cancel();
        }
    });

    let result = workflow.run_cancellable(request, cancel).await;
    let complete = result.complete;

    if json {
        let response = AnalyzeResponse::from(result);
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to encode result")?
        );
    } else {
        print_summary(&result);
    }

    Ok(if complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(result: &WorkflowResult) {
    println!("Run {} finished in state {:?}", result.run_id, result.final_state);
    println!("Validation attempts: {}", result.attempts);

    if let Some(findings) = &result.findings {
        println!();
        println!("{}", findings.summary);
        println!("Confidence: {:.0}%", findings.confidence_score * 100.0);
        let sources: Vec<&str> = findings.data_sources_used.iter().map(String::as_str).collect();
        println!("Data sources: {}", sources.join(", "));
        if findings.degraded {
            println!("Note: some data sources were unavailable; results are based on partial data.");
        }

        if !findings.competitive_gaps.is_empty() {
            println!();
            println!("Competitive gaps:");
            for gap in &findings.competitive_gaps {
                println!("  [{:?}] {}: {} ({})", gap.impact, gap.category, gap.gap, gap.metric);
            }
        }
        if !findings.recommendations.is_empty() {
            println!();
            println!("Recommendations:");
            for recommendation in &findings.recommendations {
                println!("  - {}", recommendation);
            }
        }
    }

    println!();
    match (&result.report_path, &result.failure_reason) {
        (Some(path), _) => println!("Report written to {}", path),
        (None, Some(reason)) => println!("Analysis incomplete: {}", reason),
        (None, None) => println!("No report was produced"),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let workflow = WorkflowController::from_config(&config);
    info!(tools = ?workflow.enabled_tools(), "Enabled data sources");

    // Create shared state
    let state = AppState {
        config: config.clone(),
        workflow: Arc::new(workflow),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
