use std::sync::Arc;

use clap::Parser;
use secrecy::SecretString;

use remark_engine::tools::DEFAULT_COMMENTS_URL;
use remark_engine::{AgentDefinition, RunnerConfig};
use remark_llm::OpenAiModel;
use remark_server::ServerConfig;

/// Streaming chat server that answers questions about comments.
#[derive(Parser)]
#[command(name = "remark", version)]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// OpenAI model to use.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Base URL of the comments API.
    #[arg(long, default_value = DEFAULT_COMMENTS_URL)]
    comments_url: String,

    /// Maximum tool rounds per request.
    #[arg(long, default_value_t = 5)]
    max_tool_rounds: u32,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let api_key: SecretString = std::env::var("OPENAI_API_KEY")
        .expect("OPENAI_API_KEY must be set")
        .into();

    let model = Arc::new(OpenAiModel::new(api_key, Some(&args.model)));
    let agent = Arc::new(
        AgentDefinition::comments(model, &args.comments_url)
            .expect("Failed to build comments agent"),
    );

    let runner_config = RunnerConfig {
        max_tool_rounds: args.max_tool_rounds,
        ..Default::default()
    };
    let config = ServerConfig {
        port: args.port,
        ..Default::default()
    };

    let handle = remark_server::start(config, agent, runner_config)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, model = %args.model, "comments agent ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
