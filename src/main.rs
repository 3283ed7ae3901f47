//! Feedback Agent - interactive demo of feedback-driven prompting

use feedback_agent::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Rustls 0.23+ needs a process-wide crypto provider for HTTPS
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install Rustls crypto provider");

    // WARN by default; RUST_LOG=feedback_agent=debug for detail
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    cli::run().await
}
