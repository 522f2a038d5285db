mod config;
mod llm;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")))
        .init();

    let config = config::RelayConfig::from_env();
    let port = config.port;

    // Non-fatal: the relay still boots and answers 500 on chat requests.
    let llm: Option<Arc<dyn llm::LlmStream>> = match llm::LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(provider = client.provider(), model = client.model(), "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured; chat requests will fail");
            None
        }
    };

    tracing::info!(
        profile = %config.profile_path.display(),
        subject = %config.persona.name,
        forward_history = config.forward_history,
        "relay configured"
    );

    let state = state::AppState::new(llm, config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "resume chat relay listening");
    axum::serve(listener, app).await.expect("server failed");
}
