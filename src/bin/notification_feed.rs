//! Follows a subject's notification feed over the push gateway, falling
//! back to HTTP polling when push delivery degrades.

use anyhow::Context;
use livelink::{ConnectionManager, LinkError, ManagerConfig, WebSocketTransport};
use rollcall::FeedSettings;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = FeedSettings::from_env().context("loading feed settings")?;
    info!(
        "starting notification feed for subject '{}'",
        settings.subject_id
    );

    let config = ManagerConfig {
        heartbeat_interval: settings.heartbeat_interval,
        fallback_polling_interval: settings.fallback_polling_interval,
        ..ManagerConfig::default()
    };
    let manager = ConnectionManager::new(WebSocketTransport::new(&settings.ws_url), config);

    let status_sub = manager.on_status_change(|status| {
        info!(
            "connection {} (attempts: {}, fallback: {})",
            status.state, status.reconnect_attempts, status.fallback_active
        );
    });
    let message_sub = manager.on_message(|payload| {
        info!("notification: {}", payload);
    });

    let http = reqwest::Client::new();
    let refresh_url = format!(
        "{}/notifications?subject={}",
        settings.api_url.trim_end_matches('/'),
        settings.subject_id
    );
    manager.set_fallback_callback(move || {
        let http = http.clone();
        let refresh_url = refresh_url.clone();
        async move {
            let response = http
                .get(&refresh_url)
                .send()
                .await
                .map_err(|e| LinkError::Refresh(e.to_string()))?;
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| LinkError::Refresh(e.to_string()))?;
            info!(
                "fallback refresh fetched {} notifications",
                body.as_array().map_or(0, Vec::len)
            );
            Ok(())
        }
    });

    manager.connect(settings.subject_id.clone()).await;

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    manager.disconnect().await;
    status_sub.unsubscribe();
    message_sub.unsubscribe();
    Ok(())
}
