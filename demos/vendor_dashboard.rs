//! Vendor dashboard feed: connects to the analytics channel and logs what arrives.
//!
//! Reads the base URL from `MARKETPLACE_WS_URL` (default `ws://localhost:8000`) and the
//! token from `MARKETPLACE_ACCESS_TOKEN`:
//! ```sh
//! MARKETPLACE_ACCESS_TOKEN=... RUST_LOG=info,marketplace_realtime=debug \
//!     cargo run --example vendor_dashboard -- vendor-42
//! ```

use std::sync::Arc;
use std::time::Duration;

use marketplace_realtime::analytics::events::{ClientEvent, EventKind};
use marketplace_realtime::analytics::{Client, InMemoryStore};
use marketplace_realtime::auth::EnvToken;
use marketplace_realtime::ws::config::Config;
use marketplace_realtime::{WS_BASE_URL_VAR, analytics_endpoint};
use tokio::time::{interval, timeout};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let base_url =
        std::env::var(WS_BASE_URL_VAR).unwrap_or_else(|_| "ws://localhost:8000".to_owned());
    let vendor_id = std::env::args().nth(1);

    let store = Arc::new(InMemoryStore::new());
    let client = Client::new(
        &analytics_endpoint(&base_url),
        Config::default(),
        Arc::new(EnvToken::default()),
        Arc::clone(&store) as _,
    )?;

    client.on(EventKind::NewOrder, |event: &ClientEvent| {
        if let ClientEvent::NewOrder(order) = event {
            info!(
                order_id = ?order.order_id,
                amount_cop = %order.amount,
                category = ?order.category,
                "New order"
            );
        }
    });
    client.on(EventKind::AuthenticationFailed, |_: &ClientEvent| {
        warn!("Token rejected, log in again");
    });
    client.on(EventKind::MaxReconnectAttemptsReached, |_: &ClientEvent| {
        warn!("Giving up on the live feed, refresh to retry");
    });

    client.connect(vendor_id.as_deref());

    let mut report = interval(Duration::from_secs(10));
    report.tick().await;
    loop {
        tokio::select! {
            _ = report.tick() => {
                let health = client.connection_health();
                let analytics = store.analytics();
                info!(
                    state = %health.state,
                    healthy = health.healthy,
                    latency_ms = health.average_latency_ms,
                    queued = health.queued_messages,
                    orders = store.realtime_orders().len(),
                    top_products = analytics.top_products.len(),
                    "Dashboard"
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let mut state = client.state_receiver();
    client.disconnect();
    // Let the close frame go out before the runtime shuts down.
    _ = timeout(
        Duration::from_secs(2),
        state.wait_for(|snapshot| !snapshot.state.is_connected()),
    )
    .await;
    Ok(())
}
