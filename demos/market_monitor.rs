//! Live console monitor for an AEX backend.
//!
//! ```text
//! AEX_API_URL=http://localhost:8000 RUST_LOG=aex_sync=debug cargo run --example market_monitor
//! ```

use aex_sync::{MarketClient, SyncConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // 1. Setup
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SyncConfig::from_env();
    println!("🚀 Starting AEX market monitor against {}", config.api_url);

    // 2. Start syncing
    let client = MarketClient::start(config).expect("Invalid API URL");
    let mut views = client.subscribe();

    let mut last_connection = None;
    let mut last_tick = None;
    let mut last_event_id = 0;

    println!("📡 Listening for market updates (Ctrl-C to quit)...");

    // 3. The Loop
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n👋 Shutting down...");
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();

                if last_connection != Some(view.connection) {
                    println!("🔌 Connection: {}", view.connection);
                    last_connection = Some(view.connection);
                }

                if view.is_loaded() && last_tick != Some(view.metrics.tick_number) {
                    let movers: Vec<String> = view
                        .top_movers(3)
                        .into_iter()
                        .map(|entry| {
                            format!("{} {:+.2}%", entry.id(), entry.price_change_pct().unwrap_or_default())
                        })
                        .collect();
                    println!(
                        "📈 Tick {} | cap {:.0} | cascade {:.1}% | shocks {} | {}{}",
                        view.metrics.tick_number,
                        view.metrics.total_market_cap,
                        view.metrics.cascade_probability * 100.0,
                        view.metrics.active_shocks,
                        movers.join(", "),
                        if view.is_live() { "" } else { " (stale)" }
                    );
                    last_tick = Some(view.metrics.tick_number);
                }

                // Events are newest first
                let since = last_event_id;
                for record in view.events.iter().rev().filter(|r| r.id > since) {
                    println!("📝 {}", record);
                    last_event_id = record.id;
                }
            }
        }
    }

    client.teardown().await;
}
