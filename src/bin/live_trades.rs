//! Binary to connect to the live trade feed, subscribe to the symbols given on
//! the command line, and print trade updates for a fixed window.
//!
//! # Usage
//!
//! ```sh
//! export FINNHUB_TOKEN="your-api-token"
//! cargo run --bin live_trades --features cli -- btc eth BINANCE:SOLUSDT
//! ```

use std::env;
use std::time::Duration;

use coinfeed_rs::FeedClient;
use coinfeed_rs::types::ConnectionState;
use tokio::time;

#[tokio::main]
async fn main() -> coinfeed_rs::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let token = env::var("FINNHUB_TOKEN").expect("set FINNHUB_TOKEN env var before running");
    let mut symbols: Vec<String> = env::args().skip(1).collect();
    if symbols.is_empty() {
        symbols = vec!["btc".into(), "eth".into()];
    }

    let client = FeedClient::builder(token).build()?;
    for input in &symbols {
        let symbol = client.subscribe(input)?;
        println!("Subscribing to {symbol}…");
    }

    println!("Connecting to trade feed…");
    client.connect()?;

    let mut notices = client.notices();
    let mut state = client.state_changes();
    let mut tick = time::interval(Duration::from_secs(1));

    println!("Listening for trades for 30 seconds…\n");
    let deadline = time::sleep(Duration::from_secs(30));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                println!("\n30 seconds elapsed, disconnecting…");
                break;
            }
            Ok(()) = state.changed() => {
                let current = *state.borrow_and_update();
                println!("[state] {current}");
                if current == ConnectionState::Failed {
                    break;
                }
            }
            Ok(notice) = notices.recv() => {
                println!("[{:?}] {}", notice.kind, notice.message);
            }
            _ = tick.tick() => {
                for symbol in client.subscriptions() {
                    match client.trades().get(&symbol) {
                        Some(trade) => {
                            let at = trade
                                .observed_at_utc()
                                .map(|t| t.format("%H:%M:%S%.3f").to_string())
                                .unwrap_or_default();
                            println!("{symbol:<20} {:>14} vol {:<12} {at}", trade.price, trade.volume);
                        }
                        None => println!("{symbol:<20} waiting for data…"),
                    }
                }
            }
        }
    }

    client.close();
    println!("Done.");

    Ok(())
}
