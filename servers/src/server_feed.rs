//! # Synthetic Sentiment Feed Server
//!
//! A stand-in for the real sentiment pipeline, used for demos and manual
//! testing of the stream client. Clients connect to `/ws`, send a
//! `{"track": "<query>"}` frame and receive a steady stream of synthetic
//! sentiment events for that query until they disconnect. A later track
//! frame switches the query in place.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use clap::Parser;
use futures_util::StreamExt;
use rand::Rng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use lib_stream::model::{SentimentEvent, TrackRequest};

#[derive(Parser, Debug, Clone)]
#[clap(about = "Synthetic sentiment feed server", version)]
struct Config {
    #[clap(
        long,
        env = "FEED_PORT",
        default_value_t = 8000,
        help = "Port to listen on for client connections."
    )]
    port: u16,

    #[clap(
        long,
        env = "FEED_EVENT_INTERVAL_MS",
        default_value_t = 500,
        help = "Milliseconds between synthetic events per connection."
    )]
    event_interval_ms: u64,
}

#[derive(Clone)]
struct FeedState {
    event_interval: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    let state = FeedState {
        event_interval: Duration::from_millis(config.event_interval_ms),
    };

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    log::info!("Feed server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<FeedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn health_handler() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "OK")
}

async fn handle_socket(mut socket: WebSocket, state: FeedState) {
    let mut tracking: Option<String> = None;
    let mut ticker = tokio::time::interval(state.event_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Handle incoming frames from the client
            msg = socket.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<TrackRequest>(text.as_str()) {
                            Ok(request) => {
                                log::info!("streaming events for query '{}'", request.track);
                                tracking = Some(request.track);
                            }
                            Err(err) => log::warn!("ignoring unrecognized client frame: {}", err),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        log::warn!("client socket error: {}", err);
                        break;
                    }
                }
            }
            // Emit the next synthetic event once a query is being tracked
            _ = ticker.tick(), if tracking.is_some() => {
                let query = tracking.as_deref().unwrap_or_default();
                let event = synth_event(query);
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break; // client disconnected
                        }
                    }
                    Err(err) => log::error!("failed to encode event: {}", err),
                }
            }
        }
    }

    log::info!("client disconnected");
}

/// One synthetic event for `query`: a polarity score in [-1, 1] and a
/// handful of tags weighted toward the tracked query.
fn synth_event(query: &str) -> SentimentEvent {
    const FILLER_TAGS: [&str; 5] = ["breaking", "live", "news", "viral", "trending"];

    let mut rng = rand::rng();
    let mut hashtags: HashMap<String, u64> = HashMap::new();
    hashtags.insert(format!("#{query}"), rng.random_range(1..=3));
    for _ in 0..rng.random_range(0..3) {
        let tag = FILLER_TAGS[rng.random_range(0..FILLER_TAGS.len())];
        *hashtags.entry(format!("#{tag}")).or_insert(0) += 1;
    }

    SentimentEvent {
        polarity: rng.random_range(-1.0..=1.0),
        hashtags,
        text: None,
        ts: Some(Utc::now().to_rfc3339()),
    }
}
