//! End-to-end scenarios for the stream client against loopback stubs.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};

use lib_stream::{ClientOptions, ConnectionState, StreamClient, TrackRequest};
use project_tests::{accept_socket, bind_stub, next_text, probe, stub_url};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn delivers_parsed_frames_to_the_handler() -> Result<()> {
    let (listener, url) = bind_stub().await?;
    let (handler, mut rx) = probe();
    let client = StreamClient::connect(ClientOptions::new(url), handler);

    let mut server = timeout(WAIT, accept_socket(&listener)).await??;
    server
        .send(Message::text(
            r##"{"polarity":0.5,"hashtags":{"#loopback":2}}"##,
        ))
        .await?;

    let payload: Value = timeout(WAIT, rx.messages.recv())
        .await?
        .context("no message delivered")?;
    assert_eq!(payload["polarity"], 0.5);
    assert_eq!(payload["hashtags"]["#loopback"], 2);

    client.close();
    Ok(())
}

#[tokio::test]
async fn malformed_frame_is_dropped_and_the_stream_continues() -> Result<()> {
    let (listener, url) = bind_stub().await?;
    let (handler, mut rx) = probe();
    let client = StreamClient::connect(ClientOptions::new(url), handler);

    let mut server = timeout(WAIT, accept_socket(&listener)).await??;
    server.send(Message::text("{ this is not json")).await?;
    server.send(Message::text(r#"{"polarity":-0.7}"#)).await?;

    // Only the well-formed frame reaches the handler, and the client is
    // still alive to deliver it.
    let payload: Value = timeout(WAIT, rx.messages.recv())
        .await?
        .context("no message delivered")?;
    assert_eq!(payload["polarity"], -0.7);
    assert!(rx.messages.try_recv().is_err());

    client.close();
    Ok(())
}

#[tokio::test]
async fn sends_buffered_while_disconnected_arrive_in_order() -> Result<()> {
    // Reserve a port, then leave it dark so the first attempts fail.
    let parked = TcpListener::bind("127.0.0.1:0").await?;
    let addr = parked.local_addr()?;
    drop(parked);

    let (handler, _rx) = probe();
    let mut options = ClientOptions::new(stub_url(addr));
    options.reconnect_interval = Some(Duration::from_millis(100));
    let client = StreamClient::connect(options, handler);

    client.send(&TrackRequest::new("first"))?;
    client.send(&TrackRequest::new("second"))?;

    // Bring the endpoint up; the retry loop finds it and the buffered
    // frames drain oldest-first.
    let listener = TcpListener::bind(addr).await?;
    let mut server = timeout(WAIT, accept_socket(&listener)).await??;

    let first: Value = serde_json::from_str(
        &timeout(WAIT, next_text(&mut server))
            .await?
            .context("first buffered frame never arrived")?,
    )?;
    let second: Value = serde_json::from_str(
        &timeout(WAIT, next_text(&mut server))
            .await?
            .context("second buffered frame never arrived")?,
    )?;

    assert_eq!(first["track"], "first");
    assert_eq!(second["track"], "second");

    client.close();
    Ok(())
}

#[tokio::test]
async fn reconnects_once_after_a_remote_close() -> Result<()> {
    let (listener, url) = bind_stub().await?;
    let (handler, mut rx) = probe();
    let mut options = ClientOptions::new(url);
    options.reconnect_interval = Some(Duration::from_millis(100));
    let client = StreamClient::connect(options, handler);

    let mut server = timeout(WAIT, accept_socket(&listener)).await??;
    timeout(WAIT, rx.opens.recv())
        .await?
        .context("first open not observed")?;

    let closed_at = Instant::now();
    server
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "done".into(),
        }))
        .await?;
    while server.next().await.is_some() {}
    drop(server);

    // The remote's code and reason are forwarded to the close callback.
    let (code, reason) = timeout(WAIT, rx.closes.recv())
        .await?
        .context("close not observed")?;
    assert_eq!(code, Some(1000));
    assert_eq!(reason.as_deref(), Some("done"));

    // Exactly one new attempt, and only after the configured interval.
    let second = timeout(WAIT, accept_socket(&listener)).await??;
    assert!(closed_at.elapsed() >= Duration::from_millis(80));
    timeout(WAIT, rx.opens.recv())
        .await?
        .context("second open not observed")?;

    let extra = timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(extra.is_err(), "unexpected additional connection attempt");

    drop(second);
    client.close();
    Ok(())
}

#[tokio::test]
async fn stays_down_when_auto_reconnect_is_disabled() -> Result<()> {
    let (listener, url) = bind_stub().await?;
    let (handler, mut rx) = probe();
    let mut options = ClientOptions::new(url);
    options.auto_reconnect = false;
    let client = StreamClient::connect(options, handler);

    let mut server = timeout(WAIT, accept_socket(&listener)).await??;
    timeout(WAIT, rx.opens.recv())
        .await?
        .context("open not observed")?;

    server.close(None).await?;
    while server.next().await.is_some() {}

    let mut state = client.subscribe_state();
    timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Closed)).await??;

    let extra = timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(extra.is_err(), "client retried with auto-reconnect disabled");

    // The torn-down client rejects further sends.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.send(&TrackRequest::new("late")).is_err());
    Ok(())
}

#[tokio::test]
async fn close_cancels_a_pending_reconnect() -> Result<()> {
    // Dark endpoint plus a long fixed interval: the client parks on its
    // retry timer after the first failed attempt.
    let parked = TcpListener::bind("127.0.0.1:0").await?;
    let addr = parked.local_addr()?;
    drop(parked);

    let (handler, mut rx) = probe();
    let mut options = ClientOptions::new(stub_url(addr));
    options.reconnect_interval = Some(Duration::from_secs(5));
    let client = StreamClient::connect(options, handler);

    timeout(WAIT, rx.errors.recv())
        .await?
        .context("failed attempt not reported")?;

    client.close();

    // Teardown wins well before the 5s timer would have fired.
    let mut state = client.subscribe_state();
    timeout(
        Duration::from_secs(1),
        state.wait_for(|s| *s == ConnectionState::Closed),
    )
    .await??;
    Ok(())
}
