// End-to-end tests for the order lifecycle manager against a mock venue

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lighter_grid_bot::{FileConfigStore, OrderLifecycleManager, RunState, Side, TradingError};
use mockito::{Matcher, Mock, ServerGuard};
use rust_decimal_macros::dec;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use common::{test_config_toml, test_store, write_config};

async fn mock_ticker(server: &mut ServerGuard, price: &str) -> Mock {
    server
        .mock("GET", "/api/v1/ticker")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(format!(r#"{{"price": "{}"}}"#, price))
        .create_async()
        .await
}

async fn mock_cancel_all(server: &mut ServerGuard, status: usize) -> Mock {
    server
        .mock("POST", "/api/v1/orders/cancel-all")
        .with_status(status)
        .with_body("{}")
        .create_async()
        .await
}

async fn mock_open_orders(server: &mut ServerGuard, count: usize) -> Mock {
    let orders: Vec<String> = (0..count)
        .map(|i| format!(r#"{{"order_id": "ord-{}", "side": "buy", "price": "100"}}"#, i))
        .collect();
    server
        .mock("GET", "/api/v1/orders")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(format!("[{}]", orders.join(",")))
        .create_async()
        .await
}

/// Minimal venue that serves the ticker and cancel-all but hangs up on every
/// order placement. Returns the base URL and the number of placement attempts.
async fn spawn_dropping_venue() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let placements = Arc::new(AtomicUsize::new(0));

    let counter = placements.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream, counter.clone()));
        }
    });

    (format!("http://{}", addr), placements)
}

async fn serve_connection(mut stream: TcpStream, placements: Arc<AtomicUsize>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let request_line = head.lines().next().unwrap_or_default();
    if request_line.starts_with("POST /api/v1/order ") {
        placements.fetch_add(1, Ordering::SeqCst);
        return;
    }

    let body = if request_line.starts_with("GET /api/v1/ticker") {
        r#"{"price": "110"}"#
    } else {
        "{}"
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

#[tokio::test]
async fn test_places_full_ladder() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());

    let _mock = mock_ticker(&mut server, "110").await;
    let cancel = mock_cancel_all(&mut server, 200).await;
    let orders = server
        .mock("POST", "/api/v1/order")
        .with_status(200)
        .with_body(r#"{"order_id": "ord-1"}"#)
        .expect(4)
        .create_async()
        .await;

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(&store).await.expect("Failed to initialize");
    assert_eq!(manager.state(), RunState::Initializing);

    let placed = manager.place_grid_orders().await.unwrap();
    assert_eq!(placed, 4);
    assert_eq!(manager.state(), RunState::Monitoring);

    let levels: Vec<_> = manager
        .placed_orders()
        .iter()
        .map(|o| (o.level.price, o.level.side))
        .collect();
    assert_eq!(
        levels,
        vec![
            (dec!(100), Side::Buy),
            (dec!(105), Side::Buy),
            (dec!(115), Side::Sell),
            (dec!(120), Side::Sell),
        ]
    );

    let status = manager.handle().status();
    assert_eq!(status.ladder_size, Some(4));
    assert_eq!(status.placed_orders, 4);
    assert_eq!(status.reference_price, Some(dec!(110)));
    assert_eq!(status.symbol.as_deref(), Some("BTC/USDT"));

    orders.assert_async().await;
    cancel.assert_async().await;
}

#[tokio::test]
async fn test_failed_levels_are_skipped() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());

    let _mock = mock_ticker(&mut server, "110").await;
    let _mock = mock_cancel_all(&mut server, 200).await;
    let orders = server
        .mock("POST", "/api/v1/order")
        .with_status(400)
        .with_body(r#"{"error": "insufficient margin"}"#)
        .expect(4)
        .create_async()
        .await;

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(&store).await.unwrap();

    assert_eq!(manager.place_grid_orders().await.unwrap(), 0);
    assert_eq!(manager.state(), RunState::Monitoring);
    assert_eq!(manager.status().ladder_size, Some(4));
    orders.assert_async().await;
}

#[tokio::test]
async fn test_missing_order_id_is_not_recorded() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());

    let _mock = mock_ticker(&mut server, "110").await;
    let _mock = mock_cancel_all(&mut server, 200).await;
    let _mock = server
        .mock("POST", "/api/v1/order")
        .with_status(200)
        .with_body(r#"{"status": "ok"}"#)
        .create_async()
        .await;

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(&store).await.unwrap();

    assert_eq!(manager.place_grid_orders().await.unwrap(), 0);
    assert!(manager.placed_orders().is_empty());
}

#[tokio::test]
async fn test_regrid_when_too_few_orders_open() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());

    let _mock = mock_ticker(&mut server, "110").await;
    let _mock = mock_cancel_all(&mut server, 200).await;
    let orders = server
        .mock("POST", "/api/v1/order")
        .with_status(200)
        .with_body(r#"{"order_id": "ord-1"}"#)
        .expect(8)
        .create_async()
        .await;
    // 1 open of 4 placed is below the 0.5 threshold
    let listing = mock_open_orders(&mut server, 1).await;

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(&store).await.unwrap();
    manager.place_grid_orders().await.unwrap();

    assert!(manager.monitor_orders().await.unwrap());
    let status = manager.status();
    assert_eq!(status.regrid_count, 1);
    assert_eq!(status.last_open_orders, Some(1));
    assert_eq!(status.state, RunState::Monitoring);

    orders.assert_async().await;
    listing.assert_async().await;
}

#[tokio::test]
async fn test_no_regrid_while_enough_orders_open() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());

    let _mock = mock_ticker(&mut server, "110").await;
    let _mock = mock_cancel_all(&mut server, 200).await;
    let orders = server
        .mock("POST", "/api/v1/order")
        .with_status(200)
        .with_body(r#"{"order_id": "ord-1"}"#)
        .expect(4)
        .create_async()
        .await;
    let _mock = mock_open_orders(&mut server, 3).await;

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(&store).await.unwrap();
    manager.place_grid_orders().await.unwrap();

    assert!(!manager.monitor_orders().await.unwrap());
    assert_eq!(manager.status().regrid_count, 0);
    orders.assert_async().await;
}

#[tokio::test]
async fn test_price_failure_leaves_grid_ungenerated() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());

    let ticker = server
        .mock("GET", "/api/v1/ticker")
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(&store).await.unwrap();

    let err = manager.place_grid_orders().await.unwrap_err();
    assert!(matches!(err, TradingError::RetriesExhausted(_)), "{:?}", err);
    assert_eq!(manager.state(), RunState::Monitoring);
    assert_eq!(manager.status().ladder_size, None);
    ticker.assert_async().await;
}

#[tokio::test]
async fn test_monitor_failure_is_reported_not_fatal() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());

    let _mock = mock_ticker(&mut server, "110").await;
    let _mock = mock_cancel_all(&mut server, 200).await;
    let _mock = server
        .mock("POST", "/api/v1/order")
        .with_status(200)
        .with_body(r#"{"order_id": "ord-1"}"#)
        .create_async()
        .await;
    let _mock = server
        .mock("GET", "/api/v1/orders")
        .match_query(Matcher::Any)
        .with_status(403)
        .create_async()
        .await;

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(&store).await.unwrap();
    manager.place_grid_orders().await.unwrap();

    let err = manager.monitor_orders().await.unwrap_err();
    assert!(matches!(err, TradingError::ApiAuthentication(_)), "{:?}", err);
    assert_eq!(manager.state(), RunState::Monitoring);
    assert_eq!(manager.status().regrid_count, 0);
}

#[tokio::test]
async fn test_stop_reaches_stopped_when_cancel_fails() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());

    let _mock = mock_ticker(&mut server, "110").await;
    let _mock = server
        .mock("POST", "/api/v1/order")
        .with_status(200)
        .with_body(r#"{"order_id": "ord-1"}"#)
        .create_async()
        .await;
    let cancel = server
        .mock("POST", "/api/v1/orders/cancel-all")
        .with_status(404)
        .expect(2)
        .create_async()
        .await;

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(&store).await.unwrap();
    manager.place_grid_orders().await.unwrap();

    manager.stop().await.expect("stop should not fail");
    assert_eq!(manager.state(), RunState::Stopped);
    // Cancel failed, so the manager still remembers what it placed
    assert_eq!(manager.placed_orders().len(), 4);
    cancel.assert_async().await;

    // Stopping twice is harmless
    manager.stop().await.unwrap();
    assert_eq!(manager.state(), RunState::Stopped);
}

#[tokio::test]
async fn test_regrid_replaces_placed_orders_when_cancel_fails() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());

    let _mock = mock_ticker(&mut server, "110").await;
    let _mock = mock_cancel_all(&mut server, 404).await;
    let _mock = server
        .mock("POST", "/api/v1/order")
        .with_status(200)
        .with_body(r#"{"order_id": "ord-1"}"#)
        .create_async()
        .await;
    let _mock = mock_open_orders(&mut server, 0).await;

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(&store).await.unwrap();
    manager.place_grid_orders().await.unwrap();

    for _ in 0..3 {
        assert!(manager.monitor_orders().await.unwrap());
        let status = manager.status();
        let ladder_size = status.ladder_size.expect("ladder was generated");
        assert!(status.placed_orders <= ladder_size, "{:?}", status);
        assert_eq!(manager.placed_orders().len(), status.placed_orders);
    }

    assert_eq!(manager.placed_orders().len(), 4);
    assert_eq!(manager.status().regrid_count, 3);
}

#[tokio::test]
async fn test_network_failure_cools_down_between_levels() {
    let (base_url, placements) = spawn_dropping_venue().await;
    let content = test_config_toml(&base_url)
        .replace("max_retries = 1", "max_retries = 0")
        .replace("network_cooldown_secs = 0", "network_cooldown_secs = 1");
    let (_dir, path) = write_config(&content);
    let store = FileConfigStore::new(path).without_env();

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(&store).await.unwrap();

    let started = Instant::now();
    let placed = manager.place_grid_orders().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(placed, 0);
    assert_eq!(placements.load(Ordering::SeqCst), 4);
    // One cooldown after each of the first three levels, none after the last
    assert!(elapsed >= Duration::from_secs(3), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "{:?}", elapsed);
    assert_eq!(manager.state(), RunState::Monitoring);
}

#[tokio::test]
async fn test_stop_during_placement_halts_ladder() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());

    let mut manager = OrderLifecycleManager::new();
    let handle = manager.handle();

    let _mock = mock_ticker(&mut server, "110").await;
    let cancel = server
        .mock("POST", "/api/v1/orders/cancel-all")
        .with_status(200)
        .with_body("{}")
        .expect(2)
        .create_async()
        .await;
    let stopper = handle.clone();
    let orders = server
        .mock("POST", "/api/v1/order")
        .with_status(200)
        .with_body_from_request(move |_| {
            stopper.request_stop();
            br#"{"order_id": "ord-1"}"#.to_vec()
        })
        .expect(1)
        .create_async()
        .await;

    manager.initialize(&store).await.unwrap();
    let placed = manager.place_grid_orders().await.unwrap();

    assert_eq!(placed, 1);
    assert_eq!(manager.placed_orders().len(), 1);
    assert!(placed < manager.status().ladder_size.unwrap());
    assert_eq!(manager.state(), RunState::Monitoring);

    manager.stop().await.unwrap();
    assert_eq!(manager.state(), RunState::Stopped);
    assert!(handle.stop_requested());
    orders.assert_async().await;
    cancel.assert_async().await;
}

#[tokio::test]
async fn test_missing_credentials_is_fatal_before_network() {
    let content = test_config_toml("http://127.0.0.1:1").replace("api_secret = \"test-secret\"", "");
    let (_dir, path) = write_config(&content);
    let store = FileConfigStore::new(path).without_env();

    let mut manager = OrderLifecycleManager::new();
    let err = manager.initialize(&store).await.unwrap_err();

    assert!(matches!(err, TradingError::ConfigMissing(_)), "{:?}", err);
    assert!(err.is_config_error());
    assert_eq!(manager.state(), RunState::Stopped);
    assert!(matches!(manager.place_grid_orders().await, Err(TradingError::NotInitialized)));
}

#[tokio::test]
async fn test_missing_trading_section_is_fatal() {
    let content = test_config_toml("http://127.0.0.1:1");
    let api_only = content.split("[trading]").next().unwrap().to_string();
    let (_dir, path) = write_config(&api_only);
    let store = FileConfigStore::new(path).without_env();

    let mut manager = OrderLifecycleManager::new();
    let err = manager.initialize(&store).await.unwrap_err();
    assert!(matches!(err, TradingError::ConfigMissing(_)), "{:?}", err);
    assert_eq!(manager.state(), RunState::Stopped);
}

#[tokio::test]
async fn test_invalid_grid_is_fatal() {
    let content = test_config_toml("http://127.0.0.1:1").replace("upper_price = \"120\"", "upper_price = \"90\"");
    let (_dir, path) = write_config(&content);
    let store = FileConfigStore::new(path).without_env();

    let mut manager = OrderLifecycleManager::new();
    let err = manager.initialize(&store).await.unwrap_err();
    assert!(matches!(err, TradingError::ConfigValidation(_)), "{:?}", err);
    assert_eq!(manager.state(), RunState::Stopped);
}

#[tokio::test]
async fn test_run_until_stop_requested() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());

    let _mock = mock_ticker(&mut server, "110").await;
    let cancel = server
        .mock("POST", "/api/v1/orders/cancel-all")
        .with_status(200)
        .with_body("{}")
        .expect_at_least(2)
        .create_async()
        .await;
    let _mock = server
        .mock("POST", "/api/v1/order")
        .with_status(200)
        .with_body(r#"{"order_id": "ord-1"}"#)
        .create_async()
        .await;
    let _mock = mock_open_orders(&mut server, 4).await;

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(&store).await.unwrap();
    let handle = manager.handle();

    let task = tokio::spawn(async move {
        manager.run().await?;
        Ok::<_, TradingError>(manager)
    });

    tokio::time::timeout(Duration::from_secs(10), handle.wait_for_state(RunState::Monitoring))
        .await
        .expect("manager never reached Monitoring")
        .unwrap();
    handle.request_stop();

    let manager = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("run did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(manager.state(), RunState::Stopped);
    assert_eq!(handle.state(), RunState::Stopped);
    assert!(manager.placed_orders().is_empty());
    cancel.assert_async().await;
}

#[tokio::test]
async fn test_reinitialize_after_stop() {
    let mut server = mockito::Server::new_async().await;
    let (_dir, store) = test_store(&server.url());
    let _mock = mock_cancel_all(&mut server, 200).await;

    let mut manager = OrderLifecycleManager::new();
    let handle = manager.handle();
    manager.initialize(&store).await.unwrap();
    let first_run = manager.run_id();

    handle.request_stop();
    manager.run().await.unwrap();
    assert_eq!(manager.state(), RunState::Stopped);

    manager.initialize(&store).await.unwrap();
    assert_eq!(manager.state(), RunState::Initializing);
    assert_ne!(manager.run_id(), first_run);
    assert!(!handle.stop_requested());
}
