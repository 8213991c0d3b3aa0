//! HTML frontend integration tests.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use yambol::broker::Broker;
use yambol::config::{ConfigState, Configuration};
use yambol::frontend::FrontendServer;

struct TestServer {
    base_url: String,
    broker: Arc<Broker>,
    cancel: CancellationToken,
    _dir: TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn start_server(port: u16) -> TestServer {
    let dir = TempDir::new().unwrap();
    let mut config = Configuration::default();
    config.disable_auto_save = true;
    let state = Arc::new(ConfigState::new(config, dir.path().join("config.json")));
    let broker = Arc::new(Broker::new(state));
    let server = FrontendServer::new(Arc::clone(&broker), None).unwrap();

    let cancel = CancellationToken::new();
    let serve_cancel = cancel.clone();
    tokio::spawn(async move {
        server
            .listen_and_serve_insecure(port, serve_cancel)
            .await
            .unwrap();
    });

    let base_url = format!("http://127.0.0.1:{}", port);
    let http = reqwest::Client::new();
    for _ in 0..100 {
        if http.get(&base_url).send().await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    TestServer {
        base_url,
        broker,
        cancel,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_home_page_renders() {
    let server = start_server(21701).await;

    let response = reqwest::get(&server.base_url).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response
        .headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let body = response.text().await.unwrap();
    assert!(body.contains("Yambol"));
    assert!(body.contains(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn test_queues_page_lists_queues() {
    let server = start_server(21703).await;

    let body = reqwest::get(format!("{}/queues", server.base_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("No queues registered"));

    server.broker.add_default_queue("jobs").unwrap();
    server.broker.publish("one", &["jobs"]).unwrap();
    server.broker.consume("jobs").unwrap();

    let body = reqwest::get(format!("{}/queues", server.base_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("jobs"));
    assert!(body.contains("<td>1</td>"), "processed count rendered");
}

#[tokio::test]
async fn test_stylesheet_is_served() {
    let server = start_server(21705).await;

    let response = reqwest::get(format!("{}/static/style.css", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response
        .headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/css"));
    assert!(response.text().await.unwrap().contains("font-family"));
}
