use futures_util::StreamExt;
use runtime::{LogHub, MicropsiConfig, Runtime};
use serde_json::Value;
use server::{router, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn next_line<S>(ws: &mut S) -> String
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let msg = timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for log line")
        .unwrap()
        .unwrap();
    let record: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
    record["line"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn log_socket_sends_backlog_then_new_lines() {
    let logs = LogHub::default();
    logs.push("booted");
    let runtime = Runtime::new(MicropsiConfig::default(), logs.clone());
    let app = router(AppState::new(Arc::new(Mutex::new(runtime)), logs.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let (mut ws, _) = connect_async(format!("ws://{addr}/logs")).await.unwrap();
    assert_eq!(next_line(&mut ws).await, "booted");

    // give the server a moment to reach the streaming loop
    tokio::time::sleep(Duration::from_millis(50)).await;
    logs.push("agent spawned");
    assert_eq!(next_line(&mut ws).await, "agent spawned");
}
