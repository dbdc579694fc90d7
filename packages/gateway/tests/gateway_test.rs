//! Integration tests for the gateway, served in-process on an ephemeral port.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use kairo_gateway::{
    config::GatewayConfig,
    domain::{NotificationId, NotificationType, UserId},
    ui::{Server, state::AppState},
};
use kairo_shared::time::SystemClock;
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message, client::IntoClientRequest, http::HeaderValue},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Helper struct to manage the in-process server lifecycle
struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let mut config = GatewayConfig::default();
        config.rate_limit.capacity = 10_000.0;
        Self::start_with(config).await
    }

    async fn start_with(config: GatewayConfig) -> Self {
        let state = Arc::new(AppState::from_config(&config, Arc::new(SystemClock)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, signal) = oneshot::channel::<()>();

        let server = Server::new(state.clone(), config.rate_limit.idle_ttl);
        let task = tokio::spawn(async move {
            let _ = server
                .serve(listener, async {
                    let _ = signal.await;
                })
                .await;
        });

        TestServer {
            addr,
            state,
            shutdown: Some(shutdown),
            task,
        }
    }

    fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn connect(&self, path: &str, user: &str) -> WsStream {
        let mut request = format!("ws://{}{}", self.addr, path)
            .into_client_request()
            .unwrap();
        request
            .headers_mut()
            .insert("X-User-Id", HeaderValue::from_str(user).unwrap());
        let (stream, _) = connect_async(request).await.unwrap();
        stream
    }

    async fn add_notification(&self, user: &str, content: &str) -> String {
        self.add_notification_of(user, NotificationType::Follow, content).await
    }

    async fn add_notification_of(
        &self,
        user: &str,
        kind: NotificationType,
        content: &str,
    ) -> String {
        self.state
            .notifications
            .add(
                &UserId::new(user.to_string()).unwrap(),
                kind,
                content,
                &json!({"source": "test"}),
            )
            .await
            .unwrap()
            .to_string()
    }

    async fn unread_count(&self, user: &str) -> usize {
        self.state
            .notifications
            .unread_count(&UserId::new(user.to_string()).unwrap())
            .await
    }

    /// Polls until `user` has `expected` unread notifications, returning the last observed count
    async fn wait_unread(&self, user: &str, expected: usize) -> usize {
        let mut count = self.unread_count(user).await;
        for _ in 0..50 {
            if count == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            count = self.unread_count(user).await;
        }
        count
    }

    async fn connections(&self) -> usize {
        self.state
            .notification_hub
            .snapshot()
            .await
            .unwrap()
            .connections
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task.abort();
    }
}

/// Next JSON text frame, skipping control frames
async fn recv_json(ws: &mut WsStream) -> Value {
    loop {
        let message = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_health_check() {
    // テスト項目: ヘルスチェックが ok を返す
    // given (前提条件):
    let server = TestServer::start().await;

    // when (操作):
    let response = reqwest::get(server.http("/api/health")).await.unwrap();

    // then (期待する結果):
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_notification_socket_receives_welcome_and_live_push() {
    // テスト項目: 接続時に connection_established を受け取り、その後の通知がライブ配信される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut ws = server.connect("/ws/notifications", "alice").await;
    let welcome = recv_json(&mut ws).await;

    // when (操作):
    let id = server.add_notification("alice", "bob followed you").await;
    let pushed = recv_json(&mut ws).await;

    // then (期待する結果):
    assert_eq!(welcome["type"], "connection_established");
    assert_eq!(welcome["user_id"], "alice");
    assert_eq!(pushed["type"], "notification");
    assert_eq!(pushed["notification"]["id"], id.as_str());
    assert_eq!(pushed["notification"]["type"], "follow");
    assert_eq!(pushed["notification"]["content"], "bob followed you");
    assert_eq!(pushed["notification"]["read"], false);
}

#[tokio::test]
async fn test_unread_bundle_sent_after_welcome() {
    // テスト項目: 接続前に溜まった未読通知が connection_established の直後にまとめて届く
    // given (前提条件):
    let server = TestServer::start().await;
    server.add_notification("alice", "first").await;
    server.add_notification("alice", "second").await;

    // when (操作):
    let mut ws = server.connect("/ws/notifications", "alice").await;
    let welcome = recv_json(&mut ws).await;
    let bundle = recv_json(&mut ws).await;

    // then (期待する結果):
    assert_eq!(welcome["type"], "connection_established");
    assert_eq!(bundle["type"], "notification_bundle");
    let contents: Vec<&str> = bundle["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["first", "second"]);
}

#[tokio::test]
async fn test_disconnected_user_keeps_notifications_in_log() {
    // テスト項目: 切断後に追加された通知は配信されないが、一覧には残る
    // given (前提条件):
    let server = TestServer::start().await;
    let mut ws = server.connect("/ws/notifications", "alice").await;
    recv_json(&mut ws).await;
    ws.close(None).await.unwrap();
    for _ in 0..50 {
        if server.connections().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // when (操作):
    server.add_notification("alice", "while away").await;
    let response = reqwest::Client::new()
        .get(server.http("/api/notifications"))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(server.connections().await, 0);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["pagination"]["total_count"], 1);
    assert_eq!(body["notifications"][0]["content"], "while away");
}

#[tokio::test]
async fn test_list_and_mark_read_over_http() {
    // テスト項目: HTTP で一覧取得・既読化ができ、未知の ID は 200、不正な形式の ID は 400 になる
    // given (前提条件):
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let first = server.add_notification("alice", "one").await;
    server.add_notification("alice", "two").await;
    server.add_notification("alice", "three").await;

    // when (操作):
    let marked = client
        .post(server.http(&format!("/api/notifications/{}/read", first)))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap();
    let unknown = client
        .post(server.http(&format!(
            "/api/notifications/{}/read",
            NotificationId::generate()
        )))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap();
    let malformed = client
        .post(server.http("/api/notifications/not-a-uuid/read"))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap();
    let page: Value = client
        .get(server.http("/api/notifications?limit=2&offset=0"))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(marked.status(), 200);
    assert_eq!(unknown.status(), 200);
    let unknown: Value = unknown.json().await.unwrap();
    assert_eq!(unknown["success"], true);
    assert_eq!(malformed.status(), 400);
    let error: Value = malformed.json().await.unwrap();
    assert_eq!(error["success"], false);
    assert_eq!(error["code"], "INVALID_NOTIFICATION_ID");

    assert_eq!(page["pagination"]["per_page"], 2);
    assert_eq!(page["pagination"]["total_count"], 3);
    assert_eq!(page["unread_count"], 2);
    assert_eq!(page["notifications"][0]["read"], true);
    assert_eq!(page["notifications"][1]["content"], "two");
}

#[tokio::test]
async fn test_mentions_endpoint_filters_by_kind() {
    // テスト項目: メンション一覧はメンション通知だけを 1 ページで返す
    // given (前提条件):
    let server = TestServer::start().await;
    server.add_notification("alice", "bob followed you").await;
    let mention = server
        .add_notification_of("alice", NotificationType::Mention, "@alice look")
        .await;
    server
        .add_notification_of("bob", NotificationType::Mention, "@bob look")
        .await;

    // when (操作):
    let response = reqwest::Client::new()
        .get(server.http("/api/notifications/mentions"))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let mentions = body["mentions"].as_array().unwrap();
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0]["id"], mention.as_str());
    assert_eq!(mentions[0]["type"], "mention");
    assert_eq!(body["pagination"]["total_count"], 1);
    assert_eq!(body["pagination"]["per_page"], 50);
}

#[tokio::test]
async fn test_mark_all_read_over_websocket() {
    // テスト項目: WebSocket の mark_all_read で全件既読になる
    // given (前提条件):
    let server = TestServer::start().await;
    server.add_notification("alice", "one").await;
    server.add_notification("alice", "two").await;
    let mut ws = server.connect("/ws/notifications", "alice").await;
    recv_json(&mut ws).await;
    recv_json(&mut ws).await;

    // when (操作):
    ws.send(Message::text(r#"{"type":"mark_all_read"}"#))
        .await
        .unwrap();
    let unread = server.wait_unread("alice", 0).await;

    // then (期待する結果):
    assert_eq!(unread, 0);
}

#[tokio::test]
async fn test_mark_read_frame_over_websocket() {
    // テスト項目: WebSocket の mark_read フレームで指定した通知だけが既読になる
    // given (前提条件):
    let server = TestServer::start().await;
    let first = server.add_notification("alice", "one").await;
    server.add_notification("alice", "two").await;
    let mut ws = server.connect("/ws/notifications", "alice").await;
    recv_json(&mut ws).await;
    recv_json(&mut ws).await;

    // when (操作):
    let frame = json!({"type": "mark_read", "notification_id": first});
    ws.send(Message::text(frame.to_string())).await.unwrap();
    let unread = server.wait_unread("alice", 1).await;

    // then (期待する結果):
    assert_eq!(unread, 1);
    let page: Value = reqwest::Client::new()
        .get(server.http("/api/notifications"))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["notifications"][0]["read"], true);
    assert_eq!(page["notifications"][1]["read"], false);
}

#[tokio::test]
async fn test_unparseable_frames_keep_connection_open() {
    // テスト項目: 解釈できないフレームは無視され、接続はそのまま通知を受け取り続ける
    // given (前提条件):
    let server = TestServer::start().await;
    server.add_notification("alice", "before").await;
    let mut ws = server.connect("/ws/notifications", "alice").await;
    recv_json(&mut ws).await;
    recv_json(&mut ws).await;

    // when (操作):
    ws.send(Message::text("not json")).await.unwrap();
    ws.send(Message::text(r#"{"type":"bogus"}"#)).await.unwrap();
    ws.send(Message::text(r#"{"type":"mark_read","notification_id":"nope"}"#))
        .await
        .unwrap();
    // フレームは順に処理されるので、これが効けば先行フレームも処理済み
    ws.send(Message::text(r#"{"type":"mark_all_read"}"#))
        .await
        .unwrap();
    let unread = server.wait_unread("alice", 0).await;
    let id = server.add_notification("alice", "still here").await;
    let pushed = recv_json(&mut ws).await;

    // then (期待する結果):
    assert_eq!(unread, 0);
    assert_eq!(pushed["type"], "notification");
    assert_eq!(pushed["notification"]["id"], id.as_str());
    assert_eq!(server.connections().await, 1);
}

#[tokio::test]
async fn test_missing_identity_is_rejected() {
    // テスト項目: X-User-Id が無いリクエストは 401 になる
    // given (前提条件):
    let server = TestServer::start().await;

    // when (操作):
    let http = reqwest::get(server.http("/api/notifications")).await.unwrap();
    let ws = connect_async(format!("ws://{}/ws/notifications", server.addr)).await;

    // then (期待する結果):
    assert_eq!(http.status(), 401);
    assert!(ws.is_err());
}

#[tokio::test]
async fn test_chat_text_is_broadcast_to_room() {
    // テスト項目: チャットの text がルーム全員に届き、connection_check は送信者にだけ返る
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect("/ws/chat/general", "alice").await;
    let mut bob = server.connect("/ws/chat/general", "bob").await;
    let welcome = recv_json(&mut alice).await;
    recv_json(&mut bob).await;

    // when (操作):
    alice
        .send(Message::text(r#"{"type":"text","content":"hello"}"#))
        .await
        .unwrap();
    let to_bob = recv_json(&mut bob).await;
    let to_alice = recv_json(&mut alice).await;
    bob.send(Message::text(r#"{"type":"connection_check"}"#))
        .await
        .unwrap();
    let ack = recv_json(&mut bob).await;

    // then (期待する結果):
    assert_eq!(welcome["chat_id"], "general");
    assert_eq!(to_bob["type"], "text");
    assert_eq!(to_bob["content"], "hello");
    assert_eq!(to_bob["user_id"], "alice");
    assert_eq!(to_bob["chat_id"], "general");
    assert!(to_bob["timestamp"].is_i64());
    assert_eq!(to_alice["content"], "hello");
    assert_eq!(ack["type"], "connection_ack");
}

#[tokio::test]
async fn test_chat_rejects_impersonation() {
    // テスト項目: 他人の user_id を名乗るチャットフレームは送信者にだけエラーが返る
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect("/ws/chat/general", "alice").await;
    recv_json(&mut alice).await;

    // when (操作):
    alice
        .send(Message::text(
            r#"{"type":"text","content":"hi","user_id":"mallory"}"#,
        ))
        .await
        .unwrap();
    let reply = recv_json(&mut alice).await;

    // then (期待する結果):
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "unauthorized");
}

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    // テスト項目: バケット容量を超えたリクエストは 429 になる
    // given (前提条件):
    let mut config = GatewayConfig::default();
    config.rate_limit.capacity = 2.0;
    config.rate_limit.refill_per_second = 0.01;
    let server = TestServer::start_with(config).await;
    let client = reqwest::Client::new();

    // when (操作):
    let mut statuses = Vec::new();
    for _ in 0..3 {
        let response = client.get(server.http("/api/health")).send().await.unwrap();
        statuses.push(response.status().as_u16());
    }
    let rejected: Value = client
        .get(server.http("/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(statuses, vec![200, 200, 429]);
    assert_eq!(
        rejected,
        json!({
            "success": false,
            "message": "Rate limit exceeded. Please try again later.",
            "code": "RATE_LIMIT_EXCEEDED"
        })
    );
}

#[tokio::test]
async fn test_debug_hub_reports_connections() {
    // テスト項目: /debug/hub が接続数とプールの状態を返す
    // given (前提条件):
    let server = TestServer::start().await;
    let mut ws = server.connect("/ws/notifications", "alice").await;
    recv_json(&mut ws).await;

    // when (操作):
    let body: Value = reqwest::get(server.http("/debug/hub"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(body["notification_hub"]["connections"], 1);
    assert_eq!(body["notification_hub"]["users"], 1);
    assert_eq!(body["chat_hub"]["connections"], 0);
    assert_eq!(body["pools"].as_array().unwrap().len(), 4);
    assert_eq!(body["pools"][0]["open"], 0);
}
