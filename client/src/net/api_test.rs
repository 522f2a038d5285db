use super::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Answer one HTTP request with `response` verbatim. Yields the request body.
async fn respond_once(response: String) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let body = read_request_body(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        let _ = tx.send(body);
    });
    (base_url, rx)
}

async fn read_request_body(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map_or(0, |v| v.trim().parse::<usize>().unwrap());
            if buf.len() >= end + 4 + length {
                return String::from_utf8(buf[end + 4..end + 4 + length].to_vec()).unwrap();
            }
        }
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "request ended early");
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn question(text: &str) -> RelayRequest {
    RelayRequest { message: Some(text.to_owned()), language: Some("ja".to_owned()), messages: Vec::new() }
}

#[test]
fn chat_url_joins_base() {
    assert_eq!(chat_url("http://127.0.0.1:3000"), "http://127.0.0.1:3000/api/chat");
    assert_eq!(chat_url("http://127.0.0.1:3000/"), "http://127.0.0.1:3000/api/chat");
}

#[test]
fn health_url_joins_base() {
    assert_eq!(health_url("https://resume.example"), "https://resume.example/healthz");
}

#[test]
fn non_success_status_is_transport_error() {
    assert!(check_status(200).is_ok());
    assert!(matches!(check_status(400), Err(TransportError::Status(400))));
    assert!(matches!(check_status(500), Err(TransportError::Status(500))));
}

#[test]
fn http_relay_trims_base_url() {
    let relay = HttpRelay::new("http://localhost:3000/").unwrap();
    assert_eq!(relay.base_url(), "http://localhost:3000");
}

#[test]
fn transport_error_messages() {
    assert_eq!(TransportError::Status(500).to_string(), "relay returned status 500");
}

#[tokio::test]
async fn open_posts_json_and_streams_body_bytes() {
    let body = "data: {\"content\":\"Hi\"}\n\ndata: [DONE]\n\n";
    let (base_url, request_body) = respond_once(http_response("200 OK", "text/event-stream", body)).await;

    let relay = HttpRelay::new(&base_url).unwrap();
    let mut stream = relay.open(&question("学歴は？")).await.unwrap();
    let mut received = Vec::new();
    while let Some(chunk) = stream.next().await {
        received.extend(chunk.unwrap());
    }
    assert_eq!(String::from_utf8(received).unwrap(), body);

    let sent: serde_json::Value = serde_json::from_str(&request_body.await.unwrap()).unwrap();
    assert_eq!(sent["message"], "学歴は？");
    assert_eq!(sent["language"], "ja");
}

#[tokio::test]
async fn open_rejects_non_success_status() {
    let error = r#"{"error":"Failed to process request"}"#;
    let (base_url, _) = respond_once(http_response("500 Internal Server Error", "application/json", error)).await;

    let relay = HttpRelay::new(&base_url).unwrap();
    assert!(matches!(relay.open(&question("hi")).await, Err(TransportError::Status(500))));
}

#[tokio::test]
async fn open_reports_unreachable_relay() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let relay = HttpRelay::new(&base_url).unwrap();
    assert!(matches!(relay.open(&question("hi")).await, Err(TransportError::Request(_))));
}

#[tokio::test]
async fn ping_accepts_healthy_relay() {
    let (base_url, _) = respond_once(http_response("200 OK", "text/plain", "")).await;
    HttpRelay::new(&base_url).unwrap().ping().await.unwrap();
}
