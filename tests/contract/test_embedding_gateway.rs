use issuematch::services::embedding_service::{
    EmbeddingError, EmbeddingService, FallbackPolicy, FALLBACK_DIMENSION,
};
use issuematch::services::gateway::{GatewayClient, GatewayConfig, GatewayError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct CapturedRequest {
    head: String,
    body: String,
}

/// One-connection-per-response HTTP server replaying canned gateway replies.
struct CannedGateway {
    base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl CannedGateway {
    async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut stream).await;
                captured.lock().unwrap().push(request);

                let reason = match status {
                    200 => "OK",
                    401 => "Unauthorized",
                    503 => "Service Unavailable",
                    _ => "Error",
                };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{addr}/v1"),
            requests,
        }
    }

    fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break buffer.len();
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    CapturedRequest {
        head,
        body: String::from_utf8_lossy(&buffer[header_end..]).to_string(),
    }
}

fn gateway_config(base_url: &str, dimension: usize) -> GatewayConfig {
    GatewayConfig::new("test-key", base_url, "embed-small", dimension)
        .with_timeout(Duration::from_secs(5))
        .with_max_retries(0)
}

fn service(config: GatewayConfig, policy: FallbackPolicy) -> EmbeddingService {
    EmbeddingService::new(Arc::new(GatewayClient::new(config).unwrap()), policy)
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Address nothing is listening on.
async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/v1")
}

#[tokio::test]
async fn test_embeddings_follow_input_order() {
    let gateway = CannedGateway::start(vec![(
        200,
        r#"{"object": "list", "data": [
            {"object": "embedding", "index": 2, "embedding": [0.0, 0.0, 3.0]},
            {"object": "embedding", "index": 0, "embedding": [1.0, 0.0, 0.0]},
            {"object": "embedding", "index": 1, "embedding": [0.0, 2.0, 0.0]}
        ], "model": "embed-small", "usage": {"prompt_tokens": 9, "total_tokens": 9}}"#
            .to_string(),
    )])
    .await;

    let service = service(gateway_config(&gateway.base_url, 3), FallbackPolicy::Strict);
    let vectors = service
        .embed(&texts(&["no dial tone", "", "refund please"]))
        .await
        .unwrap();

    assert_eq!(
        vectors,
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 2.0, 0.0],
            vec![0.0, 0.0, 3.0]
        ]
    );

    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].head.starts_with("POST /v1/embeddings"));
    assert!(requests[0]
        .head
        .to_lowercase()
        .contains("authorization: bearer test-key"));

    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"model": "embed-small", "input": ["no dial tone", "", "refund please"]})
    );
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let gateway = CannedGateway::start(vec![
        (503, r#"{"error": {"message": "warming up"}}"#.to_string()),
        (
            200,
            r#"{"data": [{"index": 0, "embedding": [0.5, 0.5]}]}"#.to_string(),
        ),
    ])
    .await;

    let config = gateway_config(&gateway.base_url, 2).with_max_retries(2);
    let service = service(config, FallbackPolicy::Strict);

    let vector = service.embed_one("slow internet").await.unwrap();
    assert_eq!(vector, vec![0.5, 0.5]);
    assert_eq!(gateway.requests().len(), 2);
}

#[tokio::test]
async fn test_authentication_failure_is_not_retried() {
    let gateway = CannedGateway::start(vec![
        (401, r#"{"error": {"message": "invalid api key"}}"#.to_string()),
        (200, r#"{"data": []}"#.to_string()),
    ])
    .await;

    let config = gateway_config(&gateway.base_url, 2).with_max_retries(3);
    let service = service(config, FallbackPolicy::Strict);

    let result = service.embed(&texts(&["a"])).await;
    match result {
        Err(EmbeddingError::Gateway(GatewayError::AuthenticationFailed { message })) => {
            assert_eq!(message, "invalid api key");
        }
        other => panic!("Expected authentication failure, got {other:?}"),
    }
    assert_eq!(gateway.requests().len(), 1);
}

#[tokio::test]
async fn test_short_response_is_invalid() {
    let gateway = CannedGateway::start(vec![(
        200,
        r#"{"data": [{"index": 0, "embedding": [1.0, 2.0]}]}"#.to_string(),
    )])
    .await;

    let service = service(gateway_config(&gateway.base_url, 2), FallbackPolicy::Strict);
    let result = service.embed(&texts(&["a", "b"])).await;
    assert!(matches!(
        result,
        Err(EmbeddingError::Gateway(GatewayError::InvalidResponse { .. }))
    ));
}

#[tokio::test]
async fn test_unreachable_gateway_strict_fails() {
    let base_url = closed_port_url().await;
    let service = service(
        gateway_config(&base_url, FALLBACK_DIMENSION),
        FallbackPolicy::Strict,
    );

    let result = service.embed(&texts(&["router blinking red"])).await;
    match result {
        Err(EmbeddingError::Gateway(error)) => assert!(error.is_network_error()),
        other => panic!("Expected network error, got {other:?}"),
    }
    assert_eq!(service.fallback_count(), 0);
}

#[tokio::test]
async fn test_unreachable_gateway_zero_vector_fallback() {
    let base_url = closed_port_url().await;
    let service = service(
        gateway_config(&base_url, FALLBACK_DIMENSION),
        FallbackPolicy::ZeroVector,
    );

    let input = texts(&["router blinking red", "", "charged twice"]);
    let vectors = service.embed(&input).await.unwrap();

    assert_eq!(vectors.len(), input.len());
    for vector in &vectors {
        assert_eq!(vector.len(), 384);
        assert!(vector.iter().all(|v| *v == 0.0));
    }
    assert_eq!(service.fallback_count(), 1);

    service.embed(&input[..1]).await.unwrap();
    assert_eq!(service.fallback_count(), 2);
}

#[tokio::test]
async fn test_empty_input_never_reaches_gateway() {
    let base_url = closed_port_url().await;
    let service = service(
        gateway_config(&base_url, FALLBACK_DIMENSION),
        FallbackPolicy::ZeroVector,
    );

    assert!(matches!(
        service.embed(&[]).await,
        Err(EmbeddingError::EmptyInput)
    ));
    assert_eq!(service.fallback_count(), 0);
}
