use std::path::PathBuf;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use vantage::server::protocol::QueryResponse;
use vantage::server::{SearchServer, SearchStrategy, ServerConfig};
use vantage::store::VectorStore;

fn write_store(rows: &[Vec<f32>]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("points.vstr");
    VectorStore::from_rows(rows).unwrap().save(&path).unwrap();
    (dir, path)
}

fn sample_rows() -> Vec<Vec<f32>> {
    vec![
        vec![1.0, 2.0, 3.0, 4.0],
        vec![1.0, 2.0, 3.0, 5.0],
        vec![3.0, 4.0, 5.0, 6.0],
    ]
}

fn test_config(path: PathBuf) -> ServerConfig {
    ServerConfig {
        vector_data_path: path,
        listen_port: 0,
        ..ServerConfig::default()
    }
}

async fn roundtrip(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    request: &str,
) -> QueryResponse {
    writer.write_all(request.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();

    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    serde_json::from_str(line.trim()).unwrap()
}

#[tokio::test]
async fn test_knn_query_over_tcp() {
    let (_dir, path) = write_store(&sample_rows());
    let mut server = SearchServer::new(test_config(path));
    let addr = server.start().await.unwrap();

    let stream = TcpStream::connect(("127.0.0.1", addr.port())).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let response = roundtrip(
        &mut reader,
        &mut write_half,
        r#"{"queryVector": [1.0, 2.0, 3.0, 4.0], "k": 2}"#,
    )
    .await;

    match response {
        QueryResponse::Results { results } => {
            assert_eq!(results.len(), 2);
            assert_eq!(results[0].point_index, 0);
            assert_eq!(results[0].distance, 0.0);
            assert_eq!(results[1].point_index, 1);
            assert!((results[1].distance - 1.0).abs() < 1e-6);
        }
        QueryResponse::Error { error } => panic!("unexpected error: {error:?}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_range_query_over_tcp() {
    let (_dir, path) = write_store(&sample_rows());
    let mut server = SearchServer::new(test_config(path));
    let addr = server.start().await.unwrap();

    let stream = TcpStream::connect(("127.0.0.1", addr.port())).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let response = roundtrip(
        &mut reader,
        &mut write_half,
        r#"{"queryVector": [1.0, 2.0, 3.0, 4.0], "maxRange": 1.5}"#,
    )
    .await;

    match response {
        QueryResponse::Results { results } => {
            let indices: Vec<u32> = results.iter().map(|r| r.point_index).collect();
            assert_eq!(indices, vec![0, 1]);
        }
        QueryResponse::Error { error } => panic!("unexpected error: {error:?}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_request_keeps_connection_open() {
    let (_dir, path) = write_store(&sample_rows());
    let mut server = SearchServer::new(test_config(path));
    let addr = server.start().await.unwrap();

    let stream = TcpStream::connect(("127.0.0.1", addr.port())).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // A payload that is not JSON earns an error response...
    let response = roundtrip(&mut reader, &mut write_half, "this is not json").await;
    match response {
        QueryResponse::Error { error } => assert_eq!(error.kind, "invalid_argument"),
        QueryResponse::Results { .. } => panic!("expected an error response"),
    }

    // ...and the same connection still answers a valid query afterwards.
    let response = roundtrip(
        &mut reader,
        &mut write_half,
        r#"{"queryVector": [1.0, 2.0, 3.0, 4.0], "k": 1}"#,
    )
    .await;
    match response {
        QueryResponse::Results { results } => assert_eq!(results[0].point_index, 0),
        QueryResponse::Error { error } => panic!("unexpected error: {error:?}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_invalid_queries_get_typed_errors() {
    let (_dir, path) = write_store(&sample_rows());
    let mut server = SearchServer::new(test_config(path));
    let addr = server.start().await.unwrap();

    let stream = TcpStream::connect(("127.0.0.1", addr.port())).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let cases = [
        (r#"{"queryVector": [1.0, 2.0], "k": 1}"#, "dimension_mismatch"),
        (r#"{"queryVector": [1.0, 2.0, 3.0, 4.0], "k": 0}"#, "invalid_argument"),
        (r#"{"queryVector": [1.0, 2.0, 3.0, 4.0]}"#, "invalid_argument"),
        (
            r#"{"queryVector": [1.0, 2.0, 3.0, 4.0], "maxRange": -2.0}"#,
            "invalid_argument",
        ),
    ];
    for (request, expected_kind) in cases {
        let response = roundtrip(&mut reader, &mut write_half, request).await;
        match response {
            QueryResponse::Error { error } => assert_eq!(error.kind, expected_kind),
            QueryResponse::Results { .. } => panic!("expected {expected_kind} for {request}"),
        }
    }

    server.stop().await;
}

#[tokio::test]
async fn test_start_fails_on_missing_store() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().join("absent.vstr"));
    let mut server = SearchServer::new(config);

    assert!(server.start().await.is_err());

    // The failed server never entered Running.
    let response = server.handle_query(vantage::server::protocol::QueryRequest::knn(
        vec![1.0, 2.0, 3.0, 4.0],
        1,
    ));
    match response {
        QueryResponse::Error { error } => assert_eq!(error.kind, "service_unavailable"),
        QueryResponse::Results { .. } => panic!("expected service_unavailable"),
    }
}

#[tokio::test]
async fn test_start_fails_on_empty_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.vstr");
    VectorStore::from_flat(4, vec![]).unwrap().save(&path).unwrap();

    let mut server = SearchServer::new(test_config(path));
    assert!(server.start().await.is_err());
}

#[tokio::test]
async fn test_stop_closes_the_listener() {
    let (_dir, path) = write_store(&sample_rows());
    let mut server = SearchServer::new(test_config(path));
    let addr = server.start().await.unwrap();
    server.stop().await;

    // New connections are refused, or accepted by the OS backlog and then
    // never answered; either way no query can complete.
    let connect = TcpStream::connect(("127.0.0.1", addr.port())).await;
    if let Ok(stream) = connect {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let _ = write_half
            .write_all(b"{\"queryVector\": [1.0, 2.0, 3.0, 4.0], \"k\": 1}\n")
            .await;
        let mut line = String::new();
        let read = reader.read_line(&mut line).await;
        assert!(matches!(read, Ok(0) | Err(_)), "expected no response");
    }
}

#[tokio::test]
async fn test_fill_strategy_end_to_end() {
    let (_dir, path) = write_store(&sample_rows());
    let config = ServerConfig {
        strategy: SearchStrategy::Fill,
        ..test_config(path)
    };
    let mut server = SearchServer::new(config);
    let addr = server.start().await.unwrap();

    let stream = TcpStream::connect(("127.0.0.1", addr.port())).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let response = roundtrip(
        &mut reader,
        &mut write_half,
        r#"{"queryVector": [1.0, 2.0, 3.0, 4.0], "k": 2}"#,
    )
    .await;
    match response {
        QueryResponse::Results { results } => {
            assert_eq!(results.len(), 2);
            assert_eq!(results[0].point_index, 0);
            assert_eq!(results[1].point_index, 1);
        }
        QueryResponse::Error { error } => panic!("unexpected error: {error:?}"),
    }

    server.stop().await;
}
