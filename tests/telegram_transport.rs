//! Telegram Transport Tests
//!
//! Runs the Bot API transport against a local mock of the Bot API.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::TryStreamExt;
use serde_json::json;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use teledrive::config::TelegramConfig;
use teledrive::download::ReconstructionResolver;
use teledrive::transport::{BlobRef, BlobTransport, TelegramTransport};
use teledrive::{Database, DriveError, UploadLimits, UploadOrchestrator};
use tokio::net::TcpListener;

const TOKEN: &str = "4242-secret";
const CHANNEL: &str = "-1001";

#[derive(Default)]
struct MockBotApi {
    documents: Mutex<Vec<(String, Bytes)>>,
}

async fn send_document(
    State(api): State<Arc<MockBotApi>>,
    mut multipart: Multipart,
) -> Response {
    let mut chat_id = String::new();
    let mut document: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name().unwrap_or("") {
            "chat_id" => chat_id = field.text().await.unwrap(),
            "document" => {
                let name = field.file_name().unwrap_or("").to_string();
                document = Some((name, field.bytes().await.unwrap()));
            }
            _ => {}
        }
    }

    if chat_id != CHANNEL {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"})),
        )
            .into_response();
    }

    let Some(document) = document else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "description": "Bad Request: no document"})),
        )
            .into_response();
    };

    let mut documents = api.documents.lock().unwrap();
    documents.push(document);
    let n = documents.len();
    Json(json!({
        "ok": true,
        "result": {
            "message_id": 100 + n,
            "document": {"file_id": format!("doc{}", n - 1)}
        }
    }))
    .into_response()
}

async fn get_file(
    State(api): State<Arc<MockBotApi>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let file_id = query.get("file_id").cloned().unwrap_or_default();
    let known = file_id
        .strip_prefix("doc")
        .and_then(|n| n.parse::<usize>().ok())
        .is_some_and(|n| n < api.documents.lock().unwrap().len());

    if !known {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "description": "Bad Request: invalid file_id"})),
        )
            .into_response();
    }

    Json(json!({
        "ok": true,
        "result": {"file_id": file_id, "file_path": format!("documents/{file_id}.bin")}
    }))
    .into_response()
}

async fn download(State(api): State<Arc<MockBotApi>>, Path(path): Path<String>) -> Response {
    let index = path
        .strip_prefix("documents/doc")
        .and_then(|rest| rest.strip_suffix(".bin"))
        .and_then(|n| n.parse::<usize>().ok());

    let documents = api.documents.lock().unwrap();
    match index.and_then(|n| documents.get(n)) {
        Some((_, content)) => content.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start the mock Bot API and return its state and base URL.
async fn start_mock() -> (Arc<MockBotApi>, String) {
    let api = Arc::new(MockBotApi::default());
    let router = Router::new()
        .route(&format!("/bot{TOKEN}/sendDocument"), post(send_document))
        .route(&format!("/bot{TOKEN}/getFile"), get(get_file))
        .route(&format!("/file/bot{TOKEN}/*path"), get(download))
        .with_state(api.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (api, format!("http://{addr}"))
}

fn transport_config(api_base: &str, channel_id: &str) -> TelegramConfig {
    TelegramConfig {
        api_base: api_base.to_string(),
        bot_token: TOKEN.to_string(),
        channel_id: channel_id.to_string(),
        ..Default::default()
    }
}

async fn collect(transport: &TelegramTransport, blob: &BlobRef) -> Vec<u8> {
    let stream = transport.fetch(blob).await.unwrap();
    let pieces: Vec<Bytes> = stream.try_collect().await.unwrap();
    pieces.concat()
}

#[tokio::test]
async fn test_upload_and_fetch() {
    let (api, base) = start_mock().await;
    let transport = TelegramTransport::new(&transport_config(&base, CHANNEL)).unwrap();

    let receipt = transport
        .upload(Bytes::from_static(b"telegram payload"), "notes.txt")
        .await
        .unwrap();
    assert_eq!(receipt.message_id, 101);
    assert_eq!(receipt.blob_id, "doc0");

    let documents = api.documents.lock().unwrap().clone();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].0, "notes.txt");

    let content = collect(&transport, &BlobRef::from(receipt)).await;
    assert_eq!(content, b"telegram payload");
}

#[tokio::test]
async fn test_rejected_upload() {
    let (api, base) = start_mock().await;
    let transport = TelegramTransport::new(&transport_config(&base, "-999")).unwrap();

    let err = transport
        .upload(Bytes::from_static(b"x"), "a.txt")
        .await
        .unwrap_err();

    assert!(matches!(err, DriveError::Transport(_)));
    assert!(err.to_string().contains("chat not found"));
    assert!(api.documents.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_unknown_blob() {
    let (_, base) = start_mock().await;
    let transport = TelegramTransport::new(&transport_config(&base, CHANNEL)).unwrap();

    let err = match transport.fetch(&BlobRef::new(1, "doc9")).await {
        Ok(_) => panic!("fetch of an unknown blob succeeded"),
        Err(e) => e,
    };

    assert!(matches!(err, DriveError::Transport(_)));
    assert!(!err.to_string().contains(TOKEN));
}

#[tokio::test]
async fn test_unreachable_api_hides_token() {
    // Bind and drop a listener to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport =
        TelegramTransport::new(&transport_config(&format!("http://{addr}"), CHANNEL)).unwrap();
    let err = transport
        .upload(Bytes::from_static(b"x"), "a.txt")
        .await
        .unwrap_err();

    assert!(matches!(err, DriveError::Transport(_)));
    assert!(!err.to_string().contains(TOKEN));
}

#[tokio::test]
async fn test_chunked_round_trip() {
    let (api, base) = start_mock().await;
    let transport: Arc<dyn BlobTransport> =
        Arc::new(TelegramTransport::new(&transport_config(&base, CHANNEL)).unwrap());

    let db = Database::open_in_memory().await.unwrap();
    let limits = UploadLimits {
        chunk_size: 10,
        max_blob_size: 10,
    };
    let orchestrator =
        UploadOrchestrator::new(db.pool().clone(), transport.clone(), limits).unwrap();

    let content: Vec<u8> = (0..25u8).collect();
    let result = orchestrator
        .upload_chunked(Cursor::new(content.clone()), "data.bin", 25, None, None)
        .await
        .unwrap();
    assert_eq!(result.total_chunks, 3);

    let names: Vec<String> = api
        .documents
        .lock()
        .unwrap()
        .iter()
        .map(|(name, _)| name.clone())
        .collect();
    assert_eq!(
        names,
        vec!["data.bin_chunk_0", "data.bin_chunk_1", "data.bin_chunk_2"]
    );

    let resolver = ReconstructionResolver::new(db.pool().clone(), transport);
    let plan = resolver.resolve(result.records[1].id).await.unwrap();
    assert_eq!(plan.total_size, 25);

    let pieces: Vec<Bytes> = resolver.stream(&plan).try_collect().await.unwrap();
    assert_eq!(pieces.concat(), content);
}
