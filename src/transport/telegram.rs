//! Telegram Bot API blob transport.
//!
//! Each blob is posted to the configured channel as a document. The message
//! identifier and the document `file_id` from the acknowledgement are what
//! the metadata records keep.
//!
//! The public Bot API only serves files up to 20 MB through `getFile`. Larger
//! blobs need a self-hosted Bot API server, selected through
//! `telegram.api_base`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{BlobReceipt, BlobRef, BlobTransport, ByteStream};
use crate::config::TelegramConfig;
use crate::{DriveError, Result};

/// User agent string for Bot API requests.
const USER_AGENT: &str = "teledrive/0.1";

/// Envelope of every Bot API reply.
#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: Option<i64>,
    document: Option<MediaRef>,
    #[serde(default)]
    photo: Vec<MediaRef>,
}

#[derive(Debug, Deserialize)]
struct MediaRef {
    file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

fn decode_reply<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T> {
    let reply: ApiReply<T> = serde_json::from_slice(body)
        .map_err(|e| DriveError::Transport(format!("malformed Bot API reply: {e}")))?;

    if !reply.ok {
        return Err(DriveError::Transport(format!(
            "Bot API rejected the request: {}",
            reply.description.unwrap_or_else(|| "no description".to_string())
        )));
    }

    reply
        .result
        .ok_or_else(|| DriveError::Transport("Bot API reply has no result".to_string()))
}

/// Parse a `sendDocument` acknowledgement.
///
/// The blob identifier is taken from `result.document.file_id`, falling back
/// to the last (largest) entry of `result.photo` when the platform converted
/// the upload into a photo.
pub fn parse_send_response(body: &[u8]) -> Result<BlobReceipt> {
    let message: SentMessage = decode_reply(body)?;

    let message_id = message.message_id.ok_or_else(|| {
        DriveError::Transport("acknowledgement has no message_id".to_string())
    })?;

    let blob_id = message
        .document
        .and_then(|doc| doc.file_id)
        .or_else(|| message.photo.into_iter().last().and_then(|p| p.file_id))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DriveError::Transport("acknowledgement has no file_id".to_string()))?;

    Ok(BlobReceipt {
        message_id,
        blob_id,
    })
}

/// Parse a `getFile` reply into the download path of the blob.
pub fn parse_file_path_response(body: &[u8]) -> Result<String> {
    let info: FileInfo = decode_reply(body)?;
    info.file_path
        .filter(|path| !path.is_empty())
        .ok_or_else(|| DriveError::Transport("getFile reply has no file_path".to_string()))
}

/// Blob transport talking to the Telegram Bot API.
pub struct TelegramTransport {
    client: Client,
    api_base: String,
    bot_token: String,
    channel_id: String,
}

impl TelegramTransport {
    /// Create a transport from configuration.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let api_base = Url::parse(&config.api_base)
            .map_err(|e| DriveError::Config(format!("invalid telegram.api_base: {e}")))?;
        if !matches!(api_base.scheme(), "http" | "https") {
            return Err(DriveError::Config(format!(
                "telegram.api_base must be http or https, got {}",
                api_base.scheme()
            )));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DriveError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.as_str().trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            channel_id: config.channel_id.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    fn download_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.bot_token, file_path)
    }

    // The bot token is part of every URL, so reqwest errors are stripped of it.
    fn request_error(context: &str, e: reqwest::Error) -> DriveError {
        DriveError::Transport(format!("{context}: {}", e.without_url()))
    }

    async fn read_reply(context: &str, response: reqwest::Response) -> Result<Bytes> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::request_error(context, e))?;

        if !status.is_success() {
            let description = serde_json::from_slice::<ApiReply<serde_json::Value>>(&body)
                .ok()
                .and_then(|reply| reply.description)
                .unwrap_or_default();
            return Err(DriveError::Transport(format!(
                "{context}: HTTP {status} {description}"
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl BlobTransport for TelegramTransport {
    async fn upload(&self, payload: Bytes, label: &str) -> Result<BlobReceipt> {
        let size = payload.len();
        let document = Part::stream_with_length(payload, size as u64).file_name(label.to_string());
        let form = Form::new()
            .text("chat_id", self.channel_id.clone())
            .part("document", document);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::request_error("sendDocument failed", e))?;

        let body = Self::read_reply("sendDocument failed", response).await?;
        let receipt = parse_send_response(&body)?;

        debug!(
            label,
            size,
            message_id = receipt.message_id,
            "Blob stored"
        );
        Ok(receipt)
    }

    async fn fetch(&self, blob: &BlobRef) -> Result<ByteStream> {
        let response = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", blob.blob_id.as_str())])
            .send()
            .await
            .map_err(|e| Self::request_error("getFile failed", e))?;

        let body = Self::read_reply("getFile failed", response).await?;
        let file_path = parse_file_path_response(&body)?;

        let response = self
            .client
            .get(self.download_url(&file_path))
            .send()
            .await
            .map_err(|e| Self::request_error("blob download failed", e))?;

        if !response.status().is_success() {
            return Err(DriveError::Transport(format!(
                "blob download failed: HTTP {}",
                response.status()
            )));
        }

        debug!(message_id = blob.message_id, "Streaming blob");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Self::request_error("blob download interrupted", e)));
        Ok(Box::pin(stream))
    }
}

impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("api_base", &self.api_base)
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_reply() {
        let body = br#"{"ok":true,"result":{"message_id":77,"document":{"file_id":"BQACAgQ","file_size":12}}}"#;
        let receipt = parse_send_response(body).unwrap();
        assert_eq!(receipt.message_id, 77);
        assert_eq!(receipt.blob_id, "BQACAgQ");
    }

    #[test]
    fn test_parse_photo_reply_takes_largest() {
        let body = br#"{"ok":true,"result":{"message_id":5,"photo":[{"file_id":"small"},{"file_id":"medium"},{"file_id":"large"}]}}"#;
        let receipt = parse_send_response(body).unwrap();
        assert_eq!(receipt.blob_id, "large");
    }

    #[test]
    fn test_parse_reply_without_file_id() {
        let body = br#"{"ok":true,"result":{"message_id":5,"text":"hi"}}"#;
        let err = parse_send_response(body).unwrap_err();
        assert!(matches!(err, DriveError::Transport(_)));
        assert!(err.to_string().contains("file_id"));
    }

    #[test]
    fn test_parse_reply_without_message_id() {
        let body = br#"{"ok":true,"result":{"document":{"file_id":"x"}}}"#;
        assert!(parse_send_response(body).is_err());
    }

    #[test]
    fn test_parse_rejected_reply() {
        let body = br#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        let err = parse_send_response(body).unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[test]
    fn test_parse_garbage_reply() {
        assert!(matches!(
            parse_send_response(b"<html>"),
            Err(DriveError::Transport(_))
        ));
    }

    #[test]
    fn test_parse_file_path() {
        let body = br#"{"ok":true,"result":{"file_id":"x","file_path":"documents/file_3.bin"}}"#;
        assert_eq!(
            parse_file_path_response(body).unwrap(),
            "documents/file_3.bin"
        );

        let body = br#"{"ok":true,"result":{"file_id":"x"}}"#;
        assert!(parse_file_path_response(body).is_err());
    }

    #[test]
    fn test_urls() {
        let config = TelegramConfig {
            api_base: "http://localhost:8081/".to_string(),
            bot_token: "123:abc".to_string(),
            channel_id: "-100".to_string(),
            ..Default::default()
        };
        let transport = TelegramTransport::new(&config).unwrap();

        assert_eq!(
            transport.method_url("sendDocument"),
            "http://localhost:8081/bot123:abc/sendDocument"
        );
        assert_eq!(
            transport.download_url("documents/a.bin"),
            "http://localhost:8081/file/bot123:abc/documents/a.bin"
        );
        assert!(!format!("{transport:?}").contains("123:abc"));
    }

    #[test]
    fn test_invalid_api_base() {
        for api_base in ["not a url", "ftp://example.com"] {
            let config = TelegramConfig {
                api_base: api_base.to_string(),
                ..Default::default()
            };
            assert!(matches!(
                TelegramTransport::new(&config),
                Err(DriveError::Config(_))
            ));
        }
    }
}
