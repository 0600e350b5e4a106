//! 디멘션 업데이트 HTTP 싱크.
//!
//! 코디네이터가 flush한 항목 전체를 `POST {api_url}/v2/dimension/_batch` 한 번으로 보낸다.

use async_trait::async_trait;
use pulsegate_core::config::IngestConfig;
use pulsegate_core::error::CoreError;
use pulsegate_core::models::dimension::{UpdateKind, UpdateQueueEntry};
use pulsegate_core::ports::metadata::DimensionSink;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::dispatch_client::{join_url, ACCESS_TOKEN_HEADER, USER_AGENT_VALUE};

/// 디멘션 배치 엔드포인트 경로
pub const DIMENSION_BATCH_PATH: &str = "/v2/dimension/_batch";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDimensionUpdate<'a> {
    key: &'a str,
    value: &'a str,
    custom_properties: &'a BTreeMap<String, String>,
    tags: &'a BTreeSet<String>,
    operation: &'static str,
    enqueued_at: i64,
}

impl<'a> From<&'a UpdateQueueEntry> for WireDimensionUpdate<'a> {
    fn from(entry: &'a UpdateQueueEntry) -> Self {
        let update = &entry.update;
        Self {
            key: &update.resource_key.name,
            value: &update.resource_key.value,
            custom_properties: &update.properties,
            tags: &update.tags,
            operation: match update.kind {
                UpdateKind::Upsert => "upsert",
                UpdateKind::TagOnly => "tags",
            },
            enqueued_at: entry.enqueued_at.timestamp_millis(),
        }
    }
}

/// 디멘션 API 싱크 (`DimensionSink` 구현)
pub struct HttpDimensionSink {
    client: reqwest::Client,
    url: String,
    access_token: String,
}

impl HttpDimensionSink {
    /// 새 싱크 생성 (`api_url`은 경로 없는 기본 URL)
    pub fn new(client: reqwest::Client, api_url: &str, access_token: impl Into<String>) -> Self {
        Self {
            client,
            url: join_url(api_url, DIMENSION_BATCH_PATH),
            access_token: access_token.into(),
        }
    }

    /// 설정 기반 생성 (HTTP 클라이언트는 전송 클라이언트와 공유)
    pub fn from_config(client: reqwest::Client, config: &IngestConfig) -> Self {
        Self::new(client, &config.api_url, config.access_token.clone())
    }

    /// 요청 URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DimensionSink for HttpDimensionSink {
    async fn send(&self, entries: &[UpdateQueueEntry]) -> Result<(), CoreError> {
        if entries.is_empty() {
            return Ok(());
        }

        let body: Vec<WireDimensionUpdate<'_>> = entries.iter().map(Into::into).collect();

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::USER_AGENT, USER_AGENT_VALUE)
            .json(&body);
        if !self.access_token.is_empty() {
            request = request.header(ACCESS_TOKEN_HEADER, &self.access_token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("디멘션 업데이트 전송 실패: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!("디멘션 업데이트 {}건 전송", entries.len());
            return Ok(());
        }

        let text = response.text().await.unwrap_or_else(|e| {
            tracing::warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });
        Err(CoreError::Backend {
            status_code: status.as_u16(),
            body: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use pulsegate_core::models::dimension::{PropertyUpdate, ResourceKey};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn entry(update: PropertyUpdate) -> UpdateQueueEntry {
        UpdateQueueEntry::new(update, Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
    }

    fn sink(server: &mockito::ServerGuard) -> HttpDimensionSink {
        HttpDimensionSink::new(reqwest::Client::new(), &server.url(), "dim-token")
    }

    #[tokio::test]
    async fn sends_batch_as_json_array() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/dimension/_batch")
            .match_header("x-sf-token", "dim-token")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!([
                {
                    "key": "host",
                    "value": "web-01",
                    "customProperties": {"host_cpu_cores": "8"},
                    "tags": [],
                    "operation": "upsert",
                    "enqueuedAt": 1_700_000_000_000i64
                },
                {
                    "key": "host",
                    "value": "web-02",
                    "customProperties": {},
                    "tags": ["blue"],
                    "operation": "tags",
                    "enqueuedAt": 1_700_000_000_000i64
                }
            ])))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let entries = vec![
            entry(
                PropertyUpdate::upsert(ResourceKey::new("host", "web-01"))
                    .with_property("host_cpu_cores", "8"),
            ),
            entry(PropertyUpdate::tag_only(ResourceKey::new("host", "web-02")).with_tag("blue")),
        ];

        assert_ok!(sink(&server).send(&entries).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_batch_is_not_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/dimension/_batch")
            .expect(0)
            .create_async()
            .await;

        assert_ok!(sink(&server).send(&[]).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_2xx_is_backend_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/dimension/_batch")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let entries = vec![entry(PropertyUpdate::upsert(ResourceKey::new("host", "h")))];
        let err = assert_err!(sink(&server).send(&entries).await);
        match err {
            CoreError::Backend { status_code, body } => {
                assert_eq!(status_code, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("예상치 못한 에러: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_api_is_network_error() {
        let sink = HttpDimensionSink::new(reqwest::Client::new(), "http://127.0.0.1:1", "t");
        let entries = vec![entry(PropertyUpdate::upsert(ResourceKey::new("host", "h")))];
        assert!(matches!(
            sink.send(&entries).await,
            Err(CoreError::Network(_))
        ));
    }

    #[test]
    fn url_is_joined_with_batch_path() {
        let sink = HttpDimensionSink::new(reqwest::Client::new(), "https://api.example/", "t");
        assert_eq!(sink.url(), "https://api.example/v2/dimension/_batch");
    }
}
