//! 단일 배치 전송 클라이언트.
//!
//! 인코딩된 페이로드 하나를 인제스트 엔드포인트로 POST하고 결과를
//! [`DispatchResult`]로 보고한다. 재시도는 하지 않으며, 실패하면 배치 전체가 유실된다.

use pulsegate_core::config::IngestConfig;
use pulsegate_core::error::{CoreError, DispatchError};
use pulsegate_core::models::dispatch::DispatchResult;
use pulsegate_core::models::telemetry::TelemetryBatch;
use pulsegate_core::ports::encoder::WireEncoder;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::compression::{CompressorPool, DEFAULT_POOL_CAPACITY};
use crate::transport::build_http_client;

/// 액세스 토큰 헤더 (`X-SF-Token`)
pub const ACCESS_TOKEN_HEADER: &str = "x-sf-token";

/// 데이터포인트 엔드포인트 경로
pub const DATAPOINT_PATH: &str = "/v2/datapoint";

/// 이벤트 엔드포인트 경로
pub const EVENT_PATH: &str = "/v2/event";

/// User-Agent 값
pub const USER_AGENT_VALUE: &str = concat!("pulsegate/", env!("CARGO_PKG_VERSION"));

/// 전송 대상 (URL + 요청마다 보낼 헤더)
#[derive(Debug, Clone)]
pub struct IngestTarget {
    url: String,
    headers: HeaderMap,
}

impl IngestTarget {
    /// 전송 대상 생성
    ///
    /// 기본 헤더(Content-Type, Connection, User-Agent, X-SF-Token) 위에 사용자 헤더를 덮어쓴다.
    /// 압축 방식은 페이로드마다 결정되므로 사용자가 지정한 Content-Encoding은 무시한다.
    pub fn new(
        url: impl Into<String>,
        content_type: &str,
        access_token: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Self, CoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, header_value(content_type)?);
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        if !access_token.is_empty() {
            headers.insert(ACCESS_TOKEN_HEADER, header_value(access_token)?);
        }

        for (name, value) in overrides {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CoreError::Config(format!("잘못된 헤더 이름 '{name}': {e}")))?;
            if name == CONTENT_ENCODING {
                warn!("사용자 지정 Content-Encoding 헤더 무시");
                continue;
            }
            headers.insert(name, header_value(value)?);
        }

        Ok(Self {
            url: url.into(),
            headers,
        })
    }

    /// 데이터포인트 엔드포인트
    pub fn datapoints(config: &IngestConfig, content_type: &str) -> Result<Self, CoreError> {
        Self::new(
            join_url(&config.ingest_url, DATAPOINT_PATH),
            content_type,
            &config.access_token,
            &config.headers,
        )
    }

    /// 이벤트 엔드포인트
    pub fn events(config: &IngestConfig, content_type: &str) -> Result<Self, CoreError> {
        Self::new(
            join_url(&config.ingest_url, EVENT_PATH),
            content_type,
            &config.access_token,
            &config.headers,
        )
    }

    /// 요청 URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 기본 요청 헤더
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// 기본 URL과 경로 결합 (중복 슬래시 제거)
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn header_value(value: &str) -> Result<HeaderValue, CoreError> {
    HeaderValue::from_str(value)
        .map_err(|e| CoreError::Config(format!("잘못된 헤더 값: {e}")))
}

/// 배치 전송 클라이언트
///
/// `reqwest::Client`(커넥션 풀)와 압축기 풀을 공유하므로 동시에 여러 전송을 수행해도 안전하다.
#[derive(Clone)]
pub struct DispatchClient {
    client: reqwest::Client,
    compressors: Arc<CompressorPool>,
    log_payloads: bool,
}

impl DispatchClient {
    /// 새 전송 클라이언트 생성
    pub fn new(client: reqwest::Client, compressors: Arc<CompressorPool>) -> Self {
        Self {
            client,
            compressors,
            log_payloads: false,
        }
    }

    /// 설정 기반 생성 (HTTP 클라이언트 포함)
    pub fn from_config(config: &IngestConfig) -> Result<Self, CoreError> {
        let client = build_http_client(config)?;
        let pool = CompressorPool::new(
            config.compression,
            DEFAULT_POOL_CAPACITY,
            config.compression_threshold_bytes,
        );
        Ok(Self::new(client, Arc::new(pool)).with_payload_logging(config.log_data_points))
    }

    /// 페이로드 디버그 로깅 설정
    pub fn with_payload_logging(mut self, enabled: bool) -> Self {
        self.log_payloads = enabled;
        self
    }

    /// 공유 HTTP 클라이언트
    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// 압축기 풀
    pub fn compressors(&self) -> &Arc<CompressorPool> {
        &self.compressors
    }

    /// 배치 인코딩 후 전송
    ///
    /// 인코딩 실패 시 네트워크 호출 없이 배치 전체를 유실 처리한다.
    pub async fn send_batch<R, E>(
        &self,
        target: &IngestTarget,
        encoder: &E,
        batch: &TelemetryBatch<R>,
        token_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> DispatchResult
    where
        E: WireEncoder<R> + ?Sized,
    {
        let record_count = batch.record_count();
        match encoder.encode(batch) {
            Ok(payload) => {
                self.dispatch(target, payload, record_count, token_override, cancel)
                    .await
            }
            Err(e) => {
                warn!("배치 인코딩 실패 ({record_count}건 유실): {e}");
                DispatchResult::failure(record_count, e)
            }
        }
    }

    /// 인코딩된 페이로드 1회 전송
    ///
    /// - 2xx → 전체 수락
    /// - 2xx 이외 → `Backend`, 전체 유실
    /// - 연결 실패/타임아웃/취소 → `Transport`, 전체 유실
    /// - 압축 실패 → `Encoding`, 전체 유실 (요청 보내지 않음)
    pub async fn dispatch(
        &self,
        target: &IngestTarget,
        payload: Vec<u8>,
        record_count: usize,
        token_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> DispatchResult {
        if cancel.is_cancelled() {
            return DispatchResult::failure(record_count, DispatchError::cancelled());
        }

        if self.log_payloads {
            debug!(
                "전송 페이로드 ({}): {}",
                target.url,
                String::from_utf8_lossy(&payload)
            );
        }

        let compressed = match self.compressors.compress(payload) {
            Ok(compressed) => compressed,
            Err(e) => {
                warn!("페이로드 압축 실패 ({record_count}건 유실): {e}");
                return DispatchResult::failure(record_count, e);
            }
        };

        let mut headers = target.headers.clone();
        if let Some(encoding) = compressed.encoding.header_value() {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }
        if let Some(token) = token_override {
            match HeaderValue::from_str(token) {
                Ok(value) => {
                    headers.insert(ACCESS_TOKEN_HEADER, value);
                }
                Err(e) => {
                    let error = DispatchError::Encoding(format!("잘못된 액세스 토큰: {e}"));
                    return DispatchResult::failure(record_count, error);
                }
            }
        }

        let request = self
            .client
            .post(&target.url)
            .headers(headers)
            .body(compressed.body)
            .send();

        // 응답 본문까지 읽어야 커넥션이 재사용되므로 본문 읽기도 취소 범위에 포함
        let exchange = async {
            let response = request.await?;
            let status = response.status();
            Ok::<_, reqwest::Error>((status, response.text().await))
        };

        let (status, body) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("전송 취소: {}", target.url);
                return DispatchResult::failure(record_count, DispatchError::cancelled());
            }
            result = exchange => match result {
                Ok(exchanged) => exchanged,
                Err(e) => {
                    warn!("전송 실패 ({record_count}건 유실): {e}");
                    return DispatchResult::failure(
                        record_count,
                        DispatchError::Transport(e.to_string()),
                    );
                }
            },
        };

        let body = body.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패 ({}): {e}", status.as_u16());
            String::new()
        });

        if status.is_success() {
            debug!("배치 전송 성공: {record_count}건 → {}", target.url);
            DispatchResult::success(record_count)
        } else {
            warn!(
                "백엔드 거부 ({}, {record_count}건 유실): {}",
                status.as_u16(),
                body
            );
            DispatchResult::failure(
                record_count,
                DispatchError::Backend {
                    status_code: status.as_u16(),
                },
            )
        }
    }
}
