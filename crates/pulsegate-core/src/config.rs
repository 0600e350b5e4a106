//! 애플리케이션 설정 구조체.
//!
//! 인제스트/API 엔드포인트, 인증 토큰, 압축, 디멘션 업데이트 버퍼링,
//! 호스트 메타데이터 동기화, 에이전트 수집 주기 등 런타임 설정을 정의한다.
//! `ConfigManager`를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 텔레메트리 인제스트 설정
    pub ingest: IngestConfig,
    /// 디멘션(메타데이터) 업데이트 설정
    #[serde(default)]
    pub dimension: DimensionConfig,
    /// 호스트 메타데이터 동기화 설정
    #[serde(default)]
    pub host_metadata: HostMetadataConfig,
    /// 에이전트 자체 수집 설정
    #[serde(default)]
    pub agent: AgentConfig,
}

// ============================================================
// 인제스트 설정
// ============================================================

/// 페이로드 압축 알고리즘
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// gzip (flate2)
    #[default]
    Gzip,
    /// Zstandard
    Zstd,
}

/// 텔레메트리 인제스트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// 데이터포인트/이벤트 인제스트 URL
    #[serde(default = "default_ingest_url")]
    pub ingest_url: String,
    /// 디멘션 업데이트 API URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// 액세스 토큰 (`X-SF-Token` 헤더)
    #[serde(default)]
    pub access_token: String,
    /// 사용자 정의 헤더 (기본 헤더를 덮어씀, Content-Encoding 제외)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// 요청 타임아웃 (밀리초)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// 호스트당 최대 유휴 연결 수
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// 유휴 연결 타임아웃 (초)
    #[serde(default = "default_idle_conn_timeout_secs")]
    pub idle_conn_timeout_secs: u64,
    /// 압축 알고리즘
    #[serde(default)]
    pub compression: CompressionAlgorithm,
    /// 이 크기(바이트) 미만의 페이로드는 압축하지 않음
    #[serde(default = "default_compression_threshold_bytes")]
    pub compression_threshold_bytes: usize,
    /// 리소스 속성의 토큰으로 배치별 인증 (토큰 패스스루)
    #[serde(default = "default_true")]
    pub access_token_passthrough: bool,
    /// 전송 페이로드 디버그 로깅
    #[serde(default)]
    pub log_data_points: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ingest_url: default_ingest_url(),
            api_url: default_api_url(),
            access_token: String::new(),
            headers: BTreeMap::new(),
            timeout_ms: default_timeout_ms(),
            max_connections: default_max_connections(),
            idle_conn_timeout_secs: default_idle_conn_timeout_secs(),
            compression: CompressionAlgorithm::Gzip,
            compression_threshold_bytes: default_compression_threshold_bytes(),
            access_token_passthrough: true,
            log_data_points: false,
        }
    }
}

// ============================================================
// 디멘션 업데이트 설정
// ============================================================

/// 디멘션 업데이트 코디네이터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionConfig {
    /// 플러시 주기 (밀리초)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// 대기 중인 업데이트 최대 개수 (리소스 키 기준)
    #[serde(default = "default_dimension_capacity")]
    pub capacity: usize,
    /// 플러시되는 업데이트 디버그 로깅
    #[serde(default)]
    pub log_updates: bool,
}

impl Default for DimensionConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            capacity: default_dimension_capacity(),
            log_updates: false,
        }
    }
}

/// 호스트 메타데이터 동기화 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostMetadataConfig {
    /// 메트릭 전송 성공 후 호스트 속성 동기화
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for HostMetadataConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// 에이전트 자체 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// 로컬 시스템 메트릭 수집/전송 주기 (밀리초)
    #[serde(default = "default_collect_interval_ms")]
    pub collect_interval_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            collect_interval_ms: default_collect_interval_ms(),
        }
    }
}

// ============================================================
// AppConfig impl
// ============================================================

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            ingest: IngestConfig::default(),
            dimension: DimensionConfig::default(),
            host_metadata: HostMetadataConfig::default(),
            agent: AgentConfig::default(),
        }
    }

    /// 설정값 유효성 검증
    ///
    /// 코어 컴포넌트 생성 전에 호출한다.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_url("ingest.ingest_url", &self.ingest.ingest_url)?;
        validate_url("ingest.api_url", &self.ingest.api_url)?;

        if self.ingest.timeout_ms == 0 {
            return Err(invalid("ingest.timeout_ms", "0보다 커야 합니다"));
        }
        if self.ingest.max_connections == 0 {
            return Err(invalid("ingest.max_connections", "0보다 커야 합니다"));
        }
        if self.dimension.capacity == 0 {
            return Err(invalid("dimension.capacity", "0보다 커야 합니다"));
        }
        if self.dimension.flush_interval_ms == 0 {
            return Err(invalid("dimension.flush_interval_ms", "0보다 커야 합니다"));
        }
        if self.agent.collect_interval_ms == 0 {
            return Err(invalid("agent.collect_interval_ms", "0보다 커야 합니다"));
        }
        for name in self.ingest.headers.keys() {
            if name.trim().is_empty() {
                return Err(invalid("ingest.headers", "빈 헤더 이름"));
            }
        }

        Ok(())
    }

    /// 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.ingest.timeout_ms)
    }

    /// 디멘션 플러시 주기를 Duration으로 반환
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.dimension.flush_interval_ms)
    }

    /// 에이전트 수집 주기를 Duration으로 반환
    pub fn collect_interval(&self) -> Duration {
        Duration::from_millis(self.agent.collect_interval_ms)
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), CoreError> {
    let parsed = url::Url::parse(value).map_err(|e| invalid(field, &format!("잘못된 URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(field, &format!("지원하지 않는 스킴: {other}"))),
    }
}

fn invalid(field: &str, message: &str) -> CoreError {
    CoreError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_true() -> bool {
    true
}

fn default_ingest_url() -> String {
    "https://ingest.us0.signalfx.com".to_string()
}
fn default_api_url() -> String {
    "https://api.us0.signalfx.com".to_string()
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_max_connections() -> usize {
    100
}
fn default_idle_conn_timeout_secs() -> u64 {
    30
}
fn default_compression_threshold_bytes() -> usize {
    1_500
}
fn default_flush_interval_ms() -> u64 {
    10_000
}
fn default_dimension_capacity() -> usize {
    10_000
}
fn default_collect_interval_ms() -> u64 {
    10_000
}
