//! 공유 HTTP 커넥션 풀.
//!
//! 전송 클라이언트와 디멘션 싱크가 같은 `reqwest::Client`를 공유해
//! 호스트당 keep-alive 커넥션을 재사용한다.

use pulsegate_core::config::IngestConfig;
use pulsegate_core::error::CoreError;
use std::time::Duration;

/// 설정 기반 HTTP 클라이언트 생성
///
/// - 요청 타임아웃: `timeout_ms`
/// - 호스트당 유휴 커넥션 상한: `max_connections`
/// - 유휴 커넥션 유지 시간: `idle_conn_timeout_secs`
///
/// 압축은 [`crate::compression`]에서 직접 처리하므로 reqwest의 자동 압축 해제만 사용한다.
pub fn build_http_client(config: &IngestConfig) -> Result<reqwest::Client, CoreError> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .pool_max_idle_per_host(config.max_connections)
        .pool_idle_timeout(Duration::from_secs(config.idle_conn_timeout_secs))
        .build()
        .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))
}
