//! Pulsegate 핵심 에러 타입.
//!
//! - [`CoreError`] — 설정, 직렬화, 메타데이터 전송 등 도메인 공통 에러
//! - [`DispatchError`] — 텔레메트리 배치 1회 전송의 실패 원인
//! - [`ExportError`] — 익스포터 push 호출자에게 전파되는 에러 (유실 건수 포함)

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 백엔드가 2xx 이외의 상태 코드로 응답
    #[error("백엔드 응답 오류 ({status_code}): {body}")]
    Backend {
        /// HTTP 상태 코드
        status_code: u16,
        /// 응답 본문 (진단용)
        body: String,
    },

    /// 잘못된 라이프사이클 호출 (중복 start 등)
    #[error("라이프사이클 에러: {0}")]
    Lifecycle(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

/// 텔레메트리 전송 실패 원인.
///
/// 어떤 경우든 배치 전체가 유실된 것으로 간주한다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// 연결 실패, 타임아웃, 취소
    #[error("전송 실패: {0}")]
    Transport(String),

    /// 백엔드가 2xx 이외의 상태 코드로 응답
    #[error("백엔드 응답 오류: HTTP {status_code}")]
    Backend {
        /// HTTP 상태 코드
        status_code: u16,
    },

    /// 인코딩/압축 실패 (네트워크 호출 전)
    #[error("인코딩 실패: {0}")]
    Encoding(String),
}

impl DispatchError {
    /// 취소로 인한 전송 실패
    pub fn cancelled() -> Self {
        Self::Transport("요청 취소됨".to_string())
    }
}

/// 익스포터 push 실패.
///
/// 배치 전체가 유실된 경우에만 반환된다. 부분 유실은 `PushReport`로 보고된다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{dropped}/{total}건 유실: {source}")]
pub struct ExportError {
    /// 첫 번째 전송 실패 원인
    pub source: DispatchError,
    /// 유실된 레코드 수
    pub dropped: usize,
    /// 배치 전체 레코드 수
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_error_message_includes_counts() {
        let err = ExportError {
            source: DispatchError::Backend { status_code: 503 },
            dropped: 3,
            total: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("3/3"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn cancelled_is_transport_error() {
        assert!(matches!(
            DispatchError::cancelled(),
            DispatchError::Transport(_)
        ));
    }
}
