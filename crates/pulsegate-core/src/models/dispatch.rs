//! 전송 결과 모델.

use serde::Serialize;

use crate::error::DispatchError;

/// 배치 1회 전송 결과
///
/// 항상 `accepted + dropped == 배치 크기`를 만족한다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    /// 백엔드가 수락한 레코드 수
    pub accepted: usize,
    /// 유실된 것으로 간주되는 레코드 수
    pub dropped: usize,
    /// 실패 원인 (성공 시 `None`)
    pub error: Option<DispatchError>,
}

impl DispatchResult {
    /// 전체 수락
    pub fn success(record_count: usize) -> Self {
        Self {
            accepted: record_count,
            dropped: 0,
            error: None,
        }
    }

    /// 전체 유실
    pub fn failure(record_count: usize, error: DispatchError) -> Self {
        Self {
            accepted: 0,
            dropped: record_count,
            error: Some(error),
        }
    }

    /// 전송 성공 여부
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// 배치 전체 레코드 수
    pub fn total(&self) -> usize {
        self.accepted + self.dropped
    }
}

/// 익스포터 push 결과 (부분 유실 포함)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    /// 수락된 레코드 수
    pub accepted: usize,
    /// 유실된 레코드 수
    pub dropped: usize,
}

impl PushReport {
    /// 전송 결과 누적
    pub fn absorb(&mut self, result: &DispatchResult) {
        self.accepted += result.accepted;
        self.dropped += result.dropped;
    }

    /// 전체 레코드 수
    pub fn total(&self) -> usize {
        self.accepted + self.dropped
    }
}
