//! 와이어 인코더 포트.
//!
//! 구현: `pulsegate-network` crate (serde_json)

use crate::error::DispatchError;
use crate::models::telemetry::TelemetryBatch;

/// 텔레메트리 배치를 백엔드 전송 형식의 바이트로 변환
///
/// 같은 입력에 대해 항상 같은 출력을 내야 하며 부수 효과가 없어야 한다.
pub trait WireEncoder<R>: Send + Sync {
    /// 인코딩 결과의 Content-Type
    fn content_type(&self) -> &'static str;

    /// 배치 인코딩 (압축 전 원본)
    fn encode(&self, batch: &TelemetryBatch<R>) -> Result<Vec<u8>, DispatchError>;
}
