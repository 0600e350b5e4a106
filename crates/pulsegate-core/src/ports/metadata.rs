//! 메타데이터 업데이트 포트.
//!
//! - [`MetadataQueue`] — 업데이트 접수 (구현: `pulsegate-network::coordinator`)
//! - [`DimensionSink`] — 병합된 업데이트 전송 (구현: `pulsegate-network::dimension_client`)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::dimension::{PropertyUpdate, UpdateQueueEntry};

/// 디멘션 업데이트 접수 큐
pub trait MetadataQueue: Send + Sync {
    /// 업데이트 접수
    ///
    /// 용량 초과 등으로 거부되면 `false`. I/O로 블로킹하지 않는다.
    fn enqueue(&self, update: PropertyUpdate) -> bool;
}

/// 병합된 디멘션 업데이트를 백엔드로 전송
#[async_trait]
pub trait DimensionSink: Send + Sync {
    /// 플러시 배치 1회 전송
    async fn send(&self, entries: &[UpdateQueueEntry]) -> Result<(), CoreError>;
}
