//! # pulsegate-network
//!
//! 텔레메트리 수집 백엔드와의 HTTP 통신 어댑터.
//! 배치 인코딩, 압축기 풀, 단일 배치 전송 클라이언트,
//! 디멘션 메타데이터 업데이트 코디네이터를 제공한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use pulsegate_network::dispatch_client::{DispatchClient, IngestTarget};
//! use pulsegate_network::coordinator::MetadataUpdateCoordinator;
//! use pulsegate_network::dimension_client::HttpDimensionSink;
//! ```

pub mod compression;
pub mod coordinator;
pub mod dimension_client;
pub mod dispatch_client;
pub mod encoding;
pub mod pending;
pub mod transport;
