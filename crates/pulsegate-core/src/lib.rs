//! # pulsegate-core
//!
//! Pulsegate 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 텔레메트리 배치, 전송 결과, 디멘션 업데이트 (serde Serialize/Deserialize)
//! - [`ports`] — Hexagonal Architecture 포트 인터페이스 (인코더, 메타데이터 큐, 디멘션 싱크)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 애플리케이션 설정 구조체
//! - [`config_manager`] — 설정 파일 관리 (로드/저장)

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;

#[cfg(test)]
mod tests {
    use crate::models::dimension::{PropertyUpdate, ResourceKey, UpdateKind};

    #[test]
    fn property_update_serde_roundtrip() {
        let update = PropertyUpdate::upsert(ResourceKey::new("host", "web-01"))
            .with_property("host_cpu_cores", "8")
            .with_tag("production");

        let json = serde_json::to_string(&update).unwrap();
        let deserialized: PropertyUpdate = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, update);
        assert_eq!(deserialized.kind, UpdateKind::Upsert);
    }

    #[test]
    fn config_defaults() {
        let config = crate::config::AppConfig::default_config();
        assert_eq!(config.dimension.flush_interval_ms, 10_000);
        assert_eq!(config.dimension.capacity, 10_000);
        assert_eq!(config.ingest.compression_threshold_bytes, 1_500);
        assert_eq!(config.ingest.idle_conn_timeout_secs, 30);
        assert!(config.host_metadata.enabled);
        assert!(config.validate().is_ok());
    }
}
