//! # pulsegate-exporter
//!
//! 파이프라인이 호출하는 익스포터 진입점.
//!
//! - [`exporter`] — `push_metrics` / `push_logs` / `push_metadata`, 토큰 패스스루, 결과 판정
//! - [`host_sync`] — 전송 성공한 메트릭 배치에서 호스트 속성 변경을 감지해 디멘션 업데이트로 변환

pub mod exporter;
pub mod host_sync;
