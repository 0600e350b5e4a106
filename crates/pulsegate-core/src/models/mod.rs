//! Pulsegate 도메인 모델.
//!
//! 파이프라인 구성 요소 간에 공유하는 데이터 구조체를 정의한다.

pub mod dimension;
pub mod dispatch;
pub mod telemetry;
