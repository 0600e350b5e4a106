//! # pulsegate-monitor
//!
//! 로컬 호스트 어댑터.
//! sysinfo로 호스트 속성(CPU 모델, 코어 수, 메모리, OS/커널)을 한 번 수집해
//! `HostPropertySource` 포트로 제공하고, 에이전트 자체 모니터링용
//! CPU/메모리/디스크 사용량을 `MetricsBatch`로 수집한다.

pub mod host;
pub mod system;
