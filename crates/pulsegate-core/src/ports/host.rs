//! 호스트 속성 포트.
//!
//! 구현: `pulsegate-monitor` crate (sysinfo)

use std::collections::BTreeMap;

/// 로컬 호스트의 정적 속성 제공자
///
/// 메트릭 push 경로에서 호출되므로 I/O 없이 캐시된 값만 반환해야 한다.
pub trait HostPropertySource: Send + Sync {
    /// 로컬 호스트 이름
    fn host_name(&self) -> Option<&str>;

    /// 호스트 속성 (예: "host_cpu_cores" → "8")
    fn properties(&self) -> &BTreeMap<String, String>;
}
