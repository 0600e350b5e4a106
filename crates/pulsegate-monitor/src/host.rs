//! 로컬 호스트 속성.
//!
//! `HostPropertySource` 포트 구현. 생성 시 sysinfo로 한 번만 수집해 캐시한다.

use pulsegate_core::ports::host::HostPropertySource;
use std::collections::BTreeMap;
use sysinfo::System;
use tracing::debug;

/// CPU 모델명
pub const PROP_CPU_MODEL: &str = "host_cpu_model";
/// 논리 CPU 수
pub const PROP_CPU_CORES: &str = "host_cpu_cores";
/// 전체 메모리 (KiB)
pub const PROP_MEM_TOTAL: &str = "host_mem_total";
/// OS 이름 (배포판 포함)
pub const PROP_OS_NAME: &str = "host_os_name";
/// 커널 릴리스
pub const PROP_KERNEL_RELEASE: &str = "host_kernel_release";
/// 커널 이름 (linux, macos, windows …)
pub const PROP_KERNEL_NAME: &str = "host_kernel_name";
/// 머신 아키텍처
pub const PROP_MACHINE: &str = "host_machine";

/// sysinfo 기반 호스트 속성 (`HostPropertySource` 구현)
#[derive(Debug, Clone)]
pub struct SysInfoHostProperties {
    host_name: Option<String>,
    properties: BTreeMap<String, String>,
}

impl SysInfoHostProperties {
    /// 현재 호스트 속성 수집
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let mut properties = BTreeMap::new();

        let cpus = sys.cpus();
        if !cpus.is_empty() {
            properties.insert(PROP_CPU_CORES.to_string(), cpus.len().to_string());
        }
        if let Some(brand) = cpus.first().map(|c| c.brand().trim()).filter(|b| !b.is_empty()) {
            properties.insert(PROP_CPU_MODEL.to_string(), brand.to_string());
        }

        let mem_total = sys.total_memory();
        if mem_total > 0 {
            properties.insert(PROP_MEM_TOTAL.to_string(), (mem_total / 1024).to_string());
        }

        if let Some(os) = System::long_os_version().or_else(System::name) {
            properties.insert(PROP_OS_NAME.to_string(), os);
        }
        if let Some(kernel) = System::kernel_version() {
            properties.insert(PROP_KERNEL_RELEASE.to_string(), kernel);
        }
        properties.insert(
            PROP_KERNEL_NAME.to_string(),
            std::env::consts::OS.to_string(),
        );
        properties.insert(PROP_MACHINE.to_string(), std::env::consts::ARCH.to_string());

        let host_name = System::host_name().filter(|h| !h.is_empty());
        debug!(
            "호스트 속성 수집: host={:?}, 속성 {}개",
            host_name,
            properties.len()
        );

        Self {
            host_name,
            properties,
        }
    }

    /// 직접 구성 (테스트/고정 속성용)
    pub fn from_parts(host_name: Option<String>, properties: BTreeMap<String, String>) -> Self {
        Self {
            host_name,
            properties,
        }
    }
}

impl HostPropertySource for SysInfoHostProperties {
    fn host_name(&self) -> Option<&str> {
        self.host_name.as_deref()
    }

    fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}
