//! 시스템 리소스 메트릭 수집.
//!
//! 에이전트가 실행 중인 호스트의 CPU/메모리/디스크 사용량을 게이지 데이터포인트로 만든다.
//! 결과 배치의 리소스에는 `host.name`, `os.type`이 붙어 호스트 메타데이터 동기화 대상이 된다.

use chrono::Utc;
use parking_lot::Mutex;
use pulsegate_core::models::telemetry::{DataPoint, MetricKind, MetricsBatch, Resource};
use std::collections::BTreeMap;
use sysinfo::{Disks, System};
use tracing::debug;

/// 호스트 이름을 알 수 없을 때 사용
const UNKNOWN_HOST: &str = "unknown";

/// 메트릭 이름
pub mod names {
    pub const CPU_UTILIZATION: &str = "system.cpu.utilization";
    pub const MEMORY_USED: &str = "system.memory.used";
    pub const MEMORY_TOTAL: &str = "system.memory.total";
    pub const MEMORY_UTILIZATION: &str = "system.memory.utilization";
    pub const DISK_USED: &str = "system.disk.used";
    pub const DISK_TOTAL: &str = "system.disk.total";
    pub const DISK_UTILIZATION: &str = "system.disk.utilization";
}

/// sysinfo 기반 시스템 메트릭 수집기
pub struct SystemMetricsCollector {
    sys: Mutex<System>,
    host_name: String,
}

impl SystemMetricsCollector {
    /// 새 수집기 생성
    pub fn new() -> Self {
        let host_name = System::host_name()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| UNKNOWN_HOST.to_string());
        Self::with_host_name(host_name)
    }

    /// 호스트 이름 지정 생성
    pub fn with_host_name(host_name: impl Into<String>) -> Self {
        let mut sys = System::new();
        // 첫 CPU 사용률 계산을 위한 기준값
        sys.refresh_cpu_usage();
        Self {
            sys: Mutex::new(sys),
            host_name: host_name.into(),
        }
    }

    /// 보고에 사용하는 호스트 이름
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// 배치 리소스
    pub fn resource(&self) -> Resource {
        Resource::new()
            .with_attribute("host.name", self.host_name.as_str())
            .with_attribute("os.type", std::env::consts::OS)
    }

    /// 메트릭 1회 수집
    pub fn collect(&self) -> MetricsBatch {
        let (cpu_usage, memory_used, memory_total) = {
            let mut sys = self.sys.lock();
            sys.refresh_cpu_usage();
            sys.refresh_memory();
            (
                f64::from(sys.global_cpu_usage()),
                sys.used_memory(),
                sys.total_memory(),
            )
        };

        let disks = Disks::new_with_refreshed_list();
        let (disk_used, disk_total) = disks.list().iter().fold((0u64, 0u64), |(used, total), d| {
            (
                used + d.total_space().saturating_sub(d.available_space()),
                total + d.total_space(),
            )
        });

        let now = Utc::now();
        let gauge = |metric: &str, value: f64| DataPoint {
            metric: metric.to_string(),
            kind: MetricKind::Gauge,
            value,
            timestamp: now,
            dimensions: BTreeMap::new(),
        };

        let mut points = vec![
            gauge(names::CPU_UTILIZATION, cpu_usage),
            gauge(names::MEMORY_USED, memory_used as f64),
            gauge(names::MEMORY_TOTAL, memory_total as f64),
        ];
        if let Some(ratio) = utilization(memory_used, memory_total) {
            points.push(gauge(names::MEMORY_UTILIZATION, ratio));
        }
        if disk_total > 0 {
            points.push(gauge(names::DISK_USED, disk_used as f64));
            points.push(gauge(names::DISK_TOTAL, disk_total as f64));
        }
        if let Some(ratio) = utilization(disk_used, disk_total) {
            points.push(gauge(names::DISK_UTILIZATION, ratio));
        }
        points.retain(|p| p.value.is_finite());

        debug!(
            "시스템 메트릭: CPU {:.1}%, 메모리 {}/{}MB",
            cpu_usage,
            memory_used / 1_048_576,
            memory_total / 1_048_576
        );

        MetricsBatch::new().with_resource(self.resource(), points)
    }
}

impl Default for SystemMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// 사용률 (%), 전체가 0이면 `None`
fn utilization(used: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| used as f64 / total as f64 * 100.0)
}
