//! 텔레메트리 배치 모델.
//!
//! 리소스(모니터링 대상)별로 묶인 데이터포인트/로그 레코드의 순서 있는 모음.
//! 전송 계층에 넘겨진 배치는 변경하지 않는다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 배치별 액세스 토큰을 담는 리소스 속성 (전송 시 디멘션에서 제외)
pub const ACCESS_TOKEN_ATTRIBUTE: &str = "sfx.access_token";

/// 모니터링 대상 리소스 (호스트, 컨테이너 등)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// 리소스 속성 (예: "host.name", "os.type")
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Resource {
    /// 빈 리소스 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 속성 추가 (빌더)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// 속성 조회
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// 메트릭 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// 순간값
    Gauge,
    /// 주기별 증가량
    Counter,
    /// 누적 카운터
    CumulativeCounter,
}

/// 단일 데이터포인트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// 메트릭 이름 (예: "cpu.utilization")
    pub metric: String,
    /// 메트릭 유형
    pub kind: MetricKind,
    /// 측정값
    pub value: f64,
    /// 측정 시각
    pub timestamp: DateTime<Utc>,
    /// 데이터포인트 디멘션
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
}

impl DataPoint {
    /// 게이지 데이터포인트 생성 (현재 시각)
    pub fn gauge(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            kind: MetricKind::Gauge,
            value,
            timestamp: Utc::now(),
            dimensions: BTreeMap::new(),
        }
    }

    /// 디멘션 추가 (빌더)
    pub fn with_dimension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(key.into(), value.into());
        self
    }
}

/// 로그 심각도
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// 단일 로그 레코드 (백엔드에는 이벤트로 전송)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 발생 시각
    pub timestamp: DateTime<Utc>,
    /// 심각도
    #[serde(default)]
    pub severity: Severity,
    /// 본문 (이벤트 유형으로 사용)
    pub body: String,
    /// 추가 속성
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl LogRecord {
    /// 로그 레코드 생성 (현재 시각, Info)
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity: Severity::Info,
            body: body.into(),
            attributes: BTreeMap::new(),
        }
    }
}

/// 하나의 리소스에 속한 레코드 묶음
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecords<R> {
    /// 레코드가 속한 리소스
    pub resource: Resource,
    /// 레코드 (순서 유지)
    pub records: Vec<R>,
}

/// 텔레메트리 배치
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryBatch<R> {
    /// 리소스별 레코드 묶음 (순서 유지)
    pub resources: Vec<ResourceRecords<R>>,
}

/// 메트릭 배치
pub type MetricsBatch = TelemetryBatch<DataPoint>;

/// 로그 배치
pub type LogsBatch = TelemetryBatch<LogRecord>;

impl<R> Default for TelemetryBatch<R> {
    fn default() -> Self {
        Self {
            resources: Vec::new(),
        }
    }
}

impl<R> TelemetryBatch<R> {
    /// 빈 배치 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 리소스 묶음 추가 (빌더)
    pub fn with_resource(mut self, resource: Resource, records: Vec<R>) -> Self {
        self.resources.push(ResourceRecords { resource, records });
        self
    }

    /// 전체 레코드 수
    pub fn record_count(&self) -> usize {
        self.resources.iter().map(|r| r.records.len()).sum()
    }

    /// 레코드가 없는지
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

impl<R: Clone> TelemetryBatch<R> {
    /// 리소스 속성 값으로 배치 분할
    ///
    /// 처음 등장한 순서대로 파티션을 반환하며, 분할 기준 속성은 각 리소스에서 제거된다.
    /// 속성이 없는 리소스는 `None` 파티션에 모인다.
    pub fn partition_by_attribute(&self, key: &str) -> Vec<(Option<String>, TelemetryBatch<R>)> {
        let mut partitions: Vec<(Option<String>, TelemetryBatch<R>)> = Vec::new();

        for group in &self.resources {
            let mut resource = group.resource.clone();
            let value = resource.attributes.remove(key);

            let records = ResourceRecords {
                resource,
                records: group.records.clone(),
            };
            match partitions.iter_mut().find(|(v, _)| *v == value) {
                Some((_, batch)) => batch.resources.push(records),
                None => partitions.push((
                    value,
                    TelemetryBatch {
                        resources: vec![records],
                    },
                )),
            }
        }

        partitions
    }
}
