//! 텔레메트리 배치 → 백엔드 JSON 와이어 포맷 인코더.
//!
//! - 데이터포인트: `POST /v2/datapoint`, 메트릭 유형별 배열
//! - 로그: `POST /v2/event`, 커스텀 이벤트 배열
//!
//! 리소스 속성은 `.`을 `_`로 바꿔 디멘션으로 합치며, 같은 이름이면 레코드 쪽 값이 우선한다.

use pulsegate_core::error::DispatchError;
use pulsegate_core::models::telemetry::{
    DataPoint, LogRecord, LogsBatch, MetricKind, MetricsBatch, Resource, Severity,
    ACCESS_TOKEN_ATTRIBUTE,
};
use pulsegate_core::ports::encoder::WireEncoder;
use serde::Serialize;
use std::collections::BTreeMap;

/// JSON Content-Type
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// 커스텀 이벤트 카테고리
const EVENT_CATEGORY: &str = "USER_DEFINED";

/// 리소스 속성 이름을 디멘션 이름으로 변환 (`host.name` → `host_name`)
pub fn flatten_key(key: &str) -> String {
    key.replace('.', "_")
}

/// 리소스 속성 + 레코드 속성 → 디멘션 (레코드 우선, 토큰 속성 제외)
fn merge_dimensions(
    resource: &Resource,
    record: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut dimensions: BTreeMap<String, String> = resource
        .attributes
        .iter()
        .filter(|(k, _)| k.as_str() != ACCESS_TOKEN_ATTRIBUTE)
        .map(|(k, v)| (flatten_key(k), v.clone()))
        .collect();
    dimensions.extend(record.iter().map(|(k, v)| (k.clone(), v.clone())));
    dimensions
}

#[derive(Serialize)]
struct WireDatapoint<'a> {
    metric: &'a str,
    value: f64,
    dimensions: BTreeMap<String, String>,
    timestamp: i64,
}

#[derive(Serialize, Default)]
struct DatapointPayload<'a> {
    gauge: Vec<WireDatapoint<'a>>,
    counter: Vec<WireDatapoint<'a>>,
    cumulative_counter: Vec<WireDatapoint<'a>>,
}

/// 데이터포인트 JSON 인코더
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDatapointEncoder;

impl WireEncoder<DataPoint> for JsonDatapointEncoder {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn encode(&self, batch: &MetricsBatch) -> Result<Vec<u8>, DispatchError> {
        let mut payload = DatapointPayload::default();

        for group in &batch.resources {
            for point in &group.records {
                if !point.value.is_finite() {
                    return Err(DispatchError::Encoding(format!(
                        "유한하지 않은 값: {} = {}",
                        point.metric, point.value
                    )));
                }
                let wire = WireDatapoint {
                    metric: &point.metric,
                    value: point.value,
                    dimensions: merge_dimensions(&group.resource, &point.dimensions),
                    timestamp: point.timestamp.timestamp_millis(),
                };
                match point.kind {
                    MetricKind::Gauge => payload.gauge.push(wire),
                    MetricKind::Counter => payload.counter.push(wire),
                    MetricKind::CumulativeCounter => payload.cumulative_counter.push(wire),
                }
            }
        }

        serde_json::to_vec(&payload)
            .map_err(|e| DispatchError::Encoding(format!("데이터포인트 직렬화 실패: {e}")))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent<'a> {
    category: &'static str,
    event_type: &'a str,
    dimensions: BTreeMap<String, String>,
    properties: BTreeMap<&'a str, &'a str>,
    timestamp: i64,
}

fn severity_label(record: &LogRecord) -> &'static str {
    match record.severity {
        Severity::Debug => "debug",
        Severity::Info => "info",
        Severity::Warn => "warn",
        Severity::Error => "error",
    }
}

/// 로그 → 이벤트 JSON 인코더
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEventEncoder;

impl WireEncoder<LogRecord> for JsonEventEncoder {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn encode(&self, batch: &LogsBatch) -> Result<Vec<u8>, DispatchError> {
        let empty = BTreeMap::new();
        let mut events = Vec::with_capacity(batch.record_count());

        for group in &batch.resources {
            for record in &group.records {
                let mut properties: BTreeMap<&str, &str> = record
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                properties.insert("severity", severity_label(record));

                events.push(WireEvent {
                    category: EVENT_CATEGORY,
                    event_type: &record.body,
                    dimensions: merge_dimensions(&group.resource, &empty),
                    properties,
                    timestamp: record.timestamp.timestamp_millis(),
                });
            }
        }

        serde_json::to_vec(&events)
            .map_err(|e| DispatchError::Encoding(format!("이벤트 직렬화 실패: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    fn ts() -> chrono::DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
    }

    fn point(metric: &str, kind: MetricKind, value: f64) -> DataPoint {
        DataPoint {
            metric: metric.into(),
            kind,
            value,
            timestamp: ts(),
            dimensions: BTreeMap::new(),
        }
    }

    #[test]
    fn datapoints_grouped_by_kind() {
        let batch = MetricsBatch::new().with_resource(
            Resource::new().with_attribute("host.name", "web-01"),
            vec![
                point("cpu.utilization", MetricKind::Gauge, 12.5),
                point("requests", MetricKind::Counter, 3.0),
                point("bytes.sent", MetricKind::CumulativeCounter, 1024.0),
            ],
        );

        let body = JsonDatapointEncoder.encode(&batch).unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(
            value["gauge"][0],
            json!({
                "metric": "cpu.utilization",
                "value": 12.5,
                "dimensions": {"host_name": "web-01"},
                "timestamp": 1_700_000_000_123i64
            })
        );
        assert_eq!(value["counter"][0]["metric"], "requests");
        assert_eq!(value["cumulative_counter"][0]["value"], 1024.0);
    }

    #[test]
    fn record_dimension_wins_over_resource_attribute() {
        let batch = MetricsBatch::new().with_resource(
            Resource::new().with_attribute("region", "us-east"),
            vec![point("m", MetricKind::Gauge, 1.0).with_dimension("region", "eu-west")],
        );

        let body = JsonDatapointEncoder.encode(&batch).unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["gauge"][0]["dimensions"]["region"], "eu-west");
    }

    #[test]
    fn access_token_attribute_never_becomes_dimension() {
        let batch = MetricsBatch::new().with_resource(
            Resource::new()
                .with_attribute("host.name", "h")
                .with_attribute(ACCESS_TOKEN_ATTRIBUTE, "secret"),
            vec![point("m", MetricKind::Gauge, 1.0)],
        );

        let body = JsonDatapointEncoder.encode(&batch).unwrap();
        assert!(!String::from_utf8(body).unwrap().contains("secret"));
    }

    #[test]
    fn non_finite_value_is_encoding_error() {
        let batch = MetricsBatch::new()
            .with_resource(Resource::new(), vec![point("m", MetricKind::Gauge, f64::NAN)]);
        assert!(matches!(
            JsonDatapointEncoder.encode(&batch),
            Err(DispatchError::Encoding(_))
        ));
    }

    #[test]
    fn logs_become_events() {
        let mut record = LogRecord::new("deploy finished");
        record.timestamp = ts();
        record.severity = Severity::Warn;
        record.attributes.insert("version".into(), "1.2.3".into());

        let batch = LogsBatch::new().with_resource(
            Resource::new().with_attribute("service.name", "api"),
            vec![record],
        );

        let body = JsonEventEncoder.encode(&batch).unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(
            value,
            json!([{
                "category": "USER_DEFINED",
                "eventType": "deploy finished",
                "dimensions": {"service_name": "api"},
                "properties": {"severity": "warn", "version": "1.2.3"},
                "timestamp": 1_700_000_000_123i64
            }])
        );
    }

    #[test]
    fn content_type_is_json() {
        assert_eq!(
            WireEncoder::<DataPoint>::content_type(&JsonDatapointEncoder),
            "application/json"
        );
        assert_eq!(
            WireEncoder::<LogRecord>::content_type(&JsonEventEncoder),
            "application/json"
        );
    }
}
