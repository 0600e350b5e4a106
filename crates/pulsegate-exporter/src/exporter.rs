//! 텔레메트리 익스포터 파사드.
//!
//! 파이프라인이 호출하는 유일한 진입점. 배치를 인코딩해 전송하고,
//! 메트릭 전송에 성공하면 호스트 메타데이터 동기화를 곁가지로 수행한다.
//!
//! 결과 판정:
//! - 유실 0건 → `Ok`
//! - 일부 유실 → `Ok` (warn 로그)
//! - 전체 유실 → `Err(ExportError)`

use pulsegate_core::config::AppConfig;
use pulsegate_core::error::{CoreError, DispatchError, ExportError};
use pulsegate_core::models::dimension::PropertyUpdate;
use pulsegate_core::models::dispatch::{DispatchResult, PushReport};
use pulsegate_core::models::telemetry::{
    LogsBatch, MetricsBatch, TelemetryBatch, ACCESS_TOKEN_ATTRIBUTE,
};
use pulsegate_core::ports::encoder::WireEncoder;
use pulsegate_core::ports::host::HostPropertySource;
use pulsegate_core::ports::metadata::{DimensionSink, MetadataQueue};
use pulsegate_network::coordinator::{CoordinatorStats, MetadataUpdateCoordinator};
use pulsegate_network::dimension_client::HttpDimensionSink;
use pulsegate_network::dispatch_client::{DispatchClient, IngestTarget};
use pulsegate_network::encoding::{JsonDatapointEncoder, JsonEventEncoder};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::host_sync::{HostMetadataSyncer, SyncSummary};

/// 텔레메트리 익스포터
pub struct TelemetryExporter {
    client: DispatchClient,
    datapoint_target: IngestTarget,
    event_target: IngestTarget,
    datapoint_encoder: JsonDatapointEncoder,
    event_encoder: JsonEventEncoder,
    access_token_passthrough: bool,
    coordinator: Arc<MetadataUpdateCoordinator>,
    syncer: Option<HostMetadataSyncer>,
}

impl TelemetryExporter {
    /// 설정 기반 생성
    ///
    /// 전송 클라이언트, 압축기 풀, 디멘션 싱크, 코디네이터, 호스트 동기화기를 모두 연결한다.
    /// `host_metadata.enabled`가 꺼져 있으면 동기화기를 만들지 않는다.
    pub fn from_config(
        config: &AppConfig,
        host_source: Option<Arc<dyn HostPropertySource>>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let ingest = &config.ingest;
        let client = DispatchClient::from_config(ingest)?;
        let sink: Arc<dyn DimensionSink> = Arc::new(HttpDimensionSink::from_config(
            client.http_client().clone(),
            ingest,
        ));
        let coordinator = Arc::new(MetadataUpdateCoordinator::from_config(
            sink,
            &config.dimension,
        ));

        let syncer = config.host_metadata.enabled.then(|| {
            HostMetadataSyncer::new(
                Arc::clone(&coordinator) as Arc<dyn MetadataQueue>,
                host_source,
            )
        });

        let datapoint_encoder = JsonDatapointEncoder;
        let event_encoder = JsonEventEncoder;
        let datapoint_target = IngestTarget::datapoints(ingest, datapoint_encoder.content_type())?;
        let event_target = IngestTarget::events(ingest, event_encoder.content_type())?;

        info!(
            "익스포터 생성: ingest={}, api={}, 압축={:?}, 호스트 동기화={}",
            ingest.ingest_url,
            ingest.api_url,
            ingest.compression,
            syncer.is_some()
        );

        Ok(Self {
            client,
            datapoint_target,
            event_target,
            datapoint_encoder,
            event_encoder,
            access_token_passthrough: ingest.access_token_passthrough,
            coordinator,
            syncer,
        })
    }

    /// 메타데이터 flush 태스크 시작
    pub fn start(&self) -> Result<(), CoreError> {
        self.coordinator.start()
    }

    /// 종료 (남은 메타데이터 flush 후 반환)
    pub async fn shutdown(&self) {
        self.coordinator.stop().await;
    }

    /// 메트릭 배치 전송
    ///
    /// 모든 전송이 성공한 경우에만 호스트 메타데이터 동기화를 수행하며,
    /// 동기화 결과는 반환값에 영향을 주지 않는다.
    pub async fn push_metrics(
        &self,
        batch: &MetricsBatch,
        cancel: &CancellationToken,
    ) -> Result<PushReport, ExportError> {
        if batch.is_empty() {
            return Ok(PushReport::default());
        }

        let results = self
            .dispatch_partitioned(
                &self.datapoint_target,
                &self.datapoint_encoder,
                batch,
                cancel,
            )
            .await;

        if results.iter().all(DispatchResult::is_success) {
            if let Some(syncer) = &self.syncer {
                let summary = syncer.sync(batch);
                if summary != SyncSummary::default() {
                    debug!(
                        "호스트 동기화: enqueue={}, 변경 없음={}, 거부={}",
                        summary.enqueued, summary.unchanged, summary.rejected
                    );
                }
            }
        }

        conclude("메트릭", &results)
    }

    /// 로그 배치 전송 (이벤트로 변환)
    pub async fn push_logs(
        &self,
        batch: &LogsBatch,
        cancel: &CancellationToken,
    ) -> Result<PushReport, ExportError> {
        if batch.is_empty() {
            return Ok(PushReport::default());
        }

        let results = self
            .dispatch_partitioned(&self.event_target, &self.event_encoder, batch, cancel)
            .await;
        conclude("로그", &results)
    }

    /// 외부에서 만든 디멘션 업데이트 전달 (수락된 개수 반환)
    pub fn push_metadata(&self, updates: impl IntoIterator<Item = PropertyUpdate>) -> usize {
        updates
            .into_iter()
            .map(|update| self.coordinator.enqueue(update))
            .filter(|accepted| *accepted)
            .count()
    }

    /// 코디네이터 통계
    pub fn coordinator_stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    /// 즉시 메타데이터 flush
    pub async fn flush_metadata(&self) -> Result<usize, CoreError> {
        self.coordinator.flush_now().await
    }

    /// 토큰 패스스루를 적용해 전송 (토큰별 1회 요청)
    async fn dispatch_partitioned<R, E>(
        &self,
        target: &IngestTarget,
        encoder: &E,
        batch: &TelemetryBatch<R>,
        cancel: &CancellationToken,
    ) -> Vec<DispatchResult>
    where
        R: Clone,
        E: WireEncoder<R>,
    {
        let has_tokens = batch
            .resources
            .iter()
            .any(|r| r.resource.attribute(ACCESS_TOKEN_ATTRIBUTE).is_some());

        if !self.access_token_passthrough || !has_tokens {
            let result = self
                .client
                .send_batch(target, encoder, batch, None, cancel)
                .await;
            return vec![result];
        }

        let partitions = batch.partition_by_attribute(ACCESS_TOKEN_ATTRIBUTE);
        debug!("토큰 패스스루: {}개 파티션", partitions.len());

        let mut results = Vec::with_capacity(partitions.len());
        for (token, partition) in &partitions {
            let result = self
                .client
                .send_batch(target, encoder, partition, token.as_deref(), cancel)
                .await;
            results.push(result);
        }
        results
    }
}

/// 파티션 결과 합산 및 판정
fn conclude(kind: &str, results: &[DispatchResult]) -> Result<PushReport, ExportError> {
    let mut report = PushReport::default();
    let mut first_error: Option<&DispatchError> = None;
    for result in results {
        report.absorb(result);
        if first_error.is_none() {
            first_error = result.error.as_ref();
        }
    }

    match first_error {
        None => Ok(report),
        Some(_) if report.dropped < report.total() => {
            warn!(
                "{kind} 일부 유실: {}/{}건",
                report.dropped,
                report.total()
            );
            Ok(report)
        }
        Some(source) => Err(ExportError {
            source: source.clone(),
            dropped: report.dropped,
            total: report.total(),
        }),
    }
}
