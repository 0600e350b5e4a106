//! 에이전트 자체 수집 루프.
//!
//! 주기마다 로컬 시스템 메트릭을 수집해 익스포터로 전송한다.
//! 종료 신호를 받으면 진행 중인 전송을 취소하고 루프를 빠져나간다.

use pulsegate_exporter::exporter::TelemetryExporter;
use pulsegate_monitor::system::SystemMetricsCollector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 수집 루프 누적 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// 전송 시도 횟수
    pub pushes: u64,
    /// 배치 전체가 유실된 전송 횟수
    pub failures: u64,
    /// 수락된 데이터포인트 수
    pub accepted: usize,
    /// 유실된 데이터포인트 수
    pub dropped: usize,
}

/// 수집 스케줄러
pub struct CollectionScheduler {
    exporter: Arc<TelemetryExporter>,
    collector: Arc<SystemMetricsCollector>,
    interval: Duration,
}

impl CollectionScheduler {
    pub fn new(
        exporter: Arc<TelemetryExporter>,
        collector: Arc<SystemMetricsCollector>,
        interval: Duration,
    ) -> Self {
        Self {
            exporter,
            collector,
            interval,
        }
    }

    /// 종료 신호까지 수집/전송 반복
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> CollectionStats {
        let mut stats = CollectionStats::default();
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("수집 루프 시작: 주기 {:?}", self.interval);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let cancel = CancellationToken::new();
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => {
                            cancel.cancel();
                            debug!("종료 신호로 진행 중인 전송 취소");
                            break;
                        }
                        _ = self.collect_and_push(&cancel, &mut stats) => {}
                    }
                }
            }
        }

        info!(
            "수집 루프 종료: 전송 {}회, 실패 {}회, 수락 {}건, 유실 {}건",
            stats.pushes, stats.failures, stats.accepted, stats.dropped
        );
        stats
    }

    /// 1회 수집 후 전송
    async fn collect_and_push(&self, cancel: &CancellationToken, stats: &mut CollectionStats) {
        let batch = self.collector.collect();
        stats.pushes += 1;

        match self.exporter.push_metrics(&batch, cancel).await {
            Ok(report) => {
                stats.accepted += report.accepted;
                stats.dropped += report.dropped;
                debug!("시스템 메트릭 전송: {}건", report.accepted);
            }
            Err(e) => {
                stats.failures += 1;
                stats.dropped += e.dropped;
                warn!("시스템 메트릭 전송 실패: {e}");
            }
        }
    }
}
