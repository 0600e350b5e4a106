//! 에이전트 종료 절차.
//!
//! OS 시그널을 watch 채널로 수집 루프에 알리고, 루프가 끝나면
//! 익스포터를 내려 남은 메타데이터를 flush한다.

use pulsegate_exporter::exporter::TelemetryExporter;
use pulsegate_network::coordinator::CoordinatorStats;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::scheduler::CollectionStats;

/// 종료 결과
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// 수집 루프 통계 (태스크가 비정상 종료했으면 `None`)
    pub collection: Option<CollectionStats>,
    /// 마지막 flush 이후 코디네이터 통계
    pub metadata: CoordinatorStats,
}

/// 에이전트 라이프사이클
pub struct AgentLifecycle {
    stop_tx: watch::Sender<bool>,
}

impl AgentLifecycle {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self { stop_tx }
    }

    /// 종료 신호 수신기
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// 수집 루프에 종료 알림 (중복 호출 무시)
    pub fn trigger(&self) {
        if !self.stop_tx.send_replace(true) {
            info!("종료 시작");
        }
    }

    /// SIGINT/SIGTERM(비 unix는 Ctrl+C) 대기, 수신한 시그널 이름 반환
    pub async fn wait_for_signal(&self) -> std::io::Result<&'static str> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt())?;
            let mut sigterm = signal(SignalKind::terminate())?;

            let name = tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            };
            Ok(name)
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            Ok("Ctrl+C")
        }
    }

    /// 수집 루프 정지 → 익스포터 종료(마지막 메타데이터 flush) 순으로 내린다
    pub async fn shutdown(
        &self,
        exporter: &TelemetryExporter,
        collection: JoinHandle<CollectionStats>,
    ) -> ShutdownReport {
        self.trigger();

        let collection = match collection.await {
            Ok(stats) => {
                info!(
                    "수집 루프 정지: 전송 {}회, 실패 {}회",
                    stats.pushes, stats.failures
                );
                Some(stats)
            }
            Err(e) => {
                error!("수집 태스크 비정상 종료: {e}");
                None
            }
        };

        exporter.shutdown().await;
        let metadata = exporter.coordinator_stats();
        info!(
            "메타데이터 flush 완료: {}건, 실패 {}회, 유실 {}건",
            metadata.flushed_updates, metadata.failed_flushes, metadata.dropped_updates
        );

        ShutdownReport {
            collection,
            metadata,
        }
    }
}

impl Default for AgentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
