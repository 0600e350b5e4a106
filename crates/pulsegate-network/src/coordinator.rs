//! 디멘션 메타데이터 업데이트 코디네이터.
//!
//! 여러 producer가 보낸 [`PropertyUpdate`]를 리소스 키별로 병합해 두었다가
//! 주기적으로 한 번의 [`DimensionSink::send`] 호출로 내보낸다.
//!
//! 라이프사이클: `Idle` → [`start`](MetadataUpdateCoordinator::start) → `Running`
//! → [`stop`](MetadataUpdateCoordinator::stop) → `Stopped`.
//! 중지 시 남은 업데이트를 마지막으로 한 번 flush한다.

use chrono::Utc;
use parking_lot::Mutex;
use pulsegate_core::config::DimensionConfig;
use pulsegate_core::error::CoreError;
use pulsegate_core::models::dimension::PropertyUpdate;
use pulsegate_core::ports::metadata::{DimensionSink, MetadataQueue};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pending::{PendingUpdates, UpsertOutcome};

/// 코디네이터 통계 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// 현재 대기 중인 키 수
    pub pending: usize,
    /// 새 키로 추가된 업데이트 수
    pub enqueued: u64,
    /// 기존 키에 병합된 업데이트 수
    pub coalesced: u64,
    /// 거부된 업데이트 수 (용량 초과, 중지 후)
    pub rejected: u64,
    /// 싱크로 전송 완료된 항목 수
    pub flushed_updates: u64,
    /// 실패한 flush 횟수
    pub failed_flushes: u64,
    /// 실패한 flush로 유실된 항목 수
    pub dropped_updates: u64,
}

/// 락으로 보호되는 큐 상태
struct QueueState {
    pending: PendingUpdates,
    stopped: bool,
    enqueued: u64,
    coalesced: u64,
    rejected: u64,
}

#[derive(Default)]
struct FlushCounters {
    flushed_updates: u64,
    failed_flushes: u64,
    dropped_updates: u64,
}

/// 코디네이터와 flush 태스크가 공유하는 상태
struct Shared {
    state: Mutex<QueueState>,
    counters: Mutex<FlushCounters>,
    sink: Arc<dyn DimensionSink>,
    log_updates: bool,
}

impl Shared {
    /// 대기 항목을 모두 꺼내 싱크로 전송
    ///
    /// 실패한 배치는 재시도하지 않고 유실 처리한다.
    async fn flush(&self) -> Result<usize, CoreError> {
        let batch = {
            let mut state = self.state.lock();
            state.pending.drain()
        };
        if batch.is_empty() {
            return Ok(0);
        }

        let count = batch.len();
        if self.log_updates {
            for entry in &batch {
                debug!(
                    "디멘션 업데이트: {} ({:?}) 속성={:?} 태그={:?}",
                    entry.update.resource_key,
                    entry.update.kind,
                    entry.update.properties,
                    entry.update.tags
                );
            }
        }

        match self.sink.send(&batch).await {
            Ok(()) => {
                self.counters.lock().flushed_updates += count as u64;
                debug!("디멘션 업데이트 {count}건 flush 완료");
                Ok(count)
            }
            Err(e) => {
                {
                    let mut counters = self.counters.lock();
                    counters.failed_flushes += 1;
                    counters.dropped_updates += count as u64;
                }
                warn!("디멘션 업데이트 flush 실패 ({count}건 유실): {e}");
                Err(e)
            }
        }
    }
}

enum Lifecycle {
    Idle,
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// 디멘션 업데이트 코디네이터
///
/// `enqueue`는 동기·논블로킹이며 어느 스레드에서든 호출할 수 있다.
pub struct MetadataUpdateCoordinator {
    shared: Arc<Shared>,
    flush_interval: Duration,
    lifecycle: Mutex<Lifecycle>,
}

impl MetadataUpdateCoordinator {
    /// 새 코디네이터 생성 (Idle 상태)
    pub fn new(
        sink: Arc<dyn DimensionSink>,
        capacity: usize,
        flush_interval: Duration,
        log_updates: bool,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    pending: PendingUpdates::new(capacity),
                    stopped: false,
                    enqueued: 0,
                    coalesced: 0,
                    rejected: 0,
                }),
                counters: Mutex::new(FlushCounters::default()),
                sink,
                log_updates,
            }),
            flush_interval,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// 설정 기반 생성
    pub fn from_config(sink: Arc<dyn DimensionSink>, config: &DimensionConfig) -> Self {
        Self::new(
            sink,
            config.capacity,
            Duration::from_millis(config.flush_interval_ms),
            config.log_updates,
        )
    }

    /// 주기적 flush 태스크 시작 (tokio 런타임 안에서 호출)
    pub fn start(&self) -> Result<(), CoreError> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running { .. } => {
                return Err(CoreError::Lifecycle("코디네이터가 이미 실행 중".into()))
            }
            Lifecycle::Stopped => {
                return Err(CoreError::Lifecycle("중지된 코디네이터는 재시작할 수 없음".into()))
            }
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_flush_loop(
            Arc::clone(&self.shared),
            self.flush_interval,
            cancel.clone(),
        ));
        *lifecycle = Lifecycle::Running { cancel, handle };

        info!(
            "디멘션 코디네이터 시작: 간격={}ms, 용량={}",
            self.flush_interval.as_millis(),
            self.shared.state.lock().pending.capacity()
        );
        Ok(())
    }

    /// 코디네이터 중지
    ///
    /// 이후의 enqueue는 거부되며, 남은 업데이트는 마지막으로 flush된 뒤 반환한다.
    /// 시작하지 않은 코디네이터도 남은 업데이트를 flush한다. 두 번째 호출부터는 아무 일도 하지 않는다.
    pub async fn stop(&self) {
        self.shared.state.lock().stopped = true;

        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);
        match previous {
            Lifecycle::Running { cancel, handle } => {
                cancel.cancel();
                if let Err(e) = handle.await {
                    warn!("디멘션 flush 태스크 종료 실패: {e}");
                }
            }
            Lifecycle::Idle => {
                // 실패는 flush 내부에서 기록됨
                let _ = self.shared.flush().await;
            }
            Lifecycle::Stopped => return,
        }

        let stats = self.stats();
        info!(
            "디멘션 코디네이터 중지: 전송={}, 유실={}, 거부={}",
            stats.flushed_updates, stats.dropped_updates, stats.rejected
        );
    }

    /// 즉시 flush (전송한 항목 수 반환)
    pub async fn flush_now(&self) -> Result<usize, CoreError> {
        self.shared.flush().await
    }

    /// 실행 중인지
    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running { .. })
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> CoordinatorStats {
        let (pending, enqueued, coalesced, rejected) = {
            let state = self.shared.state.lock();
            (
                state.pending.len(),
                state.enqueued,
                state.coalesced,
                state.rejected,
            )
        };
        let counters = self.shared.counters.lock();
        CoordinatorStats {
            pending,
            enqueued,
            coalesced,
            rejected,
            flushed_updates: counters.flushed_updates,
            failed_flushes: counters.failed_flushes,
            dropped_updates: counters.dropped_updates,
        }
    }
}

impl MetadataQueue for MetadataUpdateCoordinator {
    fn enqueue(&self, update: PropertyUpdate) -> bool {
        let mut state = self.shared.state.lock();
        if state.stopped {
            state.rejected += 1;
            debug!("중지된 코디네이터: {} 업데이트 거부", update.resource_key);
            return false;
        }

        let outcome = state.pending.upsert(update, Utc::now());
        match outcome {
            UpsertOutcome::Inserted => state.enqueued += 1,
            UpsertOutcome::Coalesced => state.coalesced += 1,
            UpsertOutcome::Rejected => {
                state.rejected += 1;
                warn!("디멘션 대기열 가득 참 ({}), 업데이트 거부", state.pending.len());
            }
        }
        outcome.accepted()
    }
}

impl Drop for MetadataUpdateCoordinator {
    fn drop(&mut self) {
        if let Lifecycle::Running { cancel, .. } = &*self.lifecycle.lock() {
            cancel.cancel();
        }
    }
}

/// 주기적 flush 루프 (취소 시 마지막 flush 후 종료)
async fn run_flush_loop(shared: Arc<Shared>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let _ = shared.flush().await;
            }
        }
    }

    let _ = shared.flush().await;
    debug!("디멘션 flush 루프 종료");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsegate_core::models::dimension::{ResourceKey, UpdateKind, UpdateQueueEntry};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// flush된 배치를 기록하는 싱크
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<UpdateQueueEntry>>>,
        fail: AtomicBool,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self::default()
        }

        fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn batches(&self) -> Vec<Vec<UpdateQueueEntry>> {
            self.batches.lock().clone()
        }

        fn entry_count(&self) -> usize {
            self.batches.lock().iter().map(Vec::len).sum()
        }
    }

    #[async_trait::async_trait]
    impl DimensionSink for RecordingSink {
        async fn send(&self, entries: &[UpdateQueueEntry]) -> Result<(), CoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CoreError::Network("기록 싱크 실패 설정".into()));
            }
            self.batches.lock().push(entries.to_vec());
            Ok(())
        }
    }

    fn update(host: &str) -> PropertyUpdate {
        PropertyUpdate::upsert(ResourceKey::new("host", host))
    }

    fn coordinator(
        sink: &Arc<RecordingSink>,
        capacity: usize,
        interval_ms: u64,
    ) -> MetadataUpdateCoordinator {
        MetadataUpdateCoordinator::new(
            Arc::clone(sink) as Arc<dyn DimensionSink>,
            capacity,
            Duration::from_millis(interval_ms),
            true,
        )
    }

    #[tokio::test]
    async fn coalesced_updates_flush_as_one_entry() {
        let sink = Arc::new(RecordingSink::new());
        let coord = coordinator(&sink, 10, 60_000);

        assert!(coord.enqueue(update("h1").with_property("a", "1")));
        assert!(coord.enqueue(update("h1").with_property("a", "2")));
        assert!(coord.enqueue(
            PropertyUpdate::tag_only(ResourceKey::new("host", "h1")).with_tag("t")
        ));

        assert_eq!(coord.flush_now().await.unwrap(), 1);

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        let entry = &batches[0][0];
        assert_eq!(entry.update.properties["a"], "2");
        assert!(entry.update.tags.contains("t"));
        assert_eq!(entry.update.kind, UpdateKind::Upsert);

        let stats = coord.stats();
        assert_eq!((stats.enqueued, stats.coalesced, stats.pending), (1, 2, 0));
        assert_eq!(stats.flushed_updates, 1);
    }

    #[tokio::test]
    async fn capacity_rejects_new_keys_only() {
        let sink = Arc::new(RecordingSink::new());
        let coord = coordinator(&sink, 2, 60_000);

        assert!(coord.enqueue(update("h1")));
        assert!(coord.enqueue(update("h2")));
        assert!(!coord.enqueue(update("h3")));
        assert!(coord.enqueue(update("h1").with_tag("x")));

        let stats = coord.stats();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.pending, 2);
    }

    #[tokio::test]
    async fn flush_of_empty_queue_sends_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let coord = coordinator(&sink, 10, 60_000);

        assert_eq!(coord.flush_now().await.unwrap(), 0);
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn periodic_flush_delivers_pending_updates() {
        let sink = Arc::new(RecordingSink::new());
        let coord = coordinator(&sink, 10, 30);
        coord.start().unwrap();
        assert!(coord.is_running());

        coord.enqueue(update("h1"));
        coord.enqueue(update("h2"));

        for _ in 0..50 {
            if sink.entry_count() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(sink.entry_count(), 2);

        coord.stop().await;
        assert!(!coord.is_running());
    }

    #[tokio::test]
    async fn stop_performs_final_flush_and_rejects_later_updates() {
        let sink = Arc::new(RecordingSink::new());
        let coord = coordinator(&sink, 10, 60_000);
        coord.start().unwrap();

        coord.enqueue(update("h1"));
        coord.stop().await;

        assert_eq!(sink.entry_count(), 1);
        assert!(!coord.enqueue(update("h2")));
        assert_eq!(coord.stats().rejected, 1);

        // 두 번째 stop은 no-op
        coord.stop().await;
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test]
    async fn stop_without_start_still_flushes() {
        let sink = Arc::new(RecordingSink::new());
        let coord = coordinator(&sink, 10, 60_000);

        coord.enqueue(update("h1"));
        coord.stop().await;

        assert_eq!(sink.entry_count(), 1);
    }

    #[tokio::test]
    async fn start_twice_is_lifecycle_error() {
        let sink = Arc::new(RecordingSink::new());
        let coord = coordinator(&sink, 10, 60_000);

        coord.start().unwrap();
        assert!(matches!(coord.start(), Err(CoreError::Lifecycle(_))));
        coord.stop().await;
        assert!(matches!(coord.start(), Err(CoreError::Lifecycle(_))));
    }

    #[tokio::test]
    async fn failed_flush_drops_batch_without_retry() {
        let sink = Arc::new(RecordingSink::new());
        let coord = coordinator(&sink, 10, 60_000);

        sink.set_failing(true);
        coord.enqueue(update("h1"));
        coord.enqueue(update("h2"));
        assert!(coord.flush_now().await.is_err());

        sink.set_failing(false);
        assert_eq!(coord.flush_now().await.unwrap(), 0);

        let stats = coord.stats();
        assert_eq!(stats.failed_flushes, 1);
        assert_eq!(stats.dropped_updates, 2);
        assert_eq!(stats.flushed_updates, 0);
    }

    #[tokio::test]
    async fn updates_after_flush_start_a_new_batch() {
        let sink = Arc::new(RecordingSink::new());
        let coord = coordinator(&sink, 10, 60_000);

        coord.enqueue(update("h1").with_property("v", "1"));
        coord.flush_now().await.unwrap();
        coord.enqueue(update("h1").with_property("v", "2"));
        coord.flush_now().await.unwrap();

        let batches = sink.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1][0].update.properties["v"], "2");
    }

    #[test]
    fn concurrent_enqueue_from_threads() {
        let sink = Arc::new(RecordingSink::new());
        let coord = Arc::new(coordinator(&sink, 1_000, 60_000));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let coord = Arc::clone(&coord);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let host = format!("h{}", (t * 100 + i) % 50);
                        assert!(coord.enqueue(update(&host).with_tag(format!("t{t}"))));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = coord.stats();
        assert_eq!(stats.pending, 50);
        assert_eq!(stats.enqueued, 50);
        assert_eq!(stats.enqueued + stats.coalesced, 800);
        assert_eq!(stats.rejected, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_distinct_keys_flush_exactly_once_each() {
        const KEYS: usize = 200;
        let sink = Arc::new(RecordingSink::new());
        let coord = Arc::new(coordinator(&sink, KEYS, 60_000));

        let handles: Vec<_> = (0..KEYS)
            .map(|i| {
                let coord = Arc::clone(&coord);
                tokio::spawn(async move { coord.enqueue(update(&format!("host-{i}"))) })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(coord.flush_now().await.unwrap(), KEYS);

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), KEYS);
        let distinct: std::collections::HashSet<_> = batches[0]
            .iter()
            .map(|e| e.update.resource_key.clone())
            .collect();
        assert_eq!(distinct.len(), KEYS);
        assert_eq!(coord.stats().pending, 0);
    }
}
