//! 호스트 메타데이터 동기화.
//!
//! 전송에 성공한 메트릭 배치의 리소스 속성에서 호스트 식별자와 속성을 뽑아
//! 마지막으로 보낸 값과 다를 때만 디멘션 업데이트를 enqueue한다.
//! 네트워크 I/O 없이 맵 조회와 enqueue만 수행한다.

use parking_lot::Mutex;
use pulsegate_core::models::dimension::{PropertyUpdate, ResourceKey};
use pulsegate_core::models::telemetry::MetricsBatch;
use pulsegate_core::ports::host::HostPropertySource;
use pulsegate_core::ports::metadata::MetadataQueue;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

/// 호스트 식별 속성
pub const HOST_NAME_ATTRIBUTE: &str = "host.name";

/// 디멘션 이름
pub const HOST_DIMENSION: &str = "host";

/// 동기화 대상 속성 접두사
const SYNCED_PREFIXES: [&str; 3] = ["host.", "os.", "cloud."];

/// `sync` 1회 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// enqueue된 업데이트 수
    pub enqueued: usize,
    /// 마지막 전송값과 같아 건너뛴 호스트 수
    pub unchanged: usize,
    /// 코디네이터가 거부한 업데이트 수
    pub rejected: usize,
}

/// 호스트 메타데이터 동기화기
pub struct HostMetadataSyncer {
    queue: Arc<dyn MetadataQueue>,
    host_source: Option<Arc<dyn HostPropertySource>>,
    /// 호스트별 마지막 enqueue 속성 지문
    synced: Mutex<HashMap<ResourceKey, u64>>,
}

impl HostMetadataSyncer {
    /// 새 동기화기 생성
    pub fn new(
        queue: Arc<dyn MetadataQueue>,
        host_source: Option<Arc<dyn HostPropertySource>>,
    ) -> Self {
        Self {
            queue,
            host_source,
            synced: Mutex::new(HashMap::new()),
        }
    }

    /// 배치에서 호스트 속성 변경을 감지해 enqueue
    ///
    /// 처음 보는 호스트는 속성이 비어 있어도 한 번 enqueue한다.
    pub fn sync(&self, batch: &MetricsBatch) -> SyncSummary {
        let mut summary = SyncSummary::default();

        for (key, properties) in self.collect_hosts(batch) {
            let fingerprint = fingerprint(&properties);

            // 지문 확인과 enqueue를 같은 임계 구역에서 수행 (동시 sync 간 중복/누락 방지)
            let mut synced = self.synced.lock();
            if synced.get(&key) == Some(&fingerprint) {
                summary.unchanged += 1;
                continue;
            }

            let mut update = PropertyUpdate::upsert(key.clone());
            update.properties = properties;

            if self.queue.enqueue(update) {
                debug!("호스트 메타데이터 변경 감지: {key}");
                synced.insert(key, fingerprint);
                summary.enqueued += 1;
            } else {
                // 지문을 기록하지 않으므로 다음 sync에서 다시 시도
                summary.rejected += 1;
            }
        }

        summary
    }

    /// 지금까지 동기화한 호스트 수
    pub fn tracked_hosts(&self) -> usize {
        self.synced.lock().len()
    }

    /// 호스트별 속성 추출 (같은 호스트의 여러 리소스는 병합)
    fn collect_hosts(
        &self,
        batch: &MetricsBatch,
    ) -> BTreeMap<ResourceKey, BTreeMap<String, String>> {
        let mut hosts: BTreeMap<ResourceKey, BTreeMap<String, String>> = BTreeMap::new();

        for group in &batch.resources {
            let Some(host) = group.resource.attribute(HOST_NAME_ATTRIBUTE) else {
                continue;
            };
            let key = ResourceKey::new(HOST_DIMENSION, host);

            let properties = hosts.entry(key).or_insert_with(|| self.local_properties(host));
            properties.extend(
                group
                    .resource
                    .attributes
                    .iter()
                    .filter(|(k, _)| {
                        k.as_str() != HOST_NAME_ATTRIBUTE
                            && SYNCED_PREFIXES.iter().any(|p| k.starts_with(p))
                    })
                    .map(|(k, v)| (k.replace('.', "_"), v.clone())),
            );
        }

        hosts
    }

    /// 로컬 호스트라면 캐시된 호스트 속성
    fn local_properties(&self, host: &str) -> BTreeMap<String, String> {
        match &self.host_source {
            Some(source) if source.host_name() == Some(host) => source.properties().clone(),
            _ => BTreeMap::new(),
        }
    }
}

fn fingerprint(properties: &BTreeMap<String, String>) -> u64 {
    let mut hasher = DefaultHasher::new();
    properties.hash(&mut hasher);
    hasher.finish()
}
