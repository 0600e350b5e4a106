//! 리소스 키별 대기 업데이트 맵.
//!
//! 같은 키로 들어온 업데이트는 하나로 병합되며, 새 키는 용량 한도까지만 받는다.
//! 동기화는 호출자([`crate::coordinator`])가 담당한다.

use chrono::{DateTime, Utc};
use pulsegate_core::models::dimension::{PropertyUpdate, ResourceKey, UpdateQueueEntry};
use std::collections::HashMap;

/// upsert 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 새 키로 추가됨
    Inserted,
    /// 기존 항목에 병합됨
    Coalesced,
    /// 용량 초과로 거부됨
    Rejected,
}

impl UpsertOutcome {
    /// 수락 여부
    pub fn accepted(self) -> bool {
        !matches!(self, UpsertOutcome::Rejected)
    }
}

/// 대기 업데이트 맵
#[derive(Debug)]
pub struct PendingUpdates {
    entries: HashMap<ResourceKey, UpdateQueueEntry>,
    capacity: usize,
}

impl PendingUpdates {
    /// 용량 지정 생성
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    /// 업데이트 추가 또는 병합
    ///
    /// 이미 대기 중인 키는 용량과 무관하게 항상 병합된다. 병합 시 최초 enqueue 시각은 유지한다.
    pub fn upsert(&mut self, update: PropertyUpdate, now: DateTime<Utc>) -> UpsertOutcome {
        if let Some(entry) = self.entries.get_mut(&update.resource_key) {
            entry.update.merge(update);
            return UpsertOutcome::Coalesced;
        }

        if self.entries.len() >= self.capacity {
            return UpsertOutcome::Rejected;
        }

        self.entries
            .insert(update.resource_key.clone(), UpdateQueueEntry::new(update, now));
        UpsertOutcome::Inserted
    }

    /// 모든 항목을 꺼냄 (enqueue 시각 순)
    pub fn drain(&mut self) -> Vec<UpdateQueueEntry> {
        let mut drained: Vec<UpdateQueueEntry> =
            std::mem::take(&mut self.entries).into_values().collect();
        drained.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.update.resource_key.cmp(&b.update.resource_key))
        });
        drained
    }

    /// 대기 중인 키 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
