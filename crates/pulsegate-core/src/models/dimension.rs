//! 디멘션(메타데이터) 업데이트 모델.
//!
//! 모니터링 대상(호스트, 컨테이너 등)에 붙는 속성/태그 변경 요청.
//! 같은 리소스 키에 대한 업데이트는 [`PropertyUpdate::merge`]로 병합된다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 디멘션 식별자 (예: `host=web-01`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    /// 디멘션 이름 (예: "host")
    pub name: String,
    /// 디멘션 값 (예: "web-01")
    pub value: String,
}

impl ResourceKey {
    /// 새 리소스 키 생성
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// 업데이트 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// 속성과 태그를 함께 갱신
    Upsert,
    /// 태그만 갱신
    TagOnly,
}

/// 디멘션 속성 업데이트 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    /// 대상 리소스
    pub resource_key: ResourceKey,
    /// 속성 (이름 → 값)
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// 태그
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// 업데이트 유형
    pub kind: UpdateKind,
}

impl PropertyUpdate {
    /// 빈 Upsert 업데이트 생성
    pub fn upsert(resource_key: ResourceKey) -> Self {
        Self {
            resource_key,
            properties: BTreeMap::new(),
            tags: BTreeSet::new(),
            kind: UpdateKind::Upsert,
        }
    }

    /// 빈 TagOnly 업데이트 생성
    pub fn tag_only(resource_key: ResourceKey) -> Self {
        Self {
            kind: UpdateKind::TagOnly,
            ..Self::upsert(resource_key)
        }
    }

    /// 속성 추가 (빌더)
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// 태그 추가 (빌더)
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// 같은 리소스에 대한 이후 업데이트를 병합
    ///
    /// - 속성: 필드 단위로 `later` 값이 덮어씀
    /// - 태그: 합집합
    /// - 유형: 어느 한쪽이라도 `Upsert`이면 `Upsert`
    pub fn merge(&mut self, later: PropertyUpdate) {
        debug_assert_eq!(self.resource_key, later.resource_key);

        self.properties.extend(later.properties);
        self.tags.extend(later.tags);
        if later.kind == UpdateKind::Upsert {
            self.kind = UpdateKind::Upsert;
        }
    }
}

/// 대기열 항목 (업데이트 + 최초 enqueue 시각)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateQueueEntry {
    /// 병합된 업데이트
    pub update: PropertyUpdate,
    /// 최초 enqueue 시각 (병합되어도 유지)
    pub enqueued_at: DateTime<Utc>,
}

impl UpdateQueueEntry {
    /// 새 대기열 항목 생성
    pub fn new(update: PropertyUpdate, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            update,
            enqueued_at,
        }
    }
}
