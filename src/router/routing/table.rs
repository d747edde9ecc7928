//! 바인드 그룹 테이블
//!
//! 이름 붙은 바인드 그룹별 프라이머리/레플리카 대상과 정책을 관리합니다.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::super::error::{RouterError, RouterResult};
use super::policy::{ReplicaSelector, SelectorStrategy};

/// 기본 바인드 그룹 이름
pub const DEFAULT_BIND_GROUP: &str = "default";

// ============================================================================
// TargetId - 대상 식별자
// ============================================================================

/// 대상 식별자
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(String);

impl TargetId {
    /// 새 식별자 생성
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 문자열 값
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 빈 식별자 여부
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for TargetId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TargetId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ============================================================================
// Target - 대상
// ============================================================================

/// 라우팅 대상 (프라이머리 또는 레플리카)
///
/// 연결 팩토리는 설정이 소유하며 세션은 `Arc`로 빌려 씁니다.
pub struct Target<F> {
    id: TargetId,
    factory: Arc<F>,
    weight: u32,
}

impl<F> Target<F> {
    /// 새 대상 생성 (가중치 1)
    pub fn new(id: impl Into<TargetId>, factory: Arc<F>) -> Self {
        Self {
            id: id.into(),
            factory,
            weight: 1,
        }
    }

    /// 가중치 설정
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// 식별자
    pub fn id(&self) -> &TargetId {
        &self.id
    }

    /// 연결 팩토리
    pub fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    /// 가중치
    pub fn weight(&self) -> u32 {
        self.weight
    }
}

impl<F> fmt::Debug for Target<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id)
            .field("weight", &self.weight)
            .finish()
    }
}

/// 대상 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRole {
    /// 쓰기 가능한 프라이머리
    Primary,
    /// 읽기 전용 레플리카
    Replica,
}

impl TargetRole {
    /// 역할을 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "PRIMARY",
            Self::Replica => "REPLICA",
        }
    }
}

/// Sticky 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StickyPolicy {
    /// 쓰기 이후 읽기를 프라이머리에 고정 (기본값)
    #[default]
    Enabled,
    /// 쓰기 이후에도 읽기는 레플리카로
    Disabled,
}

impl StickyPolicy {
    /// 활성화 여부
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

// ============================================================================
// BindGroupConfig - 바인드 그룹 설정
// ============================================================================

/// 바인드 그룹 설정
pub struct BindGroupConfig<F> {
    primary: Target<F>,
    replicas: Vec<Target<F>>,
    strategy: SelectorStrategy,
    selector: Option<Arc<dyn ReplicaSelector<F>>>,
    sticky: StickyPolicy,
    fallback_to_primary: bool,
    sticky_window: Option<Duration>,
}

impl<F: Send + Sync + 'static> BindGroupConfig<F> {
    /// 프라이머리로 설정 생성
    pub fn new(primary: impl Into<TargetId>, factory: Arc<F>) -> Self {
        Self {
            primary: Target::new(primary, factory),
            replicas: Vec::new(),
            strategy: SelectorStrategy::default(),
            selector: None,
            sticky: StickyPolicy::default(),
            fallback_to_primary: true,
            sticky_window: None,
        }
    }

    /// 레플리카 추가
    pub fn with_replica(mut self, id: impl Into<TargetId>, factory: Arc<F>) -> Self {
        self.replicas.push(Target::new(id, factory));
        self
    }

    /// 가중치 레플리카 추가
    pub fn with_weighted_replica(
        mut self,
        id: impl Into<TargetId>,
        factory: Arc<F>,
        weight: u32,
    ) -> Self {
        self.replicas.push(Target::new(id, factory).with_weight(weight));
        self
    }

    /// 선택 전략 설정
    pub fn with_strategy(mut self, strategy: SelectorStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// 사용자 정의 선택기 설정 (전략보다 우선)
    pub fn with_selector(mut self, selector: Arc<dyn ReplicaSelector<F>>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Sticky 정책 설정
    pub fn with_sticky_policy(mut self, sticky: StickyPolicy) -> Self {
        self.sticky = sticky;
        self
    }

    /// 레플리카가 없을 때 프라이머리로 대체할지 여부
    pub fn with_fallback_to_primary(mut self, fallback: bool) -> Self {
        self.fallback_to_primary = fallback;
        self
    }

    /// Sticky 유지 시간 설정 (미설정 시 작업 단위 종료까지)
    pub fn with_sticky_window(mut self, window: Duration) -> Self {
        self.sticky_window = Some(window);
        self
    }

    /// 설정 검증 후 바인드 그룹 생성
    pub(crate) fn build(self, name: &str) -> RouterResult<BindGroup<F>> {
        if name.trim().is_empty() {
            return Err(RouterError::configuration("Bind group name must not be empty"));
        }
        if self.primary.id().is_empty() {
            return Err(RouterError::configuration(format!(
                "Bind group '{}' has an empty primary target",
                name
            )));
        }

        let mut seen = HashSet::new();
        seen.insert(self.primary.id().clone());
        for replica in &self.replicas {
            validate_replica(name, replica)?;
            if !seen.insert(replica.id().clone()) {
                return Err(RouterError::configuration(format!(
                    "Bind group '{}' lists target '{}' more than once",
                    name,
                    replica.id()
                )));
            }
        }

        let selector = self
            .selector
            .unwrap_or_else(|| self.strategy.selector::<F>());

        Ok(BindGroup {
            name: name.to_string(),
            primary: Arc::new(self.primary),
            members: RwLock::new(Members {
                replicas: self.replicas.into_iter().map(Arc::new).collect(),
                down: HashSet::new(),
            }),
            selector,
            strategy: self.strategy,
            sticky: self.sticky,
            fallback_to_primary: self.fallback_to_primary,
            sticky_window: self.sticky_window,
        })
    }
}

fn validate_replica<F>(group: &str, replica: &Target<F>) -> RouterResult<()> {
    if replica.id().is_empty() {
        return Err(RouterError::configuration(format!(
            "Bind group '{}' has a replica with an empty identifier",
            group
        )));
    }
    if replica.weight() == 0 {
        return Err(RouterError::configuration(format!(
            "Replica '{}' in bind group '{}' must have a weight of at least 1",
            replica.id(),
            group
        )));
    }
    Ok(())
}

// ============================================================================
// BindGroup - 바인드 그룹
// ============================================================================

struct Members<F> {
    replicas: Vec<Arc<Target<F>>>,
    down: HashSet<TargetId>,
}

/// 등록된 바인드 그룹
///
/// 그룹 자체는 프로세스 수명 동안 유지되며, 레플리카 구성원만 바뀔 수 있습니다.
pub struct BindGroup<F> {
    name: String,
    primary: Arc<Target<F>>,
    members: RwLock<Members<F>>,
    selector: Arc<dyn ReplicaSelector<F>>,
    strategy: SelectorStrategy,
    sticky: StickyPolicy,
    fallback_to_primary: bool,
    sticky_window: Option<Duration>,
}

impl<F> BindGroup<F> {
    /// 그룹 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 프라이머리 대상
    pub fn primary(&self) -> &Arc<Target<F>> {
        &self.primary
    }

    /// 등록된 전체 레플리카
    pub fn replicas(&self) -> Vec<Arc<Target<F>>> {
        self.members.read().replicas.clone()
    }

    /// 살아있는 레플리카
    pub fn live_replicas(&self) -> Vec<Arc<Target<F>>> {
        let members = self.members.read();
        members
            .replicas
            .iter()
            .filter(|r| !members.down.contains(r.id()))
            .cloned()
            .collect()
    }

    /// 선택기로 레플리카 하나 선택
    pub fn select_replica(&self) -> Option<Arc<Target<F>>> {
        let live = self.live_replicas();
        self.selector.select(&live).cloned()
    }

    /// 레플리카 추가
    pub fn add_replica(&self, replica: Target<F>) -> RouterResult<()> {
        validate_replica(&self.name, &replica)?;

        let mut members = self.members.write();
        if replica.id() == self.primary.id() || members.replicas.iter().any(|r| r.id() == replica.id()) {
            return Err(RouterError::configuration(format!(
                "Target '{}' is already a member of bind group '{}'",
                replica.id(),
                self.name
            )));
        }
        members.replicas.push(Arc::new(replica));
        Ok(())
    }

    /// 레플리카 제거
    pub fn remove_replica(&self, id: &TargetId) -> bool {
        let mut members = self.members.write();
        let before = members.replicas.len();
        members.replicas.retain(|r| r.id() != id);
        members.down.remove(id);
        members.replicas.len() != before
    }

    /// 레플리카를 선택 대상에서 제외
    pub fn mark_down(&self, id: &TargetId) -> bool {
        let mut members = self.members.write();
        members.replicas.iter().any(|r| r.id() == id) && members.down.insert(id.clone())
    }

    /// 제외된 레플리카 복귀
    pub fn mark_up(&self, id: &TargetId) -> bool {
        self.members.write().down.remove(id)
    }

    /// 레플리카가 살아있는지 확인
    pub fn is_live(&self, id: &TargetId) -> bool {
        let members = self.members.read();
        members.replicas.iter().any(|r| r.id() == id) && !members.down.contains(id)
    }

    /// 선택 전략
    pub fn strategy(&self) -> SelectorStrategy {
        self.strategy
    }

    /// 선택기 이름
    pub fn selector_name(&self) -> &'static str {
        self.selector.name()
    }

    /// Sticky 정책
    pub fn sticky_policy(&self) -> StickyPolicy {
        self.sticky
    }

    /// Sticky 유지 시간
    pub fn sticky_window(&self) -> Option<Duration> {
        self.sticky_window
    }

    /// 프라이머리 대체 허용 여부
    pub fn fallback_to_primary(&self) -> bool {
        self.fallback_to_primary
    }
}

impl<F> fmt::Debug for BindGroup<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self.members.read();
        f.debug_struct("BindGroup")
            .field("name", &self.name)
            .field("primary", &self.primary.id())
            .field("replicas", &members.replicas.iter().map(|r| r.id()).collect::<Vec<_>>())
            .field("down", &members.down)
            .field("selector", &self.selector.name())
            .field("sticky", &self.sticky)
            .finish()
    }
}

// ============================================================================
// RoutingConfig - 라우팅 설정
// ============================================================================

/// 바인드 그룹 레지스트리
///
/// 그룹은 등록만 가능하고 제거할 수 없습니다.
pub struct RoutingConfig<F> {
    groups: RwLock<HashMap<String, Arc<BindGroup<F>>>>,
}

impl<F: Send + Sync + 'static> RoutingConfig<F> {
    /// 빈 설정 생성
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// 바인드 그룹 등록
    pub fn register(&self, name: impl Into<String>, config: BindGroupConfig<F>) -> RouterResult<Arc<BindGroup<F>>> {
        let name = name.into();
        let group = Arc::new(config.build(&name)?);

        let mut groups = self.groups.write();
        if groups.contains_key(&name) {
            return Err(RouterError::configuration(format!(
                "Bind group '{}' is already registered",
                name
            )));
        }
        groups.insert(name, group.clone());

        Ok(group)
    }
}

impl<F> RoutingConfig<F> {
    /// 이름으로 바인드 그룹 조회
    pub fn group(&self, name: &str) -> RouterResult<Arc<BindGroup<F>>> {
        self.groups.read().get(name).cloned().ok_or_else(|| {
            RouterError::configuration(format!("Unknown bind group '{}'", name))
        })
    }

    /// 등록 여부
    pub fn contains(&self, name: &str) -> bool {
        self.groups.read().contains_key(name)
    }

    /// 등록된 그룹 이름 (정렬됨)
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// 등록된 그룹 수
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    /// 비어있는지 확인
    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}

impl<F: Send + Sync + 'static> Default for RoutingConfig<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> fmt::Debug for RoutingConfig<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("RoutingConfig").field("groups", &names).finish()
    }
}
