//! 라우터
//!
//! 구문마다 프라이머리/레플리카 대상을 결정합니다. 결정 과정은 동기적이며
//! 어떤 await 지점도 포함하지 않습니다. 실제 실행(디스패치)은 세션의 몫입니다.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::super::context::{ForcedTarget, OverrideGuard, RoutingContext};
use super::super::error::{RouterError, RouterResult};
use super::super::statement::{Classification, Statement};
use super::settings::RoutingSettings;
use super::table::{BindGroup, BindGroupConfig, RoutingConfig, Target, TargetId, TargetRole};

// ============================================================================
// RoutingDecision - 라우팅 결정
// ============================================================================

/// 라우팅 사유 코드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteReason {
    /// 쓰기 구문
    Write,
    /// 잠금 읽기 구문
    ReadLocking,
    /// 프라이머리 강제
    ForcedPrimary,
    /// 레플리카 강제
    ForcedReplica,
    /// 쓰기 이후 프라이머리 고정
    Sticky,
    /// 선택기로 고른 레플리카
    Replica,
    /// 살아있는 레플리카가 없어 프라이머리 사용
    NoReplicaFallback,
}

impl RouteReason {
    /// 사유 코드 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::ReadLocking => "read_locking",
            Self::ForcedPrimary => "forced_primary",
            Self::ForcedReplica => "forced_replica",
            Self::Sticky => "sticky",
            Self::Replica => "replica",
            Self::NoReplicaFallback => "no_replica_fallback",
        }
    }
}

impl fmt::Display for RouteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 구문 하나에 대한 라우팅 결정
pub struct RoutingDecision<F> {
    group: String,
    target: Arc<Target<F>>,
    role: TargetRole,
    classification: Classification,
    reason: RouteReason,
}

impl<F> RoutingDecision<F> {
    /// 바인드 그룹 이름
    pub fn group(&self) -> &str {
        &self.group
    }

    /// 결정된 대상
    pub fn target(&self) -> &Arc<Target<F>> {
        &self.target
    }

    /// 결정된 대상 식별자
    pub fn target_id(&self) -> &TargetId {
        self.target.id()
    }

    /// 대상 역할
    pub fn role(&self) -> TargetRole {
        self.role
    }

    /// 구문 분류
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// 사유 코드
    pub fn reason(&self) -> RouteReason {
        self.reason
    }
}

impl<F> Clone for RoutingDecision<F> {
    fn clone(&self) -> Self {
        Self {
            group: self.group.clone(),
            target: self.target.clone(),
            role: self.role,
            classification: self.classification,
            reason: self.reason,
        }
    }
}

impl<F> fmt::Debug for RoutingDecision<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingDecision")
            .field("group", &self.group)
            .field("target", self.target.id())
            .field("role", &self.role)
            .field("classification", &self.classification)
            .field("reason", &self.reason)
            .finish()
    }
}

// ============================================================================
// RouterMetrics - 라우터 메트릭
// ============================================================================

/// 라우터 메트릭 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterMetrics {
    /// 등록된 바인드 그룹 수
    pub group_count: usize,
    /// 프라이머리로 간 쓰기/잠금 읽기 수
    pub write_routes: u64,
    /// 레플리카로 간 읽기 수
    pub replica_routes: u64,
    /// Sticky 로 프라이머리에 고정된 읽기 수
    pub sticky_routes: u64,
    /// 재정의로 결정된 읽기 수
    pub forced_routes: u64,
    /// 레플리카 부재로 프라이머리에 간 읽기 수
    pub fallback_routes: u64,
}

impl RouterMetrics {
    /// 전체 라우팅 수
    pub fn total_routes(&self) -> u64 {
        self.write_routes
            + self.replica_routes
            + self.sticky_routes
            + self.forced_routes
            + self.fallback_routes
    }
}

#[derive(Debug, Default)]
struct MetricCounters {
    write: AtomicU64,
    replica: AtomicU64,
    sticky: AtomicU64,
    forced: AtomicU64,
    fallback: AtomicU64,
}

impl MetricCounters {
    fn record(&self, reason: RouteReason) {
        let counter = match reason {
            RouteReason::Write | RouteReason::ReadLocking => &self.write,
            RouteReason::Replica => &self.replica,
            RouteReason::Sticky => &self.sticky,
            RouteReason::ForcedPrimary | RouteReason::ForcedReplica => &self.forced,
            RouteReason::NoReplicaFallback => &self.fallback,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// Router - 라우터
// ============================================================================

struct RouterInner<F> {
    config: RoutingConfig<F>,
    metrics: MetricCounters,
}

/// 읽기/쓰기 레플리카 라우터
///
/// 복제 비용이 작은 핸들이며, 모든 복제본이 같은 바인드 그룹 설정과 선택기
/// 카운터를 공유합니다.
pub struct Router<F> {
    inner: Arc<RouterInner<F>>,
}

impl<F> Clone for Router<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: Send + Sync + 'static> Router<F> {
    /// 빈 라우터 생성
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RouterInner {
                config: RoutingConfig::new(),
                metrics: MetricCounters::default(),
            }),
        }
    }

    /// 빌더 시작
    pub fn builder() -> RouterBuilder<F> {
        RouterBuilder::new()
    }

    /// 선언적 설정으로 라우터 생성
    ///
    /// `resolve`는 대상 식별자마다 연결 팩토리를 돌려줘야 합니다.
    pub fn from_settings<R>(settings: &RoutingSettings, mut resolve: R) -> RouterResult<Self>
    where
        R: FnMut(&TargetId) -> RouterResult<Arc<F>>,
    {
        let router = Self::new();
        for (name, group) in &settings.groups {
            router.register(name.as_str(), group.to_config(&mut resolve)?)?;
        }
        Ok(router)
    }

    /// 바인드 그룹 등록
    pub fn register(&self, name: impl Into<String>, config: BindGroupConfig<F>) -> RouterResult<()> {
        let group = self.inner.config.register(name, config)?;
        info!(
            group = group.name(),
            primary = %group.primary().id(),
            replicas = group.replicas().len(),
            selector = group.selector_name(),
            sticky = group.sticky_policy().is_enabled(),
            "registered bind group"
        );
        Ok(())
    }
}

impl<F> Router<F> {
    /// 바인드 그룹 레지스트리
    pub fn config(&self) -> &RoutingConfig<F> {
        &self.inner.config
    }

    /// 이름으로 바인드 그룹 조회
    pub fn group(&self, name: &str) -> RouterResult<Arc<BindGroup<F>>> {
        self.inner.config.group(name)
    }

    /// 활성 바인드 그룹 이름 결정
    ///
    /// 우선순위: 컨텍스트 재정의 > 구문 힌트 > 세션 기본값
    pub fn resolve_group_name(
        &self,
        context: &RoutingContext,
        statement: &Statement,
        default_group: &str,
    ) -> String {
        context
            .bind_group_override()
            .or_else(|| statement.bind_group.clone())
            .unwrap_or_else(|| default_group.to_string())
    }

    /// 라우팅 결정 (컨텍스트 변경 없음)
    ///
    /// 선택기 카운터만 전진합니다.
    pub fn decide(
        &self,
        context: &RoutingContext,
        statement: &Statement,
        default_group: &str,
    ) -> RouterResult<RoutingDecision<F>> {
        let name = self.resolve_group_name(context, statement, default_group);
        let group = self.group(&name)?;
        let classification = statement.classification();

        let (target, role, reason) = match classification {
            Classification::Write => (group.primary().clone(), TargetRole::Primary, RouteReason::Write),
            Classification::ReadLocking => (
                group.primary().clone(),
                TargetRole::Primary,
                RouteReason::ReadLocking,
            ),
            Classification::Read => match context.forced_target() {
                Some(ForcedTarget::Primary) => (
                    group.primary().clone(),
                    TargetRole::Primary,
                    RouteReason::ForcedPrimary,
                ),
                Some(ForcedTarget::Replica) => pick_replica(&group, RouteReason::ForcedReplica)?,
                None if group.sticky_policy().is_enabled()
                    && context.is_sticky_within(group.sticky_window()) =>
                {
                    (group.primary().clone(), TargetRole::Primary, RouteReason::Sticky)
                }
                None => pick_replica(&group, RouteReason::Replica)?,
            },
        };

        Ok(RoutingDecision {
            group: name,
            target,
            role,
            classification,
            reason,
        })
    }

    /// 라우팅 결정 후 컨텍스트 갱신
    ///
    /// 쓰기/잠금 읽기는 디스패치 전에 컨텍스트를 Sticky 로 전이시킵니다.
    /// 실행이 실패해도 일부가 반영됐을 수 있으므로 되돌리지 않습니다.
    pub fn route(
        &self,
        context: &RoutingContext,
        statement: &Statement,
        default_group: &str,
    ) -> RouterResult<RoutingDecision<F>> {
        let decision = self.decide(context, statement, default_group)?;

        if decision.classification.requires_primary() {
            context.mark_sticky();
        }
        self.inner.metrics.record(decision.reason);

        if decision.reason == RouteReason::NoReplicaFallback {
            warn!(
                unit = context.unit_id(),
                group = %decision.group,
                primary = %decision.target_id(),
                "no live replica; read served by primary"
            );
        } else {
            debug!(
                unit = context.unit_id(),
                group = %decision.group,
                kind = %statement.kind,
                classification = %decision.classification,
                target = %decision.target_id(),
                reason = %decision.reason,
                "routed statement"
            );
        }

        Ok(decision)
    }

    /// 바인드 그룹 강제 (이름을 즉시 검증)
    pub fn force_bind_group<'c>(
        &self,
        context: &'c RoutingContext,
        name: &str,
    ) -> RouterResult<OverrideGuard<'c>> {
        self.group(name)?;
        context.force_bind_group(name)
    }

    /// 레플리카 추가
    pub fn add_replica(&self, group: &str, replica: Target<F>) -> RouterResult<()> {
        let id = replica.id().clone();
        self.group(group)?.add_replica(replica)?;
        info!(group, replica = %id, "added replica");
        Ok(())
    }

    /// 레플리카 제거
    pub fn remove_replica(&self, group: &str, id: &TargetId) -> RouterResult<bool> {
        let removed = self.group(group)?.remove_replica(id);
        if removed {
            info!(group, replica = %id, "removed replica");
        }
        Ok(removed)
    }

    /// 레플리카를 선택 대상에서 제외
    ///
    /// 자동으로 호출되지 않습니다. 장애 판단은 상위 계층의 몫입니다.
    pub fn mark_replica_down(&self, group: &str, id: &TargetId) -> RouterResult<bool> {
        let changed = self.group(group)?.mark_down(id);
        if changed {
            info!(group, replica = %id, "marked replica down");
        }
        Ok(changed)
    }

    /// 제외된 레플리카 복귀
    pub fn mark_replica_up(&self, group: &str, id: &TargetId) -> RouterResult<bool> {
        let changed = self.group(group)?.mark_up(id);
        if changed {
            info!(group, replica = %id, "marked replica up");
        }
        Ok(changed)
    }

    /// 라우터 메트릭
    pub fn metrics(&self) -> RouterMetrics {
        let counters = &self.inner.metrics;
        RouterMetrics {
            group_count: self.inner.config.len(),
            write_routes: counters.write.load(Ordering::Relaxed),
            replica_routes: counters.replica.load(Ordering::Relaxed),
            sticky_routes: counters.sticky.load(Ordering::Relaxed),
            forced_routes: counters.forced.load(Ordering::Relaxed),
            fallback_routes: counters.fallback.load(Ordering::Relaxed),
        }
    }
}

fn pick_replica<F>(
    group: &BindGroup<F>,
    reason: RouteReason,
) -> RouterResult<(Arc<Target<F>>, TargetRole, RouteReason)> {
    if let Some(replica) = group.select_replica() {
        return Ok((replica, TargetRole::Replica, reason));
    }

    if group.fallback_to_primary() {
        Ok((
            group.primary().clone(),
            TargetRole::Primary,
            RouteReason::NoReplicaFallback,
        ))
    } else {
        Err(RouterError::replica_unavailable(format!(
            "Bind group '{}' has no live replica and primary fallback is disabled",
            group.name()
        )))
    }
}

impl<F: Send + Sync + 'static> Default for Router<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> fmt::Debug for Router<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.inner.config)
            .finish()
    }
}

// ============================================================================
// RouterBuilder - 라우터 빌더
// ============================================================================

/// 라우터 빌더
pub struct RouterBuilder<F> {
    groups: Vec<(String, BindGroupConfig<F>)>,
}

impl<F: Send + Sync + 'static> RouterBuilder<F> {
    /// 새 빌더 생성
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// 바인드 그룹 추가
    pub fn bind_group(mut self, name: impl Into<String>, config: BindGroupConfig<F>) -> Self {
        self.groups.push((name.into(), config));
        self
    }

    /// 기본 바인드 그룹 추가
    pub fn default_group(self, config: BindGroupConfig<F>) -> Self {
        self.bind_group(super::table::DEFAULT_BIND_GROUP, config)
    }

    /// 빌드 (등록 에러는 여기서 즉시 반환)
    pub fn build(self) -> RouterResult<Router<F>> {
        let router = Router::new();
        for (name, config) in self.groups {
            router.register(name, config)?;
        }
        Ok(router)
    }
}

impl<F: Send + Sync + 'static> Default for RouterBuilder<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::router::routing::{SelectorStrategy, StickyPolicy, DEFAULT_BIND_GROUP};

    fn factory() -> Arc<()> {
        Arc::new(())
    }

    fn router() -> Router<()> {
        Router::builder()
            .default_group(
                BindGroupConfig::new("primary", factory())
                    .with_replica("replica-a", factory())
                    .with_replica("replica-b", factory()),
            )
            .bind_group(
                "analytics",
                BindGroupConfig::new("analytics-primary", factory())
                    .with_replica("analytics-replica", factory()),
            )
            .build()
            .unwrap()
    }

    fn route(router: &Router<()>, ctx: &RoutingContext, stmt: Statement) -> RoutingDecision<()> {
        router.route(ctx, &stmt, DEFAULT_BIND_GROUP).unwrap()
    }

    #[test]
    fn test_writes_always_primary() {
        let router = router();
        let ctx = RoutingContext::new();

        for stmt in [
            Statement::insert("INSERT INTO t VALUES (1)"),
            Statement::update("UPDATE t SET a = 1"),
            Statement::delete("DELETE FROM t"),
            Statement::ddl("CREATE TABLE t (id int)"),
            Statement::raw("VACUUM"),
            Statement::select("SELECT * FROM t").for_update(),
        ] {
            let decision = route(&router, &ctx, stmt);
            assert_eq!(decision.target_id(), "primary");
            assert_eq!(decision.role(), TargetRole::Primary);
        }
    }

    #[test]
    fn test_write_under_forced_replica_goes_to_primary() {
        let router = router();
        let ctx = RoutingContext::new();
        let _guard = ctx.force_replica().unwrap();

        let decision = route(&router, &ctx, Statement::insert("INSERT INTO t VALUES (1)"));
        assert_eq!(decision.target_id(), "primary");
        assert_eq!(decision.reason(), RouteReason::Write);
    }

    #[test]
    fn test_read_goes_to_replica() {
        let router = router();
        let ctx = RoutingContext::new();

        let decision = route(&router, &ctx, Statement::select("SELECT 1"));
        assert_eq!(decision.role(), TargetRole::Replica);
        assert_eq!(decision.reason(), RouteReason::Replica);
        assert_eq!(decision.group(), "default");
    }

    #[test]
    fn test_read_after_write_is_sticky() {
        let router = router();
        let ctx = RoutingContext::new();

        route(&router, &ctx, Statement::insert("INSERT INTO t VALUES (1)"));
        assert!(ctx.is_sticky());

        for _ in 0..3 {
            let decision = route(&router, &ctx, Statement::select("SELECT * FROM t"));
            assert_eq!(decision.target_id(), "primary");
            assert_eq!(decision.reason(), RouteReason::Sticky);
        }
    }

    #[test]
    fn test_read_locking_marks_sticky() {
        let router = router();
        let ctx = RoutingContext::new();

        let decision = route(&router, &ctx, Statement::select("SELECT * FROM t").for_share());
        assert_eq!(decision.reason(), RouteReason::ReadLocking);
        assert!(ctx.is_sticky());
    }

    #[test]
    fn test_decide_does_not_mark_sticky() {
        let router = router();
        let ctx = RoutingContext::new();

        let decision = router
            .decide(&ctx, &Statement::insert("INSERT INTO t VALUES (1)"), DEFAULT_BIND_GROUP)
            .unwrap();
        assert_eq!(decision.target_id(), "primary");
        assert!(!ctx.is_sticky());
    }

    #[test]
    fn test_reset_returns_reads_to_replicas() {
        let router = router();
        let ctx = RoutingContext::new();

        route(&router, &ctx, Statement::insert("INSERT INTO t VALUES (1)"));
        ctx.reset();

        let decision = route(&router, &ctx, Statement::select("SELECT 1"));
        assert_eq!(decision.role(), TargetRole::Replica);
    }

    #[test]
    fn test_forced_primary_then_resume() {
        let router = router();
        let ctx = RoutingContext::new();

        {
            let _guard = ctx.force_primary();
            let decision = route(&router, &ctx, Statement::select("SELECT 1"));
            assert_eq!(decision.target_id(), "primary");
            assert_eq!(decision.reason(), RouteReason::ForcedPrimary);
        }

        let decision = route(&router, &ctx, Statement::select("SELECT 1"));
        assert_eq!(decision.role(), TargetRole::Replica);
    }

    #[test]
    fn test_forced_replica_overrides_sticky() {
        let router = router();
        let ctx = RoutingContext::new();
        route(&router, &ctx, Statement::insert("INSERT INTO t VALUES (1)"));

        let _guard = ctx.force_replica().unwrap();
        let decision = route(&router, &ctx, Statement::select("SELECT 1"));
        assert_eq!(decision.role(), TargetRole::Replica);
        assert_eq!(decision.reason(), RouteReason::ForcedReplica);
    }

    #[test]
    fn test_bind_group_precedence() {
        let router = router();
        let ctx = RoutingContext::new();

        // 구문 힌트
        let decision = route(
            &router,
            &ctx,
            Statement::select("SELECT 1").with_bind_group("analytics"),
        );
        assert_eq!(decision.target_id(), "analytics-replica");

        // 컨텍스트 재정의가 힌트보다 우선
        let _guard = router.force_bind_group(&ctx, "analytics").unwrap();
        let decision = route(
            &router,
            &ctx,
            Statement::select("SELECT 1").with_bind_group("default"),
        );
        assert_eq!(decision.group(), "analytics");

        let decision = route(&router, &ctx, Statement::insert("INSERT INTO e VALUES (1)"));
        assert_eq!(decision.target_id(), "analytics-primary");
    }

    #[test]
    fn test_unknown_bind_group() {
        let router = router();
        let ctx = RoutingContext::new();

        let err = router.force_bind_group(&ctx, "missing").unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
        assert_eq!(ctx.bind_group_override(), None);

        let err = router
            .route(&ctx, &Statement::select("SELECT 1").with_bind_group("missing"), DEFAULT_BIND_GROUP)
            .unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));

        let err = router
            .route(&ctx, &Statement::select("SELECT 1"), "missing")
            .unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
    }

    #[test]
    fn test_round_robin_across_fresh_units() {
        let router = router();

        let picks: Vec<String> = (0..5)
            .map(|_| {
                let ctx = RoutingContext::new();
                route(&router, &ctx, Statement::select("SELECT 1"))
                    .target_id()
                    .to_string()
            })
            .collect();

        assert_eq!(
            picks,
            vec!["replica-a", "replica-b", "replica-a", "replica-b", "replica-a"]
        );
    }

    #[test]
    fn test_groups_do_not_share_selector_state() {
        let router = Router::builder()
            .default_group(
                BindGroupConfig::new("p1", factory())
                    .with_replica("a", factory())
                    .with_replica("b", factory()),
            )
            .bind_group(
                "analytics",
                BindGroupConfig::new("p2", factory())
                    .with_replica("x", factory())
                    .with_replica("y", factory()),
            )
            .build()
            .unwrap();
        let ctx = RoutingContext::new();

        assert_eq!(route(&router, &ctx, Statement::select("SELECT 1")).target_id(), "a");
        let analytics = Statement::select("SELECT 1").with_bind_group("analytics");
        assert_eq!(route(&router, &ctx, analytics.clone()).target_id(), "x");
        assert_eq!(route(&router, &ctx, analytics).target_id(), "y");
        assert_eq!(route(&router, &ctx, Statement::select("SELECT 1")).target_id(), "b");
    }

    #[test]
    fn test_no_replica_fallback() {
        let router = Router::builder()
            .default_group(BindGroupConfig::new("primary", factory()))
            .build()
            .unwrap();
        let ctx = RoutingContext::new();

        let decision = route(&router, &ctx, Statement::select("SELECT 1"));
        assert_eq!(decision.target_id(), "primary");
        assert_eq!(decision.reason(), RouteReason::NoReplicaFallback);
        assert!(!ctx.is_sticky());
    }

    #[test]
    fn test_no_replica_without_fallback() {
        let router = Router::builder()
            .default_group(
                BindGroupConfig::new("primary", factory())
                    .with_replica("replica-a", factory())
                    .with_fallback_to_primary(false),
            )
            .build()
            .unwrap();
        router
            .mark_replica_down(DEFAULT_BIND_GROUP, &TargetId::from("replica-a"))
            .unwrap();

        let ctx = RoutingContext::new();
        let err = router
            .route(&ctx, &Statement::select("SELECT 1"), DEFAULT_BIND_GROUP)
            .unwrap_err();
        assert!(matches!(err, RouterError::ReplicaUnavailable(_)));

        // 쓰기는 영향 없음
        let decision = route(&router, &ctx, Statement::insert("INSERT INTO t VALUES (1)"));
        assert_eq!(decision.target_id(), "primary");
    }

    #[test]
    fn test_sticky_disabled_policy() {
        let router = Router::builder()
            .default_group(
                BindGroupConfig::new("primary", factory())
                    .with_replica("replica-a", factory())
                    .with_sticky_policy(StickyPolicy::Disabled),
            )
            .build()
            .unwrap();
        let ctx = RoutingContext::new();

        route(&router, &ctx, Statement::insert("INSERT INTO t VALUES (1)"));
        let decision = route(&router, &ctx, Statement::select("SELECT 1"));
        assert_eq!(decision.target_id(), "replica-a");
    }

    #[test]
    fn test_sticky_window_expires() {
        let router = Router::builder()
            .default_group(
                BindGroupConfig::new("primary", factory())
                    .with_replica("replica-a", factory())
                    .with_sticky_window(Duration::from_millis(20)),
            )
            .build()
            .unwrap();
        let ctx = RoutingContext::new();

        route(&router, &ctx, Statement::insert("INSERT INTO t VALUES (1)"));
        assert_eq!(route(&router, &ctx, Statement::select("SELECT 1")).target_id(), "primary");

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(route(&router, &ctx, Statement::select("SELECT 1")).target_id(), "replica-a");
    }

    #[test]
    fn test_membership_changes() {
        let router = router();
        let ctx = RoutingContext::new();

        router
            .mark_replica_down(DEFAULT_BIND_GROUP, &TargetId::from("replica-a"))
            .unwrap();
        for _ in 0..3 {
            assert_eq!(route(&router, &ctx, Statement::select("SELECT 1")).target_id(), "replica-b");
        }

        router
            .add_replica(DEFAULT_BIND_GROUP, Target::new("replica-c", factory()))
            .unwrap();
        assert!(router
            .remove_replica(DEFAULT_BIND_GROUP, &TargetId::from("replica-b"))
            .unwrap());
        assert_eq!(route(&router, &ctx, Statement::select("SELECT 1")).target_id(), "replica-c");

        assert!(router.mark_replica_down("missing", &TargetId::from("x")).is_err());
    }

    #[test]
    fn test_weighted_group() {
        let router = Router::builder()
            .default_group(
                BindGroupConfig::new("primary", factory())
                    .with_weighted_replica("big", factory(), 3)
                    .with_weighted_replica("small", factory(), 1)
                    .with_strategy(SelectorStrategy::Weighted),
            )
            .build()
            .unwrap();

        let mut big = 0;
        for _ in 0..8 {
            let ctx = RoutingContext::new();
            if route(&router, &ctx, Statement::select("SELECT 1")).target_id() == "big" {
                big += 1;
            }
        }
        assert_eq!(big, 6);
    }

    #[test]
    fn test_metrics() {
        let router = router();
        let ctx = RoutingContext::new();

        route(&router, &ctx, Statement::select("SELECT 1"));
        route(&router, &ctx, Statement::insert("INSERT INTO t VALUES (1)"));
        route(&router, &ctx, Statement::select("SELECT 1"));
        {
            let _guard = ctx.force_replica().unwrap();
            route(&router, &ctx, Statement::select("SELECT 1"));
        }

        let metrics = router.metrics();
        assert_eq!(metrics.group_count, 2);
        assert_eq!(metrics.replica_routes, 1);
        assert_eq!(metrics.write_routes, 1);
        assert_eq!(metrics.sticky_routes, 1);
        assert_eq!(metrics.forced_routes, 1);
        assert_eq!(metrics.fallback_routes, 0);
        assert_eq!(metrics.total_routes(), 4);
    }

    #[test]
    fn test_from_settings() {
        let settings = RoutingSettings::from_toml_str(
            r#"
            [groups.default]
            primary = "main"
            replicas = [{ target = "ro-1" }, { target = "ro-2" }]
            "#,
        )
        .unwrap();

        let router: Router<()> = Router::from_settings(&settings, |_| Ok(factory())).unwrap();
        let ctx = RoutingContext::new();
        assert_eq!(route(&router, &ctx, Statement::select("SELECT 1")).target_id(), "ro-1");
        assert_eq!(route(&router, &ctx, Statement::insert("INSERT INTO t VALUES (1)")).target_id(), "main");
    }

    #[test]
    fn test_builder_duplicate_group_fails() {
        let result = Router::builder()
            .bind_group("default", BindGroupConfig::new("a", factory()))
            .bind_group("default", BindGroupConfig::new("b", factory()))
            .build();
        assert!(matches!(result, Err(RouterError::Configuration(_))));
    }
}
