//! Routing Session
//!
//! 일반 데이터베이스 세션과 같은 실행 표면(execute, commit, rollback)에
//! 라우팅 단계를 끼워 넣은 비동기 세션

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::debug;

use super::connection::{Connection, ConnectionFactory};
use super::context::{OverrideGuard, ResetGuard, RoutingContext};
use super::error::{RouterError, RouterResult, SessionError, SessionResult};
use super::routing::{Router, RoutingDecision, TargetId, DEFAULT_BIND_GROUP};
use super::statement::Statement;

/// 실행 결과 타입
pub type Output<F> = <<F as ConnectionFactory>::Connection as Connection>::Output;

/// 백엔드 에러 타입
pub type BackendError<F> = <<F as ConnectionFactory>::Connection as Connection>::Error;

// ============================================================================
// SessionConfig - 세션 설정
// ============================================================================

/// 세션 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// 재정의나 구문 힌트가 없을 때 쓰는 바인드 그룹
    pub bind_group: String,
}

impl SessionConfig {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌더 시작
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// 기본 바인드 그룹 설정
    pub fn with_bind_group(mut self, group: impl Into<String>) -> Self {
        self.bind_group = group.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind_group: DEFAULT_BIND_GROUP.to_string(),
        }
    }
}

/// 세션 설정 빌더
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// 새 빌더 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 바인드 그룹 설정
    pub fn with_bind_group(mut self, group: impl Into<String>) -> Self {
        self.config.bind_group = group.into();
        self
    }

    /// 빌드
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

// ============================================================================
// Router 확장 - 세션 생성
// ============================================================================

impl<F: ConnectionFactory> Router<F> {
    /// 새 작업 단위로 세션 생성
    ///
    /// 설정의 기본 바인드 그룹이 등록되어 있지 않으면 즉시 실패합니다.
    pub fn session(&self, config: SessionConfig) -> RouterResult<RoutingSession<F>> {
        self.session_in(Arc::new(RoutingContext::new()), config)
    }

    /// 기본 설정으로 세션 생성
    pub fn default_session(&self) -> RouterResult<RoutingSession<F>> {
        self.session(SessionConfig::default())
    }

    /// 기존 작업 단위의 컨텍스트를 공유하는 세션 생성
    pub fn session_in(
        &self,
        context: Arc<RoutingContext>,
        config: SessionConfig,
    ) -> RouterResult<RoutingSession<F>> {
        self.group(&config.bind_group)?;

        Ok(RoutingSession {
            router: self.clone(),
            context,
            config,
            connections: Mutex::new(Vec::new()),
            open: RwLock::new(true),
        })
    }
}

// ============================================================================
// OpenConnection - 열린 연결
// ============================================================================

/// 세션이 보유한 연결
///
/// 같은 대상 이름이 여러 바인드 그룹에 있을 수 있으므로 (그룹, 대상) 쌍으로
/// 구분합니다.
pub(super) struct OpenConnection<C> {
    pub(super) group: String,
    pub(super) target: TargetId,
    pub(super) connection: C,
}

impl<C> OpenConnection<C> {
    pub(super) fn matches<F>(&self, decision: &RoutingDecision<F>) -> bool {
        self.group == decision.group() && self.target == *decision.target_id()
    }
}

/// 첫 번째 에러만 보관
pub(super) fn keep_first<E>(slot: &mut Option<E>, result: Result<(), E>) {
    if let Err(err) = result {
        slot.get_or_insert(err);
    }
}

// ============================================================================
// RoutingSession - 라우팅 세션
// ============================================================================

/// 비동기 라우팅 세션
///
/// 하나의 작업 단위 안에서만 사용합니다. 대상별 연결은 처음 필요할 때 열고
/// commit/rollback/close 까지 유지합니다.
pub struct RoutingSession<F: ConnectionFactory> {
    router: Router<F>,
    context: Arc<RoutingContext>,
    config: SessionConfig,
    /// 연 순서대로 보관한 연결
    connections: Mutex<Vec<OpenConnection<F::Connection>>>,
    open: RwLock<bool>,
}

impl<F: ConnectionFactory> RoutingSession<F> {
    /// 구문 실행
    ///
    /// 라우팅 결정은 await 이전에 확정되며 재평가하지 않습니다. 연결 계층의
    /// 에러는 [`SessionError::Backend`] 로 그대로 반환되고 다른 대상으로
    /// 재시도하지 않습니다.
    pub async fn execute(
        &self,
        statement: impl Into<Statement>,
    ) -> SessionResult<Output<F>, BackendError<F>> {
        self.ensure_open()?;

        let statement = statement.into();
        let decision = self
            .router
            .route(&self.context, &statement, &self.config.bind_group)?;

        self.dispatch(&decision, &statement).await
    }

    /// 라우팅 결정만 조회 (실행 및 컨텍스트 변경 없음)
    pub fn explain(&self, statement: &Statement) -> RouterResult<RoutingDecision<F>> {
        self.router
            .decide(&self.context, statement, &self.config.bind_group)
    }

    async fn dispatch(
        &self,
        decision: &RoutingDecision<F>,
        statement: &Statement,
    ) -> SessionResult<Output<F>, BackendError<F>> {
        let mut connections = self.connections.lock().await;

        let index = match connections.iter().position(|open| open.matches(decision)) {
            Some(index) => index,
            None => {
                let target = decision.target();
                let connection = target
                    .factory()
                    .connect(target.id())
                    .await
                    .map_err(SessionError::Backend)?;
                debug!(
                    unit = self.context.unit_id(),
                    group = decision.group(),
                    target = %target.id(),
                    "opened connection"
                );
                connections.push(OpenConnection {
                    group: decision.group().to_string(),
                    target: target.id().clone(),
                    connection,
                });
                connections.len() - 1
            }
        };

        connections[index]
            .connection
            .execute(statement)
            .await
            .map_err(SessionError::Backend)
    }

    /// 열린 모든 연결 커밋 후 반환
    ///
    /// 하나가 실패하면 나머지는 커밋하지 않고 롤백합니다. 어느 경우든 모든
    /// 연결을 닫고 첫 번째 에러를 반환합니다.
    pub async fn commit(&self) -> SessionResult<(), BackendError<F>> {
        self.ensure_open()?;

        let mut connections = self.connections.lock().await;
        let mut first_error = None;
        for open in connections.iter_mut() {
            let result = if first_error.is_none() {
                open.connection.commit().await
            } else {
                open.connection.rollback().await
            };
            keep_first(&mut first_error, result);
        }
        release(&mut connections, &mut first_error).await;

        into_result(first_error)
    }

    /// 열린 모든 연결 롤백 후 반환
    pub async fn rollback(&self) -> SessionResult<(), BackendError<F>> {
        self.ensure_open()?;

        let mut connections = self.connections.lock().await;
        let mut first_error = None;
        for open in connections.iter_mut() {
            keep_first(&mut first_error, open.connection.rollback().await);
        }
        release(&mut connections, &mut first_error).await;

        into_result(first_error)
    }

    /// 세션 닫기
    ///
    /// 커밋되지 않은 작업은 롤백되고 모든 연결이 닫힌 뒤 세션이 닫힙니다.
    /// 정리 중 에러가 나도 나머지 연결의 정리는 계속됩니다. 이미 닫힌
    /// 세션에 대해서는 아무것도 하지 않습니다.
    pub async fn close(&self) -> SessionResult<(), BackendError<F>> {
        if !self.is_open() {
            return Ok(());
        }

        let mut connections = self.connections.lock().await;
        let mut first_error = None;
        for open in connections.iter_mut() {
            keep_first(&mut first_error, open.connection.rollback().await);
        }
        release(&mut connections, &mut first_error).await;
        *self.open.write() = false;

        into_result(first_error)
    }

    /// 프라이머리 강제 범위
    pub fn with_primary(&self) -> OverrideGuard<'_> {
        self.context.force_primary()
    }

    /// 레플리카 강제 범위
    pub fn with_replica(&self) -> RouterResult<OverrideGuard<'_>> {
        self.context.force_replica()
    }

    /// 바인드 그룹 강제 범위 (그룹 이름을 즉시 검증)
    pub fn with_bind_group(&self, name: &str) -> RouterResult<OverrideGuard<'_>> {
        self.router.force_bind_group(&self.context, name)
    }

    /// 범위 한정 초기화
    pub fn with_reset(&self) -> ResetGuard<'_> {
        self.context.scoped_reset()
    }

    /// Sticky 및 재정의 초기화
    pub fn reset(&self) {
        self.context.reset();
    }

    /// 현재 열린 연결의 대상 목록
    pub async fn open_targets(&self) -> Vec<TargetId> {
        self.connections
            .lock()
            .await
            .iter()
            .map(|open| open.target.clone())
            .collect()
    }

    /// 작업 단위 컨텍스트
    pub fn context(&self) -> &Arc<RoutingContext> {
        &self.context
    }

    /// 라우터
    pub fn router(&self) -> &Router<F> {
        &self.router
    }

    /// 세션 설정
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 열린 상태 여부
    pub fn is_open(&self) -> bool {
        *self.open.read()
    }

    fn ensure_open(&self) -> RouterResult<()> {
        if *self.open.read() {
            Ok(())
        } else {
            Err(RouterError::session("Session is closed"))
        }
    }
}

/// 모든 연결을 닫고 비움
async fn release<C: Connection>(
    connections: &mut Vec<OpenConnection<C>>,
    first_error: &mut Option<C::Error>,
) {
    for mut open in connections.drain(..) {
        keep_first(first_error, open.connection.close().await);
    }
}

pub(super) fn into_result<E>(first_error: Option<E>) -> SessionResult<(), E> {
    match first_error {
        Some(err) => Err(SessionError::Backend(err)),
        None => Ok(()),
    }
}

impl<F: ConnectionFactory> fmt::Debug for RoutingSession<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingSession")
            .field("context", &self.context)
            .field("bind_group", &self.config.bind_group)
            .field("open", &*self.open.read())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
