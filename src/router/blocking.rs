//! Blocking Routing Session
//!
//! 동기 호출자를 위한 라우팅 세션. 라우팅 규칙과 컨텍스트는 비동기
//! 세션과 동일합니다.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::connection::{BlockingConnection, BlockingConnectionFactory};
use super::context::{OverrideGuard, ResetGuard, RoutingContext};
use super::error::{RouterError, RouterResult, SessionError, SessionResult};
use super::routing::{Router, RoutingDecision, TargetId};
use super::session::{into_result, keep_first, OpenConnection, SessionConfig};
use super::statement::Statement;

/// 동기 실행 결과 타입
pub type BlockingOutput<F> =
    <<F as BlockingConnectionFactory>::Connection as BlockingConnection>::Output;

/// 동기 백엔드 에러 타입
pub type BlockingBackendError<F> =
    <<F as BlockingConnectionFactory>::Connection as BlockingConnection>::Error;

impl<F: BlockingConnectionFactory> Router<F> {
    /// 새 작업 단위로 동기 세션 생성
    pub fn blocking_session(&self, config: SessionConfig) -> RouterResult<BlockingRoutingSession<F>> {
        self.blocking_session_in(Arc::new(RoutingContext::new()), config)
    }

    /// 기본 설정으로 동기 세션 생성
    pub fn default_blocking_session(&self) -> RouterResult<BlockingRoutingSession<F>> {
        self.blocking_session(SessionConfig::default())
    }

    /// 기존 작업 단위의 컨텍스트를 공유하는 동기 세션 생성
    pub fn blocking_session_in(
        &self,
        context: Arc<RoutingContext>,
        config: SessionConfig,
    ) -> RouterResult<BlockingRoutingSession<F>> {
        self.group(&config.bind_group)?;

        Ok(BlockingRoutingSession {
            router: self.clone(),
            context,
            config,
            connections: Mutex::new(Vec::new()),
            open: RwLock::new(true),
        })
    }
}

/// 동기 라우팅 세션
pub struct BlockingRoutingSession<F: BlockingConnectionFactory> {
    router: Router<F>,
    context: Arc<RoutingContext>,
    config: SessionConfig,
    connections: Mutex<Vec<OpenConnection<F::Connection>>>,
    open: RwLock<bool>,
}

impl<F: BlockingConnectionFactory> BlockingRoutingSession<F> {
    /// 구문 실행
    pub fn execute(
        &self,
        statement: impl Into<Statement>,
    ) -> SessionResult<BlockingOutput<F>, BlockingBackendError<F>> {
        self.ensure_open()?;

        let statement = statement.into();
        let decision = self
            .router
            .route(&self.context, &statement, &self.config.bind_group)?;

        self.dispatch(&decision, &statement)
    }

    /// 라우팅 결정만 조회
    pub fn explain(&self, statement: &Statement) -> RouterResult<RoutingDecision<F>> {
        self.router
            .decide(&self.context, statement, &self.config.bind_group)
    }

    fn dispatch(
        &self,
        decision: &RoutingDecision<F>,
        statement: &Statement,
    ) -> SessionResult<BlockingOutput<F>, BlockingBackendError<F>> {
        let mut connections = self.connections.lock();

        let index = match connections.iter().position(|open| open.matches(decision)) {
            Some(index) => index,
            None => {
                let target = decision.target();
                let connection = target
                    .factory()
                    .connect(target.id())
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
            .map_err(SessionError::Backend)
    }

    /// 커밋 (실패 시 나머지는 롤백, 모든 연결 반환)
    pub fn commit(&self) -> SessionResult<(), BlockingBackendError<F>> {
        self.ensure_open()?;

        let mut connections = self.connections.lock();
        let mut first_error = None;
        for open in connections.iter_mut() {
            let result = if first_error.is_none() {
                open.connection.commit()
            } else {
                open.connection.rollback()
            };
            keep_first(&mut first_error, result);
        }
        release(&mut connections, &mut first_error);

        into_result(first_error)
    }

    /// 롤백
    pub fn rollback(&self) -> SessionResult<(), BlockingBackendError<F>> {
        self.ensure_open()?;

        let mut connections = self.connections.lock();
        let mut first_error = None;
        for open in connections.iter_mut() {
            keep_first(&mut first_error, open.connection.rollback());
        }
        release(&mut connections, &mut first_error);

        into_result(first_error)
    }

    /// 세션 닫기
    pub fn close(&self) -> SessionResult<(), BlockingBackendError<F>> {
        if !self.is_open() {
            return Ok(());
        }

        let mut connections = self.connections.lock();
        let mut first_error = None;
        for open in connections.iter_mut() {
            keep_first(&mut first_error, open.connection.rollback());
        }
        release(&mut connections, &mut first_error);
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

    /// 바인드 그룹 강제 범위
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

    /// 열린 연결의 대상 목록
    pub fn open_targets(&self) -> Vec<TargetId> {
        self.connections
            .lock()
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

fn release<C: BlockingConnection>(
    connections: &mut Vec<OpenConnection<C>>,
    first_error: &mut Option<C::Error>,
) {
    for mut open in connections.drain(..) {
        keep_first(first_error, open.connection.close());
    }
}

impl<F: BlockingConnectionFactory> fmt::Debug for BlockingRoutingSession<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingRoutingSession")
            .field("context", &self.context)
            .field("bind_group", &self.config.bind_group)
            .field("open", &*self.open.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::connection::mock::{new_log, Log, MockFactory};
    use crate::router::routing::BindGroupConfig;
    use std::thread;

    fn router(log: &Log) -> Router<MockFactory> {
        Router::builder()
            .default_group(
                BindGroupConfig::new("primary", MockFactory::new(log))
                    .with_replica("replica-a", MockFactory::new(log))
                    .with_replica("replica-b", MockFactory::new(log)),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_write_then_read_sticks_to_primary() {
        let log = new_log();
        let session = router(&log).default_blocking_session().unwrap();

        assert_eq!(session.execute("SELECT 1").unwrap(), "replica-a");
        assert_eq!(session.execute("DELETE FROM t").unwrap(), "primary");
        assert_eq!(session.execute("SELECT 1").unwrap(), "primary");
        assert_eq!(
            session.open_targets(),
            vec![TargetId::from("replica-a"), TargetId::from("primary")]
        );
    }

    #[test]
    fn test_force_replica_scope() {
        let log = new_log();
        let session = router(&log).default_blocking_session().unwrap();
        session.execute("UPDATE t SET a = 1").unwrap();

        {
            let _replica = session.with_replica().unwrap();
            assert_eq!(session.execute("SELECT 1").unwrap(), "replica-a");
            // 쓰기는 재정의와 무관하게 프라이머리
            assert_eq!(session.execute("UPDATE t SET a = 2").unwrap(), "primary");
        }

        assert_eq!(session.execute("SELECT 1").unwrap(), "primary");
    }

    #[test]
    fn test_threads_get_independent_units() {
        let log = new_log();
        let router = router(&log);

        let writer = router.default_blocking_session().unwrap();
        writer.execute("INSERT INTO t VALUES (1)").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let router = router.clone();
                thread::spawn(move || {
                    let session = router.default_blocking_session().unwrap();
                    session.execute("SELECT 1").unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_ne!(handle.join().unwrap(), "primary");
        }
    }

    #[test]
    fn test_connect_error_passthrough() {
        let log = new_log();
        let router = Router::builder()
            .default_group(
                BindGroupConfig::new("primary", MockFactory::unreachable(&log))
                    .with_replica("replica-a", MockFactory::new(&log)),
            )
            .build()
            .unwrap();
        let session = router.default_blocking_session().unwrap();

        let err = session.execute("INSERT INTO t VALUES (1)").unwrap_err();
        assert_eq!(
            err.backend_error().map(|e| e.kind()),
            Some(std::io::ErrorKind::ConnectionRefused)
        );
        // 실패해도 Sticky 는 유지
        assert!(session.context().is_sticky());
    }

    #[test]
    fn test_commit_and_close() {
        let log = new_log();
        let session = router(&log).default_blocking_session().unwrap();

        session.execute("INSERT INTO t VALUES (1)").unwrap();
        session.commit().unwrap();
        session.close().unwrap();

        assert_eq!(
            log.lock().clone(),
            vec!["connect:primary", "execute:primary", "commit:primary", "close:primary"]
        );
        assert!(matches!(
            session.execute("SELECT 1").unwrap_err(),
            SessionError::Router(RouterError::Session(_))
        ));
    }

    #[test]
    fn test_close_after_failed_rollback_releases_all() {
        let log = new_log();
        let router = Router::builder()
            .default_group(
                BindGroupConfig::new("primary", MockFactory::failing(&log, "rollback"))
                    .with_replica("replica-a", MockFactory::new(&log)),
            )
            .build()
            .unwrap();
        let session = router.default_blocking_session().unwrap();

        session.execute("SELECT 1").unwrap();
        session.execute("UPDATE t SET a = 1").unwrap();

        assert!(session.close().unwrap_err().is_backend());
        let entries = log.lock().clone();
        assert!(entries.contains(&"close:replica-a".to_string()));
        assert!(entries.contains(&"close:primary".to_string()));
        assert!(session.open_targets().is_empty());
    }

    #[test]
    fn test_same_target_id_across_groups_uses_group_factory() {
        let default_log = new_log();
        let analytics_log = new_log();
        let router = Router::builder()
            .default_group(BindGroupConfig::new("db", MockFactory::new(&default_log)))
            .bind_group(
                "analytics",
                BindGroupConfig::new("db", MockFactory::new(&analytics_log)),
            )
            .build()
            .unwrap();
        let session = router.default_blocking_session().unwrap();

        session.execute("DELETE FROM t").unwrap();
        let _analytics = session.with_bind_group("analytics").unwrap();
        session.execute("DELETE FROM e").unwrap();

        assert_eq!(analytics_log.lock().clone(), vec!["connect:db", "execute:db"]);
        assert_eq!(default_log.lock().len(), 2);
    }
}
