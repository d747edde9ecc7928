//! Router Module
//!
//! 읽기/쓰기 분리 레플리카 라우팅
//!
//! # 구성
//!
//! - 구문 분류 (Statement, StatementKind, LockMode, Classification)
//! - 작업 단위 컨텍스트 (RoutingContext, INIT/STICKY 상태 머신)
//! - 레플리카 선택 (routing::ReplicaSelector)
//! - 바인드 그룹 설정 (routing::BindGroupConfig, routing::RoutingSettings)
//! - 라우팅 세션 (RoutingSession, BlockingRoutingSession)
//! - 컨텍스트 관리 (force primary / force replica / force bind group / reset)
//!
//! # Example
//!
//! ```ignore
//! use replica_router::router::routing::{BindGroupConfig, Router};
//! use replica_router::router::SessionConfig;
//!
//! let router = Router::builder()
//!     .default_group(
//!         BindGroupConfig::new("primary", factory.clone())
//!             .with_replica("replica-1", factory.clone())
//!             .with_replica("replica-2", factory),
//!     )
//!     .build()?;
//!
//! let session = router.session(SessionConfig::default())?;
//!
//! // 쓰기 이후 같은 작업 단위의 읽기는 프라이머리로
//! session.execute("INSERT INTO users (name) VALUES ('alice')").await?;
//! session.execute("SELECT * FROM users").await?;
//!
//! // 범위 한정 재정의
//! {
//!     let _primary = session.with_primary();
//!     session.execute("SELECT count(*) FROM users").await?;
//! }
//!
//! session.commit().await?;
//! session.close().await?;
//! ```

pub mod routing;
mod blocking;
mod connection;
mod context;
mod error;
mod session;
mod statement;

// Re-exports
pub use blocking::{BlockingBackendError, BlockingOutput, BlockingRoutingSession};
pub use connection::{BlockingConnection, BlockingConnectionFactory, Connection, ConnectionFactory};
pub use context::{ConsistencyState, ForcedTarget, OverrideGuard, ResetGuard, RoutingContext};
pub use error::{RouterError, RouterResult, SessionError, SessionResult};
pub use session::{BackendError, Output, RoutingSession, SessionConfig, SessionConfigBuilder};
pub use statement::{classify, Classification, LockMode, Statement, StatementKind};
