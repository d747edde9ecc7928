//! 라우팅 모듈
//!
//! 바인드 그룹별로 쓰기는 프라이머리로, 읽기는 레플리카로 라우팅합니다.
//!
//! # 개요
//!
//! - [`RoutingConfig`] / [`BindGroup`]: 이름 붙은 바인드 그룹 레지스트리
//! - [`ReplicaSelector`]: 라운드 로빈, 랜덤, 가중치 선택기
//! - [`Router`]: 구문별 [`RoutingDecision`] 생성
//! - [`RoutingSettings`]: TOML 로 읽는 선언적 설정
//!
//! # 예시
//!
//! ```ignore
//! use replica_router::router::routing::{BindGroupConfig, Router, SelectorStrategy};
//! use replica_router::router::{RoutingContext, Statement};
//!
//! let router = Router::builder()
//!     .default_group(
//!         BindGroupConfig::new("primary", primary_factory)
//!             .with_replica("replica-1", replica_factory.clone())
//!             .with_replica("replica-2", replica_factory)
//!             .with_strategy(SelectorStrategy::RoundRobin),
//!     )
//!     .build()?;
//!
//! let ctx = RoutingContext::new();
//! let decision = router.route(&ctx, &Statement::sql("SELECT 1"), "default")?;
//! ```

mod policy;
mod router;
mod settings;
mod table;

pub use policy::{RandomSelector, ReplicaSelector, RoundRobinSelector, SelectorStrategy, WeightedSelector};
pub use router::{RouteReason, Router, RouterBuilder, RouterMetrics, RoutingDecision};
pub use settings::{BindGroupSettings, ReplicaSettings, RoutingSettings};
pub use table::{
    BindGroup, BindGroupConfig, RoutingConfig, StickyPolicy, Target, TargetId, TargetRole,
    DEFAULT_BIND_GROUP,
};
