//! # Replica Router
//!
//! Read/write splitting for database sessions. Writes go to a primary,
//! reads go to replicas, and a unit of work that has written keeps reading
//! from the primary so it always sees its own writes.
//!
//! ## Features
//!
//! - **Statement Classification** - Reads, writes and locking reads (`FOR UPDATE` / `FOR SHARE`)
//! - **Read-Your-Writes** - Per-unit INIT/STICKY state machine, optionally time-boxed
//! - **Replica Selection** - Round robin, random, and smooth weighted selection
//! - **Bind Groups** - Named primary/replica sets, selectable per session, statement, or scope
//! - **Scoped Overrides** - Force primary, force replica, force bind group, and reset
//! - **Async and Blocking** - Tokio sessions and plain blocking sessions share one router
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! replica-router = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Basic Usage
//!
//! The router does not speak any wire protocol. Plug in your own connection
//! layer by implementing [`ConnectionFactory`]:
//!
//! ```rust,ignore
//! use replica_router::{BindGroupConfig, Router, SessionConfig};
//!
//! let router = Router::builder()
//!     .default_group(
//!         BindGroupConfig::new("primary", pg.clone())
//!             .with_replica("replica-1", pg.clone())
//!             .with_replica("replica-2", pg),
//!     )
//!     .build()?;
//!
//! let session = router.session(SessionConfig::default())?;
//!
//! session.execute("SELECT * FROM users").await?;                 // replica-1
//! session.execute("UPDATE users SET name = 'bob'").await?;       // primary
//! session.execute("SELECT * FROM users").await?;                 // primary (sticky)
//!
//! session.commit().await?;
//! session.close().await?;
//! ```
//!
//! ## Scoped Overrides
//!
//! ```rust,ignore
//! {
//!     let _guard = session.with_primary();
//!     session.execute("SELECT balance FROM accounts").await?;    // primary
//! }
//!
//! {
//!     let _guard = session.with_bind_group("analytics")?;
//!     session.execute("SELECT count(*) FROM events").await?;     // analytics replica
//! }
//! ```
//!
//! Guards restore the previous state when dropped, including on early return
//! and unwinding.
//!
//! ## Configuration
//!
//! Bind groups can be declared in TOML with [`RoutingSettings`]:
//!
//! ```rust
//! use replica_router::RoutingSettings;
//!
//! let settings = RoutingSettings::from_toml_str(r#"
//!     [groups.default]
//!     primary = "main"
//!     strategy = "weighted"
//!     replicas = [
//!         { target = "replica-1", weight = 3 },
//!         { target = "replica-2" },
//!     ]
//! "#).unwrap();
//!
//! assert_eq!(settings.groups["default"].replicas.len(), 2);
//! ```
//!
//! ## Error Handling
//!
//! Routing operations return [`RouterResult`]. Session calls return
//! [`SessionResult`], whose [`SessionError::Backend`] variant carries the
//! connection layer's own error type untouched; the router never retries on
//! another target.
//!
//! ```rust
//! use replica_router::{RouterError, Statement, StatementKind};
//!
//! let stmt = Statement::sql("select * from t for update");
//! assert_eq!(stmt.kind, StatementKind::Select);
//! assert!(stmt.classification().requires_primary());
//!
//! let err = RouterError::configuration("Unknown bind group 'reports'");
//! assert!(err.is_client_error());
//! ```
//!
//! ## Modules
//!
//! - [`router`] - Sessions, routing context, and statement classification
//! - [`router::routing`] - Bind groups, replica selectors, and the router itself
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod router;

// Re-exports for convenience
pub use router::{
    Statement, StatementKind, LockMode, Classification,
    RoutingContext, ConsistencyState, ForcedTarget, OverrideGuard, ResetGuard,
    RoutingSession, SessionConfig, SessionConfigBuilder,
    BlockingRoutingSession,
    Connection, ConnectionFactory, BlockingConnection, BlockingConnectionFactory,
    RouterError, RouterResult, SessionError, SessionResult,
};

pub use router::routing::{
    Router, RouterBuilder, RoutingDecision, RouteReason, RouterMetrics,
    BindGroup, BindGroupConfig, RoutingConfig, Target, TargetId, TargetRole, StickyPolicy,
    ReplicaSelector, SelectorStrategy,
    RoutingSettings, BindGroupSettings, ReplicaSettings,
    DEFAULT_BIND_GROUP,
};
