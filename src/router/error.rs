//! Router Error Types
//!
//! 라우터 에러 정의

use std::io;
use thiserror::Error;

// ============================================================================
// RouterError - 라우터 에러
// ============================================================================

/// 라우터 에러
///
/// 라우팅 계층 자체의 에러(설정, 레플리카 부재, 컨텍스트 오용)를
/// 표현합니다. `Connection` / `Query` / `Timeout` / `Io` 는 자체 에러 타입이
/// 없는 연결 구현이 `Connection::Error` 로 그대로 쓸 수 있도록 제공됩니다.
#[derive(Error, Debug)]
pub enum RouterError {
    /// 설정 에러 (알 수 없는 바인드 그룹, 중복 그룹, 빈 프라이머리 등)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 사용 가능한 레플리카 없음
    #[error("Replica unavailable: {0}")]
    ReplicaUnavailable(String),

    /// 라우팅 컨텍스트 오용
    #[error("Routing context error: {0}")]
    RoutingContext(String),

    /// 세션 에러
    #[error("Session error: {0}")]
    Session(String),

    /// 연결 에러
    #[error("Connection error: {0}")]
    Connection(String),

    /// 쿼리 에러
    #[error("Query error: {code} - {message}")]
    Query { code: String, message: String },

    /// 타임아웃 에러
    #[error("Timeout: {0}")]
    Timeout(String),

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RouterError {
    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 레플리카 부재 에러 생성
    pub fn replica_unavailable(msg: impl Into<String>) -> Self {
        Self::ReplicaUnavailable(msg.into())
    }

    /// 컨텍스트 에러 생성
    pub fn routing_context(msg: impl Into<String>) -> Self {
        Self::RoutingContext(msg.into())
    }

    /// 세션 에러 생성
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// 연결 에러 생성
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// 쿼리 에러 생성
    pub fn query(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 타임아웃 에러 생성
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// 호출자의 잘못된 사용으로 인한 에러 여부
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::RoutingContext(_) | Self::Session(_)
        )
    }

    /// 연결 계층에서 올라온 에러 여부
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Query { .. } | Self::Timeout(_) | Self::Io(_)
        )
    }
}

// ============================================================================
// SessionError - 세션 에러
// ============================================================================

/// 세션 실행 에러
///
/// 라우터 에러와 연결 계층(백엔드) 에러를 구분합니다. 백엔드 에러는 변환
/// 없이 원래 타입 그대로 담기므로 호출자가 드라이버 에러를 직접 매칭할 수
/// 있습니다.
#[derive(Error, Debug)]
pub enum SessionError<E> {
    /// 라우팅 단계 에러 (설정, 컨텍스트, 닫힌 세션)
    #[error(transparent)]
    Router(#[from] RouterError),

    /// 연결 계층이 반환한 에러
    #[error(transparent)]
    Backend(E),
}

impl<E> SessionError<E> {
    /// 라우터 에러 참조
    pub fn router_error(&self) -> Option<&RouterError> {
        match self {
            Self::Router(err) => Some(err),
            Self::Backend(_) => None,
        }
    }

    /// 백엔드 에러 참조
    pub fn backend_error(&self) -> Option<&E> {
        match self {
            Self::Backend(err) => Some(err),
            Self::Router(_) => None,
        }
    }

    /// 백엔드 에러 추출
    pub fn into_backend(self) -> Option<E> {
        match self {
            Self::Backend(err) => Some(err),
            Self::Router(_) => None,
        }
    }

    /// 백엔드 에러 여부
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }

    /// 호출자의 잘못된 사용으로 인한 에러 여부
    pub fn is_client_error(&self) -> bool {
        self.router_error().map_or(false, RouterError::is_client_error)
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 라우터 결과 타입
pub type RouterResult<T> = Result<T, RouterError>;

/// 세션 결과 타입
pub type SessionResult<T, E> = Result<T, SessionError<E>>;

// ============================================================================
// Tests
// ============================================================================
