//! Connection Layer Contract
//!
//! 라우터가 소비하는 연결 계층 인터페이스. 풀링, 와이어 프로토콜, 방언
//! 처리는 구현체의 책임이며 라우터는 "어느 대상의 팩토리를 쓸지"만 결정합니다.
//!
//! 연결이 반환한 에러(`Connection::Error`)는 라우터가 변환하거나 재시도하지
//! 않고 [`SessionError::Backend`](super::SessionError::Backend) 로 원래 타입
//! 그대로 호출자에게 전달합니다.

use std::error::Error as StdError;

use async_trait::async_trait;

use super::routing::TargetId;
use super::statement::Statement;

// ============================================================================
// Async
// ============================================================================

/// 비동기 연결
#[async_trait]
pub trait Connection: Send {
    /// 구문 실행 결과 타입
    type Output: Send;

    /// 백엔드 에러 타입
    type Error: StdError + Send + Sync + 'static;

    /// 구문 실행
    async fn execute(&mut self, statement: &Statement) -> Result<Self::Output, Self::Error>;

    /// 커밋
    async fn commit(&mut self) -> Result<(), Self::Error>;

    /// 롤백
    async fn rollback(&mut self) -> Result<(), Self::Error>;

    /// 연결 반환/종료
    async fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// 비동기 연결 팩토리
///
/// 대상 하나당 하나의 팩토리가 등록되며, 여러 세션이 `Arc`로 공유합니다.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// 생성되는 연결 타입
    type Connection: Connection;

    /// 대상에 대한 연결 획득
    async fn connect(
        &self,
        target: &TargetId,
    ) -> Result<Self::Connection, <Self::Connection as Connection>::Error>;
}

// ============================================================================
// Blocking
// ============================================================================

/// 동기 연결
pub trait BlockingConnection: Send {
    /// 구문 실행 결과 타입
    type Output;

    /// 백엔드 에러 타입
    type Error: StdError + Send + Sync + 'static;

    /// 구문 실행
    fn execute(&mut self, statement: &Statement) -> Result<Self::Output, Self::Error>;

    /// 커밋
    fn commit(&mut self) -> Result<(), Self::Error>;

    /// 롤백
    fn rollback(&mut self) -> Result<(), Self::Error>;

    /// 연결 반환/종료
    fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// 동기 연결 팩토리
pub trait BlockingConnectionFactory: Send + Sync + 'static {
    /// 생성되는 연결 타입
    type Connection: BlockingConnection;

    /// 대상에 대한 연결 획득
    fn connect(
        &self,
        target: &TargetId,
    ) -> Result<Self::Connection, <Self::Connection as BlockingConnection>::Error>;
}

// ============================================================================
// Test support
// ============================================================================

#[cfg(test)]
pub(crate) mod mock {
    use std::io;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    /// 실행 기록
    pub(crate) type Log = Arc<Mutex<Vec<String>>>;

    pub(crate) fn new_log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// 실행한 대상 이름을 결과로 돌려주는 팩토리
    ///
    /// 백엔드 에러 타입으로 `io::Error` 를 사용합니다.
    #[derive(Debug, Clone)]
    pub(crate) struct MockFactory {
        log: Log,
        unreachable: bool,
        fail_on: Option<&'static str>,
    }

    impl MockFactory {
        pub(crate) fn new(log: &Log) -> Arc<Self> {
            Arc::new(Self {
                log: log.clone(),
                unreachable: false,
                fail_on: None,
            })
        }

        pub(crate) fn unreachable(log: &Log) -> Arc<Self> {
            Arc::new(Self {
                log: log.clone(),
                unreachable: true,
                fail_on: None,
            })
        }

        /// `action`("commit", "rollback" 등) 호출 시 실패하는 연결 생성
        pub(crate) fn failing(log: &Log, action: &'static str) -> Arc<Self> {
            Arc::new(Self {
                log: log.clone(),
                unreachable: false,
                fail_on: Some(action),
            })
        }

        fn open(&self, target: &TargetId) -> io::Result<MockConnection> {
            if self.unreachable {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("{} refused connection", target),
                ));
            }
            self.log.lock().push(format!("connect:{}", target));
            Ok(MockConnection {
                target: target.clone(),
                log: self.log.clone(),
                fail_on: self.fail_on,
            })
        }
    }

    #[derive(Debug)]
    pub(crate) struct MockConnection {
        target: TargetId,
        log: Log,
        fail_on: Option<&'static str>,
    }

    impl MockConnection {
        fn record(&self, action: &'static str) -> io::Result<()> {
            self.log.lock().push(format!("{}:{}", action, self.target));
            if self.fail_on == Some(action) {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} failed on {}", action, self.target),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Connection for MockConnection {
        type Output = TargetId;
        type Error = io::Error;

        async fn execute(&mut self, _statement: &Statement) -> io::Result<TargetId> {
            self.record("execute")?;
            Ok(self.target.clone())
        }

        async fn commit(&mut self) -> io::Result<()> {
            self.record("commit")
        }

        async fn rollback(&mut self) -> io::Result<()> {
            self.record("rollback")
        }

        async fn close(&mut self) -> io::Result<()> {
            self.record("close")
        }
    }

    #[async_trait]
    impl ConnectionFactory for MockFactory {
        type Connection = MockConnection;

        async fn connect(&self, target: &TargetId) -> io::Result<MockConnection> {
            self.open(target)
        }
    }

    impl BlockingConnection for MockConnection {
        type Output = TargetId;
        type Error = io::Error;

        fn execute(&mut self, _statement: &Statement) -> io::Result<TargetId> {
            self.record("execute")?;
            Ok(self.target.clone())
        }

        fn commit(&mut self) -> io::Result<()> {
            self.record("commit")
        }

        fn rollback(&mut self) -> io::Result<()> {
            self.record("rollback")
        }

        fn close(&mut self) -> io::Result<()> {
            self.record("close")
        }
    }

    impl BlockingConnectionFactory for MockFactory {
        type Connection = MockConnection;

        fn connect(&self, target: &TargetId) -> io::Result<MockConnection> {
            self.open(target)
        }
    }
}
