//! Statement Classification
//!
//! 구문 종류 태깅 및 읽기/쓰기 분류

use std::fmt;

// ============================================================================
// StatementKind - 구문 종류
// ============================================================================

/// 구문 종류
///
/// 구문 생성 시점에 한 번 결정되며, 라우팅 시점에 다시 추론하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatementKind {
    /// SELECT
    Select,
    /// INSERT
    Insert,
    /// UPDATE
    Update,
    /// DELETE
    Delete,
    /// 스키마 변경 (CREATE, ALTER, DROP, TRUNCATE)
    Ddl,
    /// 기타 (CALL, SET, 프로시저 등)
    Other,
    /// 판별 불가 (원시/불투명 구문)
    #[default]
    Unknown,
}

impl StatementKind {
    /// SQL 텍스트의 첫 키워드로 종류 추론
    ///
    /// `WITH ...` 처럼 첫 키워드만으로 판단할 수 없는 구문은 `Unknown`입니다.
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
            .next()
            .unwrap_or("");

        match keyword.to_uppercase().as_str() {
            "SELECT" => Self::Select,
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "CREATE" | "ALTER" | "DROP" | "TRUNCATE" => Self::Ddl,
            "" => Self::Unknown,
            "WITH" => Self::Unknown,
            _ => Self::Other,
        }
    }

    /// 종류를 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Ddl => "DDL",
            Self::Other => "OTHER",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LockMode - 잠금 절
// ============================================================================

/// SELECT 잠금 절
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// `FOR UPDATE`
    ForUpdate,
    /// `FOR SHARE`
    ForShare,
}

impl LockMode {
    /// SQL 텍스트의 잠금 절 탐지 (마지막 절 우선)
    ///
    /// - 배타: `FOR UPDATE`, `FOR NO KEY UPDATE`
    /// - 공유: `FOR SHARE`, `FOR KEY SHARE`, `LOCK IN SHARE MODE`
    ///
    /// `NOWAIT`, `SKIP LOCKED`, `OF <table>` 같은 후행 수식어는 허용합니다.
    pub fn detect(sql: &str) -> Option<Self> {
        let upper = sql.to_uppercase();
        let tokens: Vec<&str> = upper
            .split(|c: char| c.is_whitespace() || c == ';')
            .filter(|t| !t.is_empty())
            .collect();

        (0..tokens.len()).rev().find_map(|i| match &tokens[i..] {
            ["FOR", "UPDATE", ..] | ["FOR", "NO", "KEY", "UPDATE", ..] => Some(Self::ForUpdate),
            ["FOR", "SHARE", ..]
            | ["FOR", "KEY", "SHARE", ..]
            | ["LOCK", "IN", "SHARE", "MODE", ..] => Some(Self::ForShare),
            _ => None,
        })
    }
}

// ============================================================================
// Classification - 분류 결과
// ============================================================================

/// 읽기/쓰기 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// 쓰기 (프라이머리 전용)
    Write,
    /// 일반 읽기
    Read,
    /// 잠금 읽기 (프라이머리 전용)
    ReadLocking,
}

impl Classification {
    /// 프라이머리로만 라우팅되어야 하는지 여부
    pub fn requires_primary(&self) -> bool {
        matches!(self, Self::Write | Self::ReadLocking)
    }

    /// 분류를 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Write => "WRITE",
            Self::Read => "READ",
            Self::ReadLocking => "READ_LOCKING",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 구문 분류
///
/// 종류를 판별할 수 없는 구문은 항상 쓰기로 분류되어 프라이머리로 갑니다.
pub fn classify(kind: StatementKind, lock: Option<LockMode>) -> Classification {
    match kind {
        StatementKind::Select if lock.is_some() => Classification::ReadLocking,
        StatementKind::Select => Classification::Read,
        StatementKind::Insert
        | StatementKind::Update
        | StatementKind::Delete
        | StatementKind::Ddl
        | StatementKind::Other
        | StatementKind::Unknown => Classification::Write,
    }
}

// ============================================================================
// Statement - 구문
// ============================================================================

/// 라우팅 대상 구문
///
/// 텍스트는 그대로 연결 계층에 전달되며, 라우터는 `kind`, `lock`,
/// `bind_group` 만 참조합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 구문 텍스트
    pub text: String,
    /// 구문 종류
    pub kind: StatementKind,
    /// 잠금 절
    pub lock: Option<LockMode>,
    /// 바인드 그룹 힌트
    pub bind_group: Option<String>,
}

impl Statement {
    /// 종류를 명시하여 구문 생성
    pub fn new(kind: StatementKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            lock: None,
            bind_group: None,
        }
    }

    /// SQL 텍스트에서 종류와 잠금 절을 추론하여 생성
    pub fn sql(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = StatementKind::from_sql(&text);
        let lock = match kind {
            StatementKind::Select => LockMode::detect(&text),
            _ => None,
        };

        Self {
            text,
            kind,
            lock,
            bind_group: None,
        }
    }

    /// SELECT 구문
    pub fn select(text: impl Into<String>) -> Self {
        Self::new(StatementKind::Select, text)
    }

    /// INSERT 구문
    pub fn insert(text: impl Into<String>) -> Self {
        Self::new(StatementKind::Insert, text)
    }

    /// UPDATE 구문
    pub fn update(text: impl Into<String>) -> Self {
        Self::new(StatementKind::Update, text)
    }

    /// DELETE 구문
    pub fn delete(text: impl Into<String>) -> Self {
        Self::new(StatementKind::Delete, text)
    }

    /// DDL 구문
    pub fn ddl(text: impl Into<String>) -> Self {
        Self::new(StatementKind::Ddl, text)
    }

    /// 원시 구문 (종류 판별 불가)
    pub fn raw(text: impl Into<String>) -> Self {
        Self::new(StatementKind::Unknown, text)
    }

    /// 잠금 절 설정
    pub fn with_lock(mut self, lock: LockMode) -> Self {
        self.lock = Some(lock);
        self
    }

    /// `FOR UPDATE` 설정
    pub fn for_update(self) -> Self {
        self.with_lock(LockMode::ForUpdate)
    }

    /// `FOR SHARE` 설정
    pub fn for_share(self) -> Self {
        self.with_lock(LockMode::ForShare)
    }

    /// 바인드 그룹 힌트 설정
    pub fn with_bind_group(mut self, group: impl Into<String>) -> Self {
        self.bind_group = Some(group.into());
        self
    }

    /// 분류
    pub fn classification(&self) -> Classification {
        classify(self.kind, self.lock)
    }
}

impl From<&str> for Statement {
    fn from(s: &str) -> Self {
        Self::sql(s)
    }
}

impl From<String> for Statement {
    fn from(s: String) -> Self {
        Self::sql(s)
    }
}

// ============================================================================
// Tests
// ============================================================================
