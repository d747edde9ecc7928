//! 선언적 라우팅 설정
//!
//! TOML 등에서 읽어들이는 바인드 그룹 설정입니다.
//!
//! ```toml
//! [groups.default]
//! primary = "main"
//! strategy = "round_robin"
//! sticky = "enabled"
//! replicas = [
//!     { target = "replica-1" },
//!     { target = "replica-2", weight = 3 },
//! ]
//!
//! [groups.analytics]
//! primary = "warehouse"
//! replicas = [{ target = "warehouse-ro" }]
//! fallback_to_primary = false
//! sticky_window_ms = 2000
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::super::error::{RouterError, RouterResult};
use super::policy::SelectorStrategy;
use super::table::{BindGroupConfig, StickyPolicy, TargetId};

/// 전체 라우팅 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingSettings {
    /// 이름별 바인드 그룹
    #[serde(default)]
    pub groups: BTreeMap<String, BindGroupSettings>,
}

/// 바인드 그룹 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindGroupSettings {
    /// 프라이머리 대상
    pub primary: String,
    /// 레플리카 목록
    #[serde(default)]
    pub replicas: Vec<ReplicaSettings>,
    /// 선택 전략
    #[serde(default)]
    pub strategy: SelectorStrategy,
    /// Sticky 정책
    #[serde(default)]
    pub sticky: StickyPolicy,
    /// 레플리카 부재 시 프라이머리 사용
    #[serde(default = "default_fallback")]
    pub fallback_to_primary: bool,
    /// Sticky 유지 시간 (밀리초)
    #[serde(default)]
    pub sticky_window_ms: Option<u64>,
}

/// 레플리카 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplicaSettings {
    /// 대상 식별자
    pub target: String,
    /// 가중치
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_fallback() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

impl RoutingSettings {
    /// TOML 문자열에서 파싱
    pub fn from_toml_str(s: &str) -> RouterResult<Self> {
        toml::from_str(s)
            .map_err(|e| RouterError::configuration(format!("Invalid routing settings: {}", e)))
    }
}

impl BindGroupSettings {
    /// 대상별 팩토리를 찾아 런타임 설정으로 변환
    pub fn to_config<F, R>(&self, resolve: &mut R) -> RouterResult<BindGroupConfig<F>>
    where
        F: Send + Sync + 'static,
        R: FnMut(&TargetId) -> RouterResult<Arc<F>>,
    {
        let primary = TargetId::new(self.primary.as_str());
        let mut config = BindGroupConfig::new(primary.clone(), resolve(&primary)?)
            .with_strategy(self.strategy)
            .with_sticky_policy(self.sticky)
            .with_fallback_to_primary(self.fallback_to_primary);

        if let Some(ms) = self.sticky_window_ms {
            config = config.with_sticky_window(Duration::from_millis(ms));
        }

        for replica in &self.replicas {
            let id = TargetId::new(replica.target.as_str());
            let factory = resolve(&id)?;
            config = config.with_weighted_replica(id, factory, replica.weight);
        }

        Ok(config)
    }
}
