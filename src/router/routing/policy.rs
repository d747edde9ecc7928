//! 레플리카 선택 정책
//!
//! 살아있는 레플리카 목록에서 읽기 대상을 하나 고르는 전략을 정의합니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::table::{Target, TargetId};

/// 선택 전략
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorStrategy {
    /// 라운드 로빈 (기본값)
    #[default]
    RoundRobin,
    /// 랜덤
    Random,
    /// 가중치 기반 (smooth weighted round robin)
    Weighted,
}

impl SelectorStrategy {
    /// 전략에 맞는 선택기 생성
    pub fn selector<F>(self) -> Arc<dyn ReplicaSelector<F>>
    where
        F: Send + Sync + 'static,
    {
        match self {
            Self::RoundRobin => Arc::new(RoundRobinSelector::new()),
            Self::Random => Arc::new(RandomSelector),
            Self::Weighted => Arc::new(WeightedSelector::new()),
        }
    }

    /// 전략 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
            Self::Weighted => "weighted",
        }
    }
}

impl fmt::Display for SelectorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 레플리카 선택기
///
/// 바인드 그룹마다 하나씩 존재하며 모든 작업 단위가 공유합니다. 내부 상태는
/// 원자 연산이나 뮤텍스로 보호되어야 합니다.
pub trait ReplicaSelector<F>: Send + Sync {
    /// 레플리카 하나 선택 (빈 목록이면 `None`)
    fn select<'a>(&self, replicas: &'a [Arc<Target<F>>]) -> Option<&'a Arc<Target<F>>>;

    /// 선택기 이름
    fn name(&self) -> &'static str;

    /// 내부 상태 초기화
    fn reset(&self) {}
}

// ============================================================================
// RoundRobinSelector
// ============================================================================

/// 라운드 로빈 선택기
///
/// 카운터 증가는 원자적입니다. 목록 길이가 바뀌는 순간의 공정성 오차는
/// 허용합니다.
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    index: AtomicUsize,
}

impl RoundRobinSelector {
    /// 새 선택기 생성
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F> ReplicaSelector<F> for RoundRobinSelector {
    fn select<'a>(&self, replicas: &'a [Arc<Target<F>>]) -> Option<&'a Arc<Target<F>>> {
        if replicas.is_empty() {
            return None;
        }

        let index = self.index.fetch_add(1, Ordering::Relaxed);
        Some(&replicas[index % replicas.len()])
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn reset(&self) {
        self.index.store(0, Ordering::Relaxed);
    }
}

// ============================================================================
// RandomSelector
// ============================================================================

/// 랜덤 선택기
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl<F> ReplicaSelector<F> for RandomSelector {
    fn select<'a>(&self, replicas: &'a [Arc<Target<F>>]) -> Option<&'a Arc<Target<F>>> {
        if replicas.is_empty() {
            return None;
        }

        let index = rand::thread_rng().gen_range(0..replicas.len());
        Some(&replicas[index])
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

// ============================================================================
// WeightedSelector
// ============================================================================

/// 가중치 선택기 (smooth weighted round robin)
///
/// 가중치 2:1 인 A, B 는 A, B, A 순서로 반복 선택됩니다.
#[derive(Debug, Default)]
pub struct WeightedSelector {
    current: Mutex<HashMap<TargetId, i64>>,
}

impl WeightedSelector {
    /// 새 선택기 생성
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F> ReplicaSelector<F> for WeightedSelector {
    fn select<'a>(&self, replicas: &'a [Arc<Target<F>>]) -> Option<&'a Arc<Target<F>>> {
        if replicas.is_empty() {
            return None;
        }

        let mut current = self.current.lock();
        // 목록에서 빠진 대상의 누적값 제거
        current.retain(|id, _| replicas.iter().any(|r| r.id() == id));

        let mut total = 0i64;
        let mut best: Option<(usize, i64)> = None;

        for (index, replica) in replicas.iter().enumerate() {
            let weight = i64::from(replica.weight());
            let value = current.entry(replica.id().clone()).or_insert(0);
            *value += weight;
            total += weight;

            if best.map_or(true, |(_, best_value)| *value > best_value) {
                best = Some((index, *value));
            }
        }

        let (index, _) = best?;
        if let Some(value) = current.get_mut(replicas[index].id()) {
            *value -= total;
        }

        Some(&replicas[index])
    }

    fn name(&self) -> &'static str {
        "weighted"
    }

    fn reset(&self) {
        self.current.lock().clear();
    }
}
