//! Routing Context
//!
//! 논리적 작업 단위(요청, 백그라운드 작업 등)별 라우팅 상태
//!
//! # 상태 전이
//!
//! ```text
//!   Init ──(쓰기/잠금 읽기 라우팅)──▶ Sticky
//!   Sticky ──(reset 또는 작업 단위 종료)──▶ Init
//! ```
//!
//! 컨텍스트는 작업 단위마다 하나씩 만들어지고 `Arc`로 그 단위 안의 세션들에
//! 명시적으로 전달됩니다. 동시에 실행되는 다른 작업 단위와 공유하지 않습니다.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::error::{RouterError, RouterResult};

/// 작업 단위 식별자 발급용 카운터 (로그 상관관계 용도)
static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// ConsistencyState - 일관성 상태
// ============================================================================

/// 읽기-자신-쓰기 일관성 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyState {
    /// 아직 쓰기 없음
    #[default]
    Init,
    /// 쓰기 발생, 읽기를 프라이머리에 고정
    Sticky,
}

// ============================================================================
// ForcedTarget - 강제 대상
// ============================================================================

/// 명시적 대상 강제
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedTarget {
    /// 모든 구문을 프라이머리로
    Primary,
    /// 읽기를 레플리카로 (쓰기는 여전히 프라이머리)
    Replica,
}

/// 재정의 스택 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Forced(ForcedTarget),
    BindGroup(String),
    /// 아래 프레임을 가리는 초기화 경계
    Reset,
}

#[derive(Debug, Default)]
struct ContextState {
    /// 마지막 쓰기 시각
    sticky_since: Option<Instant>,
    /// 가드마다 하나씩 쌓이는 재정의 프레임 (프레임 id, 프레임)
    frames: Vec<(u64, Frame)>,
    next_frame: u64,
}

impl ContextState {
    /// 가장 가까운 초기화 경계 위의 프레임 (최근 것부터)
    fn visible(&self) -> impl Iterator<Item = &Frame> {
        self.frames
            .iter()
            .rev()
            .map(|(_, frame)| frame)
            .take_while(|frame| !matches!(frame, Frame::Reset))
    }

    fn forced(&self) -> Option<ForcedTarget> {
        self.visible().find_map(|frame| match frame {
            Frame::Forced(target) => Some(*target),
            _ => None,
        })
    }

    fn bind_group(&self) -> Option<&str> {
        self.visible().find_map(|frame| match frame {
            Frame::BindGroup(name) => Some(name.as_str()),
            _ => None,
        })
    }

    fn push(&mut self, frame: Frame) -> u64 {
        let id = self.next_frame;
        self.next_frame += 1;
        self.frames.push((id, frame));
        id
    }

    /// 해당 프레임만 제거 (해제 순서와 무관)
    fn remove(&mut self, id: u64) {
        if let Some(pos) = self.frames.iter().rposition(|(frame_id, _)| *frame_id == id) {
            self.frames.remove(pos);
        }
    }
}

// ============================================================================
// RoutingContext - 라우팅 컨텍스트
// ============================================================================

/// 작업 단위별 라우팅 컨텍스트
pub struct RoutingContext {
    /// 작업 단위 식별자
    unit_id: u64,
    state: Mutex<ContextState>,
}

impl RoutingContext {
    /// 새 작업 단위 컨텍스트 생성
    pub fn new() -> Self {
        Self {
            unit_id: NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(ContextState::default()),
        }
    }

    /// 작업 단위 식별자
    pub fn unit_id(&self) -> u64 {
        self.unit_id
    }

    /// 현재 일관성 상태
    pub fn state(&self) -> ConsistencyState {
        if self.state.lock().sticky_since.is_some() {
            ConsistencyState::Sticky
        } else {
            ConsistencyState::Init
        }
    }

    /// Sticky 여부
    pub fn is_sticky(&self) -> bool {
        self.state() == ConsistencyState::Sticky
    }

    /// 주어진 창(window) 안에서 Sticky 인지 확인
    ///
    /// `window`가 `None`이면 작업 단위가 끝날 때까지 Sticky 가 유지됩니다.
    pub fn is_sticky_within(&self, window: Option<Duration>) -> bool {
        match (self.state.lock().sticky_since, window) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(since), Some(window)) => since.elapsed() < window,
        }
    }

    /// 마지막 쓰기 시각
    pub fn sticky_since(&self) -> Option<Instant> {
        self.state.lock().sticky_since
    }

    /// 쓰기 발생 기록 (Init → Sticky)
    pub fn mark_sticky(&self) {
        self.state.lock().sticky_since = Some(Instant::now());
    }

    /// Sticky 해제 및 모든 재정의 제거 (Sticky → Init)
    ///
    /// 아직 살아있는 가드는 drop 될 때 아무것도 하지 않습니다.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.sticky_since = None;
        state.frames.clear();
    }

    /// 활성화된 대상 강제
    pub fn forced_target(&self) -> Option<ForcedTarget> {
        self.state.lock().forced()
    }

    /// 활성화된 바인드 그룹 재정의
    pub fn bind_group_override(&self) -> Option<String> {
        self.state.lock().bind_group().map(str::to_string)
    }

    /// 프라이머리 강제
    ///
    /// 반환된 가드가 drop 되면 해당 재정의만 제거됩니다. 가드들이 생성
    /// 역순이 아닌 순서로 drop 되어도 남은 가드의 재정의가 유지됩니다.
    pub fn force_primary(&self) -> OverrideGuard<'_> {
        let frame = self.state.lock().push(Frame::Forced(ForcedTarget::Primary));
        OverrideGuard {
            context: self,
            frame,
        }
    }

    /// 레플리카 강제
    ///
    /// 프라이머리 강제 범위 안에서는 허용되지 않습니다.
    pub fn force_replica(&self) -> RouterResult<OverrideGuard<'_>> {
        let mut state = self.state.lock();
        if state.forced() == Some(ForcedTarget::Primary) {
            return Err(RouterError::routing_context(
                "Cannot force replica inside a force-primary scope",
            ));
        }

        let frame = state.push(Frame::Forced(ForcedTarget::Replica));
        Ok(OverrideGuard {
            context: self,
            frame,
        })
    }

    /// 바인드 그룹 강제
    ///
    /// 그룹 이름의 존재 여부는 호출자(`Router`, 세션)가 먼저 확인합니다.
    pub(crate) fn force_bind_group(&self, name: &str) -> RouterResult<OverrideGuard<'_>> {
        let mut state = self.state.lock();
        if let Some(active) = state.bind_group() {
            if active != name {
                return Err(RouterError::routing_context(format!(
                    "Bind group '{}' is already forced in this scope; cannot force '{}'",
                    active, name
                )));
            }
        }

        let frame = state.push(Frame::BindGroup(name.to_string()));
        Ok(OverrideGuard {
            context: self,
            frame,
        })
    }

    /// 범위 한정 초기화
    ///
    /// 가드가 살아있는 동안 Sticky 와 그 이전의 재정의가 모두 가려집니다.
    /// 가드가 drop 되면 재정의가 다시 보이고, Sticky 는 이전 상태와 범위
    /// 안에서의 쓰기 중 더 최근 것으로 설정됩니다.
    pub fn scoped_reset(&self) -> ResetGuard<'_> {
        let mut state = self.state.lock();
        let previous_sticky = state.sticky_since.take();
        let frame = state.push(Frame::Reset);

        ResetGuard {
            context: self,
            frame,
            previous_sticky,
        }
    }

    fn release(&self, frame: u64) {
        self.state.lock().remove(frame);
    }
}

impl Default for RoutingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RoutingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RoutingContext")
            .field("unit_id", &self.unit_id)
            .field("sticky", &state.sticky_since.is_some())
            .field("forced", &state.forced())
            .field("bind_group", &state.bind_group())
            .finish()
    }
}

// ============================================================================
// Guards - 범위 가드
// ============================================================================

/// 재정의 가드
///
/// drop 시 자신이 추가한 재정의를 제거합니다. 에러(`?`)나 panic 으로 범위를
/// 벗어나는 경우도 포함됩니다.
#[must_use = "the override is released as soon as the guard is dropped"]
pub struct OverrideGuard<'a> {
    context: &'a RoutingContext,
    frame: u64,
}

impl OverrideGuard<'_> {
    /// 가드가 속한 컨텍스트
    pub fn context(&self) -> &RoutingContext {
        self.context
    }
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        self.context.release(self.frame);
    }
}

impl fmt::Debug for OverrideGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideGuard")
            .field("unit_id", &self.context.unit_id)
            .field("frame", &self.frame)
            .finish()
    }
}

/// 범위 한정 초기화 가드
#[must_use = "the reset is undone as soon as the guard is dropped"]
pub struct ResetGuard<'a> {
    context: &'a RoutingContext,
    frame: u64,
    previous_sticky: Option<Instant>,
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.context.state.lock();
        // 범위 안에서 쓴 기록은 잃지 않음
        state.sticky_since = state.sticky_since.max(self.previous_sticky);
        state.remove(self.frame);
    }
}

impl fmt::Debug for ResetGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetGuard")
            .field("unit_id", &self.context.unit_id)
            .field("frame", &self.frame)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
