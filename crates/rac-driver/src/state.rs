//! 执行器生命周期状态
//!
//! 状态只向前推进：`Idle → Running → Stopping → Stopped`，
//! 或在启动前直接 `Idle → Stopped`。打开链路失败时保持 `Idle`，允许重试。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

/// 执行器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ExecutorState {
    /// 已构造，尚未启动（默认）
    #[default]
    Idle = 0,

    /// 接收/发送线程运行中
    Running = 1,

    /// 已请求停止，线程尚未全部退出
    Stopping = 2,

    /// 线程已退出，链路已关闭
    Stopped = 3,
}

impl ExecutorState {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Stopped。
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否已进入停止流程（Stopping 或 Stopped）
    pub fn is_shutting_down(self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }
}

/// 执行器状态（原子版本，用于线程间共享）
#[derive(Debug)]
pub struct AtomicExecutorState {
    inner: AtomicU8,
}

impl AtomicExecutorState {
    pub fn new(state: ExecutorState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> ExecutorState {
        ExecutorState::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, state: ExecutorState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }

    /// 比较并交换
    ///
    /// 如果当前值等于 `current`，则设置为 `new` 并返回 true。
    pub fn compare_exchange(
        &self,
        current: ExecutorState,
        new: ExecutorState,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current.as_u8(), new.as_u8(), success, failure)
            .is_ok()
    }

    /// 仅当状态尚未达到 `target` 时推进到 `target`
    ///
    /// 返回推进前的状态。
    pub fn advance_to(&self, target: ExecutorState) -> ExecutorState {
        let previous = self
            .inner
            .fetch_max(target.as_u8(), Ordering::AcqRel);
        ExecutorState::from_u8(previous)
    }
}

impl Default for AtomicExecutorState {
    fn default() -> Self {
        Self::new(ExecutorState::Idle)
    }
}

/// 故障发生位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOrigin {
    /// `start()` 打开链路失败
    Open,
    /// 接收线程（链路读错误或非帧模式下的失步）
    Receive,
    /// 发送线程（链路写错误）
    Transmit,
}

impl fmt::Display for FaultOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultOrigin::Open => "open",
            FaultOrigin::Receive => "receive",
            FaultOrigin::Transmit => "transmit",
        };
        f.write_str(name)
    }
}

/// 最近一次链路故障
///
/// 链路故障不会以错误形式抛回调用方（线程内直接触发停止），
/// 通过 `ProtocolExecutor::last_fault()` 查询。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFault {
    pub origin: FaultOrigin,
    pub message: String,
    /// 故障发生时刻
    pub at: Instant,
}

impl LinkFault {
    pub fn new(origin: FaultOrigin, message: impl Into<String>) -> Self {
        Self {
            origin,
            message: message.into(),
            at: Instant::now(),
        }
    }
}

impl fmt::Display for LinkFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fault: {}", self.origin, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_conversions() {
        for state in [
            ExecutorState::Idle,
            ExecutorState::Running,
            ExecutorState::Stopping,
            ExecutorState::Stopped,
        ] {
            assert_eq!(ExecutorState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ExecutorState::from_u8(200), ExecutorState::Stopped); // 无效值
        assert!(!ExecutorState::Running.is_shutting_down());
        assert!(ExecutorState::Stopping.is_shutting_down());
    }

    #[test]
    fn test_compare_exchange() {
        let state = AtomicExecutorState::default();
        assert!(state.compare_exchange(
            ExecutorState::Idle,
            ExecutorState::Running,
            Ordering::AcqRel,
            Ordering::Acquire
        ));
        assert_eq!(state.get(Ordering::Acquire), ExecutorState::Running);

        // 期望 Idle，但实际是 Running
        assert!(!state.compare_exchange(
            ExecutorState::Idle,
            ExecutorState::Running,
            Ordering::AcqRel,
            Ordering::Acquire
        ));
    }

    #[test]
    fn test_advance_never_goes_backwards() {
        let state = AtomicExecutorState::new(ExecutorState::Stopped);
        assert_eq!(state.advance_to(ExecutorState::Stopping), ExecutorState::Stopped);
        assert_eq!(state.get(Ordering::Acquire), ExecutorState::Stopped);

        let state = AtomicExecutorState::new(ExecutorState::Running);
        assert_eq!(state.advance_to(ExecutorState::Stopping), ExecutorState::Running);
        assert_eq!(state.get(Ordering::Acquire), ExecutorState::Stopping);
    }

    #[test]
    fn test_fault_display() {
        let fault = LinkFault::new(FaultOrigin::Transmit, "Broken pipe");
        assert_eq!(format!("{}", fault), "transmit fault: Broken pipe");
    }
}
