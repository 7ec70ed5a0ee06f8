//! 出站邮箱（单槽，覆盖语义）
//!
//! 最多保存一条待发送消息：
//! - 非阻塞发布覆盖尚未被取走的旧消息（控制回路只关心最新设定值）
//! - 阻塞发布先等待旧消息被发送线程取走（背压，至多一条未消费写入）
//!
//! 邮箱有自己的锁，与链路锁分离：慢速写链路不会阻塞 `set_data` 调用方和接收线程。

use crate::error::DriverError;
use parking_lot::{Condvar, Mutex};
use rac_protocol::Message;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Slot {
    pending: Option<Message>,
    closed: bool,
}

/// 单槽邮箱
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Slot>,
    /// 槽位变化（放入、取走、关闭）时通知所有等待者
    changed: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布消息
    ///
    /// # 返回
    /// - `Ok(true)`: 覆盖了一条未被取走的消息
    /// - `Ok(false)`: 槽位原本为空
    ///
    /// # 错误
    /// - `DriverError::Stopped`: 邮箱已关闭（包括阻塞等待期间被关闭）
    pub fn publish(&self, message: Message, block: bool) -> Result<bool, DriverError> {
        let mut slot = self.slot.lock();
        if block {
            while slot.pending.is_some() && !slot.closed {
                self.changed.wait(&mut slot);
            }
        }
        self.put(&mut slot, message)
    }

    /// 阻塞发布，最多等待 `timeout`
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时仍有未取走的消息（新消息被丢弃）
    /// - `DriverError::Stopped`: 邮箱已关闭
    pub fn publish_timeout(&self, message: Message, timeout: Duration) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while slot.pending.is_some() && !slot.closed {
            if self.changed.wait_until(&mut slot, deadline).timed_out()
                && slot.pending.is_some()
                && !slot.closed
            {
                return Err(DriverError::Timeout);
            }
        }
        self.put(&mut slot, message).map(|_| ())
    }

    fn put(&self, slot: &mut Slot, message: Message) -> Result<bool, DriverError> {
        if slot.closed {
            return Err(DriverError::Stopped);
        }
        let overwritten = slot.pending.replace(message).is_some();
        self.changed.notify_all();
        Ok(overwritten)
    }

    /// 取出待发送消息（发送线程调用）
    ///
    /// 阻塞直到有消息或邮箱关闭。关闭后返回 `None`，不再交出残留消息。
    pub fn take(&self) -> Option<Message> {
        let mut slot = self.slot.lock();
        loop {
            if slot.closed {
                return None;
            }
            if let Some(message) = slot.pending.take() {
                // 唤醒阻塞的发布者
                self.changed.notify_all();
                return Some(message);
            }
            self.changed.wait(&mut slot);
        }
    }

    /// 关闭邮箱，唤醒所有等待者（幂等）
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        slot.pending = None;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// 是否有未被取走的消息
    pub fn has_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }
}
