//! 执行器性能指标
//!
//! 原子计数器，可在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 执行器实时指标
///
/// # 使用示例
///
/// ```rust
/// use rac_driver::LinkMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = LinkMetrics::new();
/// metrics.rx_messages.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.rx_messages, 1);
/// ```
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 交给入站回调的非空消息数
    pub rx_messages: AtomicU64,

    /// 入站寄存器/值对总数
    pub rx_pairs: AtomicU64,

    /// 帧模式下跳过的非 START 空闲字节数
    pub rx_idle_bytes: AtomicU64,

    /// 入站失步次数（帧内未知寄存器或截断）
    pub rx_desyncs: AtomicU64,

    /// 写入链路的消息数
    pub tx_messages: AtomicU64,

    /// 写入链路的字节数
    pub tx_bytes: AtomicU64,

    /// 邮箱覆盖次数
    ///
    /// 如果这个值快速增长，说明发送线程跟不上 `set_data` 的调用频率。
    pub tx_overwrites: AtomicU64,

    /// 链路错误次数
    pub link_errors: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_messages: self.rx_messages.load(Ordering::Relaxed),
            rx_pairs: self.rx_pairs.load(Ordering::Relaxed),
            rx_idle_bytes: self.rx_idle_bytes.load(Ordering::Relaxed),
            rx_desyncs: self.rx_desyncs.load(Ordering::Relaxed),
            tx_messages: self.tx_messages.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            tx_overwrites: self.tx_overwrites.load(Ordering::Relaxed),
            link_errors: self.link_errors.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照（不可变，用于读取）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rx_messages: u64,
    pub rx_pairs: u64,
    pub rx_idle_bytes: u64,
    pub rx_desyncs: u64,
    pub tx_messages: u64,
    pub tx_bytes: u64,
    pub tx_overwrites: u64,
    pub link_errors: u64,
}

impl MetricsSnapshot {
    /// 邮箱覆盖率（百分比）
    ///
    /// 被覆盖的消息占全部发布消息（已发送 + 被覆盖）的比例。无消息时返回 0.0。
    pub fn overwrite_rate(&self) -> f64 {
        let published = self.tx_messages + self.tx_overwrites;
        if published == 0 {
            return 0.0;
        }
        (self.tx_overwrites as f64 / published as f64) * 100.0
    }
}
