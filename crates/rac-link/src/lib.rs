//! # RAC Link Layer
//!
//! 字节链路抽象层，为执行器提供统一的点对点字节流接口。
//!
//! - [`Link`]: 链路 trait（打开/关闭、可读字节数、`Read` + `Write`）
//! - [`SerialLink`]: 基于 `serialport` 的串口实现（`serial` feature）
//! - [`MockLink`]: 内存链路（`mock` feature），用于无硬件测试

use std::io::{Read, Write};
use thiserror::Error;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(feature = "serial")]
pub use serial::{SerialLink, available_ports};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockLink, MockLinkHandle};

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    /// 打开链路失败（端口不存在、权限不足、被占用等）
    #[error("Failed to open link {port}: {reason}")]
    Open { port: String, reason: String },

    /// 会话期间的 IO 错误
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 链路未打开
    #[error("Link not open")]
    NotOpen,
}

impl LinkError {
    pub fn open(port: impl Into<String>, reason: impl ToString) -> Self {
        LinkError::Open {
            port: port.into(),
            reason: reason.to_string(),
        }
    }
}

/// 点对点字节链路
///
/// # 约定
///
/// - `read` 在配置的读超时内无数据时返回 `ErrorKind::TimedOut`，不会无限阻塞
/// - `write`/`flush` 在链路断开时返回错误，执行器据此停止
/// - 链路未打开时读写返回 `ErrorKind::NotConnected`
///
/// 实现者不需要内部同步，执行器通过一把互斥锁串行化所有访问。
pub trait Link: Read + Write + Send {
    /// 打开链路
    fn open(&mut self) -> Result<(), LinkError>;

    /// 关闭链路（幂等）
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// 当前可立即读取的字节数
    fn bytes_available(&mut self) -> Result<usize, LinkError>;

    /// 链路标识（端口名等，用于日志）
    fn name(&self) -> &str;
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn open(&mut self) -> Result<(), LinkError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        (**self).bytes_available()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

pub(crate) fn not_connected() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotConnected, "link not open")
}
