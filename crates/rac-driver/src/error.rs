//! 驱动层错误类型定义

use rac_link::LinkError;
use rac_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 链路错误（打开失败、IO 错误）
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 协议错误（未知寄存器、类型不匹配）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 执行器已启动（或已停止，不可重启）
    #[error("Executor already started")]
    AlreadyStarted,

    /// 执行器已停止，邮箱不再接受消息
    #[error("Executor stopped")]
    Stopped,

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}
