//! # RAC Protocol
//!
//! RAC（Register Access Control）寄存器协议定义（无硬件依赖）
//!
//! 主机与下位机约定一张「寄存器 → 值类型」表，每次传输由 1 字节寄存器 ID
//! 加上该类型固定宽度的值组成，可选地用起止字节包裹成帧。
//!
//! ## 模块
//!
//! - `types`: 值类型、运行时值与字节序
//! - `message`: 寄存器/值对与消息
//! - `registers`: 寄存器类型表与名称映射
//! - `codec`: 编解码器（帧/非帧两种模式）
//!
//! ## 线格式
//!
//! ```text
//! 非帧模式: [register_id:1][value:N]
//! 帧模式:   0xFF ([register_id:1][value:N])* 0xFE
//! ```
//!
//! ## 字节序
//!
//! 默认小端字节序（与 AVR/ARM 下位机一致），由 [`ByteOrder`] 配置，不做自动探测。

pub mod codec;
pub mod message;
pub mod registers;
pub mod types;

// 重新导出常用类型
pub use codec::{CodecConfig, FRAME_END, FRAME_START, RacCodec};
pub use message::{Message, PairBuffer, RegisterValue};
pub use registers::{RegisterDef, RegisterMap, RegisterTypeTable};
pub use types::{ByteOrder, RegisterId, Value, ValueType};

use thiserror::Error;

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// 寄存器不在类型表中
    #[error("Unknown register: 0x{id:02X}")]
    UnknownRegister { id: RegisterId },

    /// 字节源在消息结束前耗尽
    #[error("Truncated message: needed {needed} bytes, received {received}")]
    Truncated { needed: usize, received: usize },

    /// 值的运行时类型与类型表不一致
    #[error("Type mismatch for register 0x{id:02X}: expected {expected}, got {actual}")]
    TypeMismatch {
        id: RegisterId,
        expected: ValueType,
        actual: ValueType,
    },

    /// 寄存器 ID 重复
    #[error("Duplicate register id: 0x{id:02X}")]
    DuplicateRegister { id: RegisterId },

    /// 寄存器名称重复
    #[error("Duplicate register name: {name}")]
    DuplicateName { name: String },

    /// 寄存器名称未定义
    #[error("Unknown register name: {name}")]
    UnknownRegisterName { name: String },

    /// 帧模式下寄存器 ID 与起止字节冲突
    #[error("Register id 0x{id:02X} collides with a frame marker")]
    ReservedRegister { id: RegisterId },

    /// 无法解析的值
    #[error("Invalid {value_type} value: {input:?}")]
    InvalidValue { value_type: ValueType, input: String },

    /// 赋值表达式缺少 `=`
    #[error("Invalid assignment {input:?}, expected name=value")]
    InvalidAssignment { input: String },

    /// 未知的值类型编号
    #[error("Invalid value type code: {code}")]
    InvalidValueType { code: u8 },

    /// 未知的值类型名称
    #[error("Unknown value type: {name:?}")]
    UnknownValueType { name: String },
}

/// 解码错误
///
/// 区分协议层错误（字节流内容不合法）与字节源本身的 IO 错误。
/// 后者在执行器中视为链路故障。
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Byte source error: {0}")]
    Source(#[from] std::io::Error),
}

impl DecodeError {
    /// 是否为协议层错误（字节流失步，而非链路故障）
    pub fn is_protocol(&self) -> bool {
        matches!(self, DecodeError::Protocol(_))
    }
}
