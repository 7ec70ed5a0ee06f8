//! RAC 编解码器
//!
//! 把寄存器/值对编码为字节序列，或从字节源解码出消息。
//!
//! # 帧模式
//!
//! - 非帧模式：每次解码读取 1 字节寄存器 ID + 定宽值，返回单对消息
//! - 帧模式：首字节不是 `FRAME_START` 时返回空消息（表示当前无帧，调用方继续轮询），
//!   否则持续读取寄存器/值对直到 `FRAME_END`
//!
//! 「首字节不是 START」与「帧内寄存器未知」是两种不同结果：前者是正常空闲字节，
//! 后者是字节流损坏。接收循环据此可以安全地轮询，同时不掩盖真正的失步。
//!
//! 编码是纯函数（无 IO），写链路由执行器负责。

use crate::message::{Message, RegisterValue};
use crate::registers::RegisterTypeTable;
use crate::types::{ByteOrder, RegisterId, Value};
use crate::{DecodeError, ProtocolError};
use std::io::{self, Read};

/// 帧起始字节
pub const FRAME_START: u8 = 0xFF;
/// 帧结束字节
pub const FRAME_END: u8 = 0xFE;

/// 单个值的最大编码宽度
const MAX_VALUE_WIDTH: usize = 4;

/// 编解码配置
///
/// 输入/输出的帧模式相互独立（下位机可能只在一个方向上使用起止字节）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CodecConfig {
    /// 接收方向是否期望起止字节
    pub input_framed: bool,
    /// 发送方向是否附加起止字节
    pub output_framed: bool,
    /// 多字节值的字节序
    pub byte_order: ByteOrder,
}

/// RAC 编解码器
///
/// 构造后只读，可在接收/发送线程间共享（`Arc<RacCodec>`）。
///
/// # Example
///
/// ```
/// use rac_protocol::{CodecConfig, Message, RacCodec, RegisterTypeTable, ValueType};
///
/// let table = RegisterTypeTable::from_entries([(0, ValueType::UInt16), (1, ValueType::Bool)])
///     .unwrap();
/// let codec = RacCodec::new(
///     table,
///     CodecConfig {
///         output_framed: true,
///         ..Default::default()
///     },
/// )
/// .unwrap();
///
/// let bytes = codec.encode(&Message::new().with(0, 500u16).with(1, true)).unwrap();
/// assert_eq!(bytes, [0xFF, 0x00, 0xF4, 0x01, 0x01, 0x01, 0xFE]);
/// ```
#[derive(Debug, Clone)]
pub struct RacCodec {
    table: RegisterTypeTable,
    config: CodecConfig,
}

impl RacCodec {
    /// 创建编解码器
    ///
    /// # 错误
    /// - `ProtocolError::ReservedRegister`: 任一方向启用帧模式时，类型表中存在
    ///   与 `FRAME_START`/`FRAME_END` 相同的寄存器 ID
    pub fn new(table: RegisterTypeTable, config: CodecConfig) -> Result<Self, ProtocolError> {
        if config.input_framed || config.output_framed {
            for id in [FRAME_START, FRAME_END] {
                if table.contains(id) {
                    return Err(ProtocolError::ReservedRegister { id });
                }
            }
        }
        Ok(Self { table, config })
    }

    pub fn table(&self) -> &RegisterTypeTable {
        &self.table
    }

    pub fn config(&self) -> CodecConfig {
        self.config
    }

    /// 按配置的输入帧模式解码一条消息
    pub fn decode<R: Read + ?Sized>(&self, src: &mut R) -> Result<Message, DecodeError> {
        self.decode_with(src, self.config.input_framed)
    }

    /// 解码一条消息
    ///
    /// # 返回
    /// - 空消息：字节源当前无数据，或帧模式下首字节不是 `FRAME_START`
    /// - 非空消息：解码成功
    ///
    /// # 错误
    /// - `ProtocolError::UnknownRegister`: 寄存器不在类型表中
    /// - `ProtocolError::Truncated`: 字节源在值或 `FRAME_END` 之前耗尽
    /// - `DecodeError::Source`: 字节源 IO 错误
    ///
    /// 读取 `Ok(0)`、`TimedOut`、`WouldBlock`、`UnexpectedEof` 均视为字节源耗尽，
    /// 不会用填充字节补齐。
    pub fn decode_with<R: Read + ?Sized>(
        &self,
        src: &mut R,
        framed: bool,
    ) -> Result<Message, DecodeError> {
        let mut lead = [0u8; 1];
        if fill(src, &mut lead)? == 0 {
            return Ok(Message::new());
        }

        if !framed {
            let pair = self.read_pair(src, lead[0])?;
            return Ok(std::iter::once(pair).collect());
        }

        if lead[0] != FRAME_START {
            return Ok(Message::new());
        }

        let mut message = Message::new();
        loop {
            let mut id = [0u8; 1];
            read_exact_or_truncated(src, &mut id)?;
            if id[0] == FRAME_END {
                return Ok(message);
            }
            message.extend(std::iter::once(self.read_pair(src, id[0])?));
        }
    }

    fn read_pair<R: Read + ?Sized>(
        &self,
        src: &mut R,
        id: RegisterId,
    ) -> Result<RegisterValue, DecodeError> {
        let value_type = self.table.lookup(id)?;
        let mut raw = [0u8; MAX_VALUE_WIDTH];
        let raw = &mut raw[..value_type.width()];
        read_exact_or_truncated(src, raw)?;
        let value = Value::read_from(value_type, self.config.byte_order, raw)?;
        Ok(RegisterValue { id, value })
    }

    /// 按配置的输出帧模式编码
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError> {
        self.encode_with(message, self.config.output_framed)
    }

    /// 编码一条消息
    ///
    /// # 错误
    /// - `ProtocolError::UnknownRegister`: 寄存器不在类型表中
    /// - `ProtocolError::TypeMismatch`: 值类型与类型表不一致
    pub fn encode_with(&self, message: &Message, framed: bool) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(self.encoded_len(message, framed)?);
        self.encode_into(message, framed, &mut out)?;
        Ok(out)
    }

    /// 追加编码结果到 `out`
    ///
    /// 出错时 `out` 保持调用前的内容（不会留下半条消息）。
    pub fn encode_into(
        &self,
        message: &Message,
        framed: bool,
        out: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let start_len = out.len();
        let result = self.encode_pairs(message, framed, out);
        if result.is_err() {
            out.truncate(start_len);
        }
        result
    }

    fn encode_pairs(
        &self,
        message: &Message,
        framed: bool,
        out: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        if framed {
            out.push(FRAME_START);
        }
        for pair in message {
            self.check_pair(pair)?;
            out.push(pair.id);
            pair.value.write_to(self.config.byte_order, out);
        }
        if framed {
            out.push(FRAME_END);
        }
        Ok(())
    }

    /// 校验消息中的每个寄存器都在类型表中且值类型一致
    pub fn validate(&self, message: &Message) -> Result<(), ProtocolError> {
        message.iter().try_for_each(|pair| self.check_pair(pair))
    }

    /// 编码后的字节数
    pub fn encoded_len(&self, message: &Message, framed: bool) -> Result<usize, ProtocolError> {
        let markers = if framed { 2 } else { 0 };
        message.iter().try_fold(markers, |len, pair| {
            let value_type = self.table.lookup(pair.id)?;
            Ok(len + 1 + value_type.width())
        })
    }

    fn check_pair(&self, pair: &RegisterValue) -> Result<(), ProtocolError> {
        let expected = self.table.lookup(pair.id)?;
        let actual = pair.value.value_type();
        if expected != actual {
            return Err(ProtocolError::TypeMismatch {
                id: pair.id,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// 尽量填满 `buf`，返回实际读取字节数（字节源耗尽时可能小于 `buf.len()`）
fn fill<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_exhausted(&e) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_exact_or_truncated<R: Read + ?Sized>(
    src: &mut R,
    buf: &mut [u8],
) -> Result<(), DecodeError> {
    let received = fill(src, buf)?;
    if received < buf.len() {
        return Err(ProtocolError::Truncated {
            needed: buf.len(),
            received,
        }
        .into());
    }
    Ok(())
}

fn is_exhausted(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::UnexpectedEof
    )
}
