//! 值类型定义
//!
//! 每个寄存器绑定一个 [`ValueType`]，决定线上的字节宽度与编码方式。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

/// 寄存器 ID（单字节）
pub type RegisterId = u8;

/// 寄存器值类型
///
/// 数值编码与下位机约定一致（保留原始固件的类型编号 0-6）。
///
/// | 类型 | 宽度 | 说明 |
/// |------|------|------|
/// | Bool | 1 | 非零即 true |
/// | Byte | 1 | u8 |
/// | Int16 | 2 | i16 |
/// | Float32 | 4 | IEEE-754 单精度 |
/// | Int32 | 4 | i32 |
/// | UInt16 | 2 | u16 |
/// | UInt32 | 4 | u32 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase", try_from = "ValueTypeRepr"))]
#[repr(u8)]
pub enum ValueType {
    Bool = 0,
    Byte = 1,
    Int16 = 2,
    Float32 = 3,
    Int32 = 4,
    UInt16 = 5,
    UInt32 = 6,
}

impl ValueType {
    /// 所有值类型
    pub const ALL: [ValueType; 7] = [
        ValueType::Bool,
        ValueType::Byte,
        ValueType::Int16,
        ValueType::Float32,
        ValueType::Int32,
        ValueType::UInt16,
        ValueType::UInt32,
    ];

    /// 线上编码宽度（字节）
    pub const fn width(self) -> usize {
        match self {
            ValueType::Bool | ValueType::Byte => 1,
            ValueType::Int16 | ValueType::UInt16 => 2,
            ValueType::Float32 | ValueType::Int32 | ValueType::UInt32 => 4,
        }
    }

    /// 从类型编号转换
    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        Self::try_from(code).map_err(|_| ProtocolError::InvalidValueType { code })
    }

    /// 类型编号
    pub fn code(self) -> u8 {
        self.into()
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Byte => "byte",
            ValueType::Int16 => "int16",
            ValueType::Float32 => "float32",
            ValueType::Int32 => "int32",
            ValueType::UInt16 => "uint16",
            ValueType::UInt32 => "uint32",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 按名称解析，兼容固件头文件里的 C 风格别名（`int`、`float`、`long`、`uint`、`ulong`）
impl FromStr for ValueType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" => Ok(ValueType::Bool),
            "byte" => Ok(ValueType::Byte),
            "int16" | "int" => Ok(ValueType::Int16),
            "float32" | "float" => Ok(ValueType::Float32),
            "int32" | "long" => Ok(ValueType::Int32),
            "uint16" | "uint" => Ok(ValueType::UInt16),
            "uint32" | "ulong" => Ok(ValueType::UInt32),
            _ => Err(ProtocolError::UnknownValueType {
                name: s.to_string(),
            }),
        }
    }
}

/// 配置文件中的类型：名称或类型编号
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ValueTypeRepr {
    Code(u8),
    Name(String),
}

#[cfg(feature = "serde")]
impl TryFrom<ValueTypeRepr> for ValueType {
    type Error = ProtocolError;

    fn try_from(repr: ValueTypeRepr) -> Result<Self, Self::Error> {
        match repr {
            ValueTypeRepr::Code(code) => ValueType::from_code(code),
            ValueTypeRepr::Name(name) => name.parse(),
        }
    }
}

/// 多字节值的字节序
///
/// 与下位机约定的常量，不做自动探测。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ByteOrder {
    /// 小端（默认，AVR/ARM 下位机原生字节序）
    #[default]
    Little,
    /// 大端
    Big,
}

/// 寄存器运行时值
///
/// 每个变体对应一个 [`ValueType`]，编码前会与类型表比对。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    Int16(i16),
    Float32(f32),
    Int32(i32),
    UInt16(u16),
    UInt32(u32),
}

macro_rules! ordered_bytes {
    ($value:expr, $order:expr) => {
        match $order {
            ByteOrder::Little => $value.to_le_bytes(),
            ByteOrder::Big => $value.to_be_bytes(),
        }
    };
}

macro_rules! from_ordered_bytes {
    ($ty:ty, $bytes:expr, $order:expr) => {{
        let mut raw = [0u8; std::mem::size_of::<$ty>()];
        raw.copy_from_slice($bytes);
        match $order {
            ByteOrder::Little => <$ty>::from_le_bytes(raw),
            ByteOrder::Big => <$ty>::from_be_bytes(raw),
        }
    }};
}

impl Value {
    /// 值对应的类型
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Byte(_) => ValueType::Byte,
            Value::Int16(_) => ValueType::Int16,
            Value::Float32(_) => ValueType::Float32,
            Value::Int32(_) => ValueType::Int32,
            Value::UInt16(_) => ValueType::UInt16,
            Value::UInt32(_) => ValueType::UInt32,
        }
    }

    /// 按固定宽度追加编码结果
    pub fn write_to(&self, order: ByteOrder, out: &mut Vec<u8>) {
        match *self {
            Value::Bool(v) => out.push(u8::from(v)),
            Value::Byte(v) => out.push(v),
            Value::Int16(v) => out.extend_from_slice(&ordered_bytes!(v, order)),
            Value::Float32(v) => out.extend_from_slice(&ordered_bytes!(v, order)),
            Value::Int32(v) => out.extend_from_slice(&ordered_bytes!(v, order)),
            Value::UInt16(v) => out.extend_from_slice(&ordered_bytes!(v, order)),
            Value::UInt32(v) => out.extend_from_slice(&ordered_bytes!(v, order)),
        }
    }

    /// 从固定宽度字节解码
    ///
    /// `bytes` 长度必须等于 `value_type.width()`，否则返回 `Truncated`。
    pub fn read_from(
        value_type: ValueType,
        order: ByteOrder,
        bytes: &[u8],
    ) -> Result<Self, ProtocolError> {
        if bytes.len() != value_type.width() {
            return Err(ProtocolError::Truncated {
                needed: value_type.width(),
                received: bytes.len(),
            });
        }

        let value = match value_type {
            ValueType::Bool => Value::Bool(bytes[0] != 0),
            ValueType::Byte => Value::Byte(bytes[0]),
            ValueType::Int16 => Value::Int16(from_ordered_bytes!(i16, bytes, order)),
            ValueType::Float32 => Value::Float32(from_ordered_bytes!(f32, bytes, order)),
            ValueType::Int32 => Value::Int32(from_ordered_bytes!(i32, bytes, order)),
            ValueType::UInt16 => Value::UInt16(from_ordered_bytes!(u16, bytes, order)),
            ValueType::UInt32 => Value::UInt32(from_ordered_bytes!(u32, bytes, order)),
        };
        Ok(value)
    }

    /// 按类型解析文本值
    ///
    /// - Bool: `true/false/1/0/on/off`
    /// - 无符号整数: 十进制或 `0x` 前缀十六进制
    /// - 有符号整数、浮点: 十进制
    pub fn parse(value_type: ValueType, input: &str) -> Result<Self, ProtocolError> {
        let text = input.trim();
        let invalid = || ProtocolError::InvalidValue {
            value_type,
            input: input.to_string(),
        };

        match value_type {
            ValueType::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "off" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            ValueType::Byte => parse_unsigned(text)
                .and_then(|v| u8::try_from(v).ok())
                .map(Value::Byte)
                .ok_or_else(invalid),
            ValueType::UInt16 => parse_unsigned(text)
                .and_then(|v| u16::try_from(v).ok())
                .map(Value::UInt16)
                .ok_or_else(invalid),
            ValueType::UInt32 => parse_unsigned(text)
                .and_then(|v| u32::try_from(v).ok())
                .map(Value::UInt32)
                .ok_or_else(invalid),
            ValueType::Int16 => text.parse().map(Value::Int16).map_err(|_| invalid()),
            ValueType::Int32 => text.parse().map(Value::Int32).map_err(|_| invalid()),
            ValueType::Float32 => text.parse().map(Value::Float32).map_err(|_| invalid()),
        }
    }
}

fn parse_unsigned(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    u8 => Byte,
    i16 => Int16,
    f32 => Float32,
    i32 => Int32,
    u16 => UInt16,
    u32 => UInt32,
}

#[cfg(feature = "serde")]
impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Value::Bool(v) => serializer.serialize_bool(v),
            Value::Byte(v) => serializer.serialize_u8(v),
            Value::Int16(v) => serializer.serialize_i16(v),
            Value::Float32(v) => serializer.serialize_f32(v),
            Value::Int32(v) => serializer.serialize_i32(v),
            Value::UInt16(v) => serializer.serialize_u16(v),
            Value::UInt32(v) => serializer.serialize_u32(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_widths() {
        let widths: Vec<usize> = ValueType::ALL.iter().map(|t| t.width()).collect();
        assert_eq!(widths, vec![1, 1, 2, 4, 4, 2, 4]);
    }

    #[test]
    fn test_value_type_codes() {
        for ty in ValueType::ALL {
            assert_eq!(ValueType::from_code(ty.code()).unwrap(), ty);
        }
        assert!(matches!(
            ValueType::from_code(7),
            Err(ProtocolError::InvalidValueType { code: 7 })
        ));
    }

    #[test]
    fn test_value_type_from_str() {
        for ty in ValueType::ALL {
            assert_eq!(ty.name().parse::<ValueType>().unwrap(), ty);
        }
        assert_eq!("LONG".parse::<ValueType>().unwrap(), ValueType::Int32);
        assert_eq!("uint".parse::<ValueType>().unwrap(), ValueType::UInt16);
        assert!(matches!(
            "double".parse::<ValueType>(),
            Err(ProtocolError::UnknownValueType { .. })
        ));
    }

    #[test]
    fn test_uint16_little_endian_layout() {
        let mut out = Vec::new();
        Value::UInt16(500).write_to(ByteOrder::Little, &mut out);
        assert_eq!(out, vec![0xF4, 0x01]);

        out.clear();
        Value::UInt16(500).write_to(ByteOrder::Big, &mut out);
        assert_eq!(out, vec![0x01, 0xF4]);
    }

    #[test]
    fn test_negative_int16_layout() {
        let mut out = Vec::new();
        Value::Int16(-2).write_to(ByteOrder::Little, &mut out);
        assert_eq!(out, vec![0xFE, 0xFF]);
        let decoded = Value::read_from(ValueType::Int16, ByteOrder::Little, &out).unwrap();
        assert_eq!(decoded, Value::Int16(-2));
    }

    #[test]
    fn test_bool_nonzero_is_true() {
        let value = Value::read_from(ValueType::Bool, ByteOrder::Little, &[0x7F]).unwrap();
        assert_eq!(value, Value::Bool(true));
        let value = Value::read_from(ValueType::Bool, ByteOrder::Little, &[0x00]).unwrap();
        assert_eq!(value, Value::Bool(false));
    }

    #[test]
    fn test_read_from_wrong_width() {
        let result = Value::read_from(ValueType::UInt32, ByteOrder::Little, &[1, 2]);
        assert_eq!(
            result,
            Err(ProtocolError::Truncated {
                needed: 4,
                received: 2
            })
        );
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(Value::parse(ValueType::Bool, "on").unwrap(), Value::Bool(true));
        assert_eq!(Value::parse(ValueType::Bool, "0").unwrap(), Value::Bool(false));
        assert_eq!(Value::parse(ValueType::Byte, "0x1F").unwrap(), Value::Byte(0x1F));
        assert_eq!(
            Value::parse(ValueType::Int16, "-32768").unwrap(),
            Value::Int16(i16::MIN)
        );
        assert_eq!(
            Value::parse(ValueType::UInt32, "4294967295").unwrap(),
            Value::UInt32(u32::MAX)
        );
        assert_eq!(
            Value::parse(ValueType::Float32, " 1.5 ").unwrap(),
            Value::Float32(1.5)
        );
    }

    #[test]
    fn test_parse_out_of_range() {
        assert!(matches!(
            Value::parse(ValueType::Byte, "256"),
            Err(ProtocolError::InvalidValue {
                value_type: ValueType::Byte,
                ..
            })
        ));
        assert!(Value::parse(ValueType::Int16, "40000").is_err());
        assert!(Value::parse(ValueType::UInt16, "-1").is_err());
        assert!(Value::parse(ValueType::Bool, "maybe").is_err());
    }
}
