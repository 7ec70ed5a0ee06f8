//! 消息类型定义
//!
//! 一条消息是有序的寄存器/值对序列。帧模式下一帧对应一条消息，
//! 非帧模式下每条消息只包含一个寄存器/值对。

use crate::types::{RegisterId, Value};
use smallvec::SmallVec;

/// 寄存器/值对
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterValue {
    pub id: RegisterId,
    pub value: Value,
}

impl RegisterValue {
    pub fn new(id: RegisterId, value: impl Into<Value>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

impl<V: Into<Value>> From<(RegisterId, V)> for RegisterValue {
    fn from((id, value): (RegisterId, V)) -> Self {
        Self::new(id, value)
    }
}

/// 寄存器/值对缓冲区
///
/// 栈上预留 8 个位置，覆盖典型的控制指令（两路驱动 + 使能 + 速率）
/// 和 IMU 反馈帧（6 轴），避免热路径上的堆分配。
pub type PairBuffer = SmallVec<[RegisterValue; 8]>;

/// RAC 消息（有序寄存器/值对序列）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pairs: PairBuffer,
}

impl Message {
    /// 创建空消息
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建单个寄存器/值对的消息
    pub fn single(id: RegisterId, value: impl Into<Value>) -> Self {
        let mut message = Self::new();
        message.push(id, value);
        message
    }

    /// 链式追加寄存器/值对
    pub fn with(mut self, id: RegisterId, value: impl Into<Value>) -> Self {
        self.push(id, value);
        self
    }

    /// 追加寄存器/值对
    pub fn push(&mut self, id: RegisterId, value: impl Into<Value>) {
        self.pairs.push(RegisterValue::new(id, value));
    }

    /// 按寄存器 ID 查找值（同一 ID 出现多次时返回最后一个）
    pub fn get(&self, id: RegisterId) -> Option<Value> {
        self.pairs.iter().rev().find(|pair| pair.id == id).map(|pair| pair.value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisterValue> {
        self.pairs.iter()
    }

    pub fn pairs(&self) -> &[RegisterValue] {
        &self.pairs
    }
}

impl FromIterator<RegisterValue> for Message {
    fn from_iter<I: IntoIterator<Item = RegisterValue>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

impl Extend<RegisterValue> for Message {
    fn extend<I: IntoIterator<Item = RegisterValue>>(&mut self, iter: I) {
        self.pairs.extend(iter);
    }
}

impl From<Vec<RegisterValue>> for Message {
    fn from(pairs: Vec<RegisterValue>) -> Self {
        pairs.into_iter().collect()
    }
}

impl IntoIterator for Message {
    type Item = RegisterValue;
    type IntoIter = smallvec::IntoIter<[RegisterValue; 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a RegisterValue;
    type IntoIter = std::slice::Iter<'a, RegisterValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}
