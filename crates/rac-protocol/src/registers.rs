//! 寄存器表
//!
//! - [`RegisterTypeTable`]: 寄存器 ID → 值类型（编解码必需）
//! - [`RegisterMap`]: 在类型表之上增加寄存器名称（桥接层使用）
//!
//! 两者都在构造完成后只读，由编解码器和执行器共享。

use crate::ProtocolError;
use crate::message::{Message, RegisterValue};
use crate::types::{RegisterId, Value, ValueType};
use std::collections::BTreeMap;
use std::fmt;

/// 寄存器类型表
///
/// 使用 256 项定长数组，按寄存器 ID 直接索引，查找为 O(1) 且无哈希开销。
/// 不在表中的寄存器在编解码时返回 `UnknownRegister`，不存在默认类型。
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterTypeTable {
    types: [Option<ValueType>; 256],
    len: usize,
}

impl RegisterTypeTable {
    /// 创建空表
    pub fn new() -> Self {
        Self {
            types: [None; 256],
            len: 0,
        }
    }

    /// 从 (ID, 类型) 列表构造
    ///
    /// # 错误
    /// - `ProtocolError::DuplicateRegister`: 同一 ID 出现多次
    ///
    /// # Example
    ///
    /// ```
    /// use rac_protocol::{RegisterTypeTable, ValueType};
    ///
    /// let table = RegisterTypeTable::from_entries([
    ///     (0, ValueType::UInt16),
    ///     (1, ValueType::Bool),
    /// ])
    /// .unwrap();
    /// assert_eq!(table.lookup(0).unwrap(), ValueType::UInt16);
    /// ```
    pub fn from_entries(
        entries: impl IntoIterator<Item = (RegisterId, ValueType)>,
    ) -> Result<Self, ProtocolError> {
        let mut table = Self::new();
        for (id, value_type) in entries {
            table.insert(id, value_type)?;
        }
        Ok(table)
    }

    /// 注册一个寄存器（仅在构造阶段使用）
    pub fn insert(&mut self, id: RegisterId, value_type: ValueType) -> Result<(), ProtocolError> {
        let slot = &mut self.types[id as usize];
        if slot.is_some() {
            return Err(ProtocolError::DuplicateRegister { id });
        }
        *slot = Some(value_type);
        self.len += 1;
        Ok(())
    }

    /// 查找寄存器类型
    ///
    /// # 错误
    /// - `ProtocolError::UnknownRegister`: 寄存器不在表中
    #[inline]
    pub fn lookup(&self, id: RegisterId) -> Result<ValueType, ProtocolError> {
        self.types[id as usize].ok_or(ProtocolError::UnknownRegister { id })
    }

    #[inline]
    pub fn get(&self, id: RegisterId) -> Option<ValueType> {
        self.types[id as usize]
    }

    #[inline]
    pub fn contains(&self, id: RegisterId) -> bool {
        self.types[id as usize].is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 按 ID 升序遍历
    pub fn iter(&self) -> impl Iterator<Item = (RegisterId, ValueType)> + '_ {
        self.types
            .iter()
            .enumerate()
            .filter_map(|(id, ty)| ty.map(|ty| (id as RegisterId, ty)))
    }
}

impl Default for RegisterTypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegisterTypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// 寄存器定义（名称、ID、类型）
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterDef {
    pub name: String,
    pub id: RegisterId,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub value_type: ValueType,
}

impl RegisterDef {
    pub fn new(name: impl Into<String>, id: RegisterId, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            id,
            value_type,
        }
    }
}

/// 带名称的寄存器映射
///
/// 在 [`RegisterTypeTable`] 之上维护名称 ⇄ ID 双向索引，
/// 用于把消息转换为以名称为键的结构（上报），或把名称/值对转换为消息（下发）。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<RegisterDef>"))]
pub struct RegisterMap {
    table: RegisterTypeTable,
    ids_by_name: BTreeMap<String, RegisterId>,
    names_by_id: BTreeMap<RegisterId, String>,
}

impl RegisterMap {
    /// 从寄存器定义列表构造
    ///
    /// # 错误
    /// - `ProtocolError::DuplicateRegister`: ID 重复
    /// - `ProtocolError::DuplicateName`: 名称重复
    pub fn from_defs(defs: impl IntoIterator<Item = RegisterDef>) -> Result<Self, ProtocolError> {
        let mut map = Self::default();
        for def in defs {
            if map.ids_by_name.contains_key(&def.name) {
                return Err(ProtocolError::DuplicateName { name: def.name });
            }
            map.table.insert(def.id, def.value_type)?;
            map.names_by_id.insert(def.id, def.name.clone());
            map.ids_by_name.insert(def.name, def.id);
        }
        Ok(map)
    }

    /// 类型表（供编解码器使用）
    pub fn table(&self) -> &RegisterTypeTable {
        &self.table
    }

    pub fn into_table(self) -> RegisterTypeTable {
        self.table
    }

    /// 按名称查找寄存器 ID
    pub fn id_of(&self, name: &str) -> Result<RegisterId, ProtocolError> {
        self.ids_by_name
            .get(name)
            .copied()
            .ok_or_else(|| ProtocolError::UnknownRegisterName {
                name: name.to_string(),
            })
    }

    pub fn name_of(&self, id: RegisterId) -> Option<&str> {
        self.names_by_id.get(&id).map(String::as_str)
    }

    /// 寄存器定义列表（按 ID 升序）
    pub fn defs(&self) -> Vec<RegisterDef> {
        self.table
            .iter()
            .filter_map(|(id, value_type)| {
                self.name_of(id).map(|name| RegisterDef::new(name, id, value_type))
            })
            .collect()
    }

    /// 把消息转换为以寄存器名称为键的映射
    ///
    /// 同一寄存器出现多次时保留最后一个值。
    pub fn to_named(&self, message: &Message) -> Result<BTreeMap<String, Value>, ProtocolError> {
        let mut named = BTreeMap::new();
        for pair in message {
            let name = self
                .name_of(pair.id)
                .ok_or(ProtocolError::UnknownRegister { id: pair.id })?;
            named.insert(name.to_string(), pair.value);
        }
        Ok(named)
    }

    /// 把名称/值对转换为消息（保持输入顺序）
    ///
    /// # 错误
    /// - `ProtocolError::UnknownRegisterName`: 名称未定义
    /// - `ProtocolError::TypeMismatch`: 值类型与寄存器类型不一致
    pub fn message_from_named<S: AsRef<str>>(
        &self,
        pairs: impl IntoIterator<Item = (S, Value)>,
    ) -> Result<Message, ProtocolError> {
        pairs
            .into_iter()
            .map(|(name, value)| {
                let id = self.id_of(name.as_ref())?;
                let expected = self.table.lookup(id)?;
                if value.value_type() != expected {
                    return Err(ProtocolError::TypeMismatch {
                        id,
                        expected,
                        actual: value.value_type(),
                    });
                }
                Ok(RegisterValue { id, value })
            })
            .collect()
    }

    /// 解析 `name=value` 形式的赋值
    ///
    /// 值按寄存器类型解析（见 [`Value::parse`]）。
    pub fn parse_assignment(&self, assignment: &str) -> Result<RegisterValue, ProtocolError> {
        let (name, text) =
            assignment
                .split_once('=')
                .ok_or_else(|| ProtocolError::InvalidAssignment {
                    input: assignment.to_string(),
                })?;
        let id = self.id_of(name.trim())?;
        let value = Value::parse(self.table.lookup(id)?, text)?;
        Ok(RegisterValue { id, value })
    }
}

impl TryFrom<Vec<RegisterDef>> for RegisterMap {
    type Error = ProtocolError;

    fn try_from(defs: Vec<RegisterDef>) -> Result<Self, Self::Error> {
        Self::from_defs(defs)
    }
}
