//! 编解码器属性测试
//!
//! 使用 proptest 验证任意合法消息的编解码往返一致性，
//! 以及帧模式下任意非 START 首字节都不会产生错误。

use proptest::prelude::*;
use rac_protocol::{
    ByteOrder, CodecConfig, FRAME_START, Message, RacCodec, RegisterId, RegisterTypeTable,
    RegisterValue, Value, ValueType,
};

/// 寄存器 i 的类型为 ValueType::ALL[i % 7]
fn table() -> RegisterTypeTable {
    RegisterTypeTable::from_entries(
        (0u8..64).map(|id| (id, ValueType::ALL[id as usize % ValueType::ALL.len()])),
    )
    .unwrap()
}

fn value_strategy(value_type: ValueType) -> BoxedStrategy<Value> {
    match value_type {
        ValueType::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        ValueType::Byte => any::<u8>().prop_map(Value::Byte).boxed(),
        ValueType::Int16 => any::<i16>().prop_map(Value::Int16).boxed(),
        // NaN 不满足自反相等，排除
        ValueType::Float32 => any::<f32>()
            .prop_filter("finite", |v| !v.is_nan())
            .prop_map(Value::Float32)
            .boxed(),
        ValueType::Int32 => any::<i32>().prop_map(Value::Int32).boxed(),
        ValueType::UInt16 => any::<u16>().prop_map(Value::UInt16).boxed(),
        ValueType::UInt32 => any::<u32>().prop_map(Value::UInt32).boxed(),
    }
}

fn pair_strategy() -> impl Strategy<Value = RegisterValue> {
    (0u8..64).prop_flat_map(|id: RegisterId| {
        let value_type = ValueType::ALL[id as usize % ValueType::ALL.len()];
        value_strategy(value_type).prop_map(move |value| RegisterValue { id, value })
    })
}

fn byte_order_strategy() -> impl Strategy<Value = ByteOrder> {
    prop_oneof![Just(ByteOrder::Little), Just(ByteOrder::Big)]
}

proptest! {
    #[test]
    fn prop_framed_roundtrip(
        pairs in prop::collection::vec(pair_strategy(), 0..16),
        byte_order in byte_order_strategy(),
    ) {
        let codec = RacCodec::new(
            table(),
            CodecConfig { input_framed: true, output_framed: true, byte_order },
        )
        .unwrap();
        let message: Message = pairs.into_iter().collect();
        let bytes = codec.encode(&message).unwrap();
        let mut src: &[u8] = &bytes;
        prop_assert_eq!(codec.decode(&mut src).unwrap(), message);
        prop_assert!(src.is_empty());
    }

    #[test]
    fn prop_unframed_roundtrip(pair in pair_strategy(), byte_order in byte_order_strategy()) {
        let codec = RacCodec::new(
            table(),
            CodecConfig { byte_order, ..Default::default() },
        )
        .unwrap();
        let message = Message::single(pair.id, pair.value);
        let bytes = codec.encode(&message).unwrap();
        prop_assert_eq!(bytes.len(), 1 + pair.value.value_type().width());
        let mut src: &[u8] = &bytes;
        prop_assert_eq!(codec.decode(&mut src).unwrap(), message);
    }

    #[test]
    fn prop_non_start_lead_is_idle(
        lead in any::<u8>().prop_filter("not START", |b| *b != FRAME_START),
        tail in prop::collection::vec(any::<u8>(), 0..8),
    ) {
        let codec = RacCodec::new(
            table(),
            CodecConfig { input_framed: true, ..Default::default() },
        )
        .unwrap();
        let mut bytes = vec![lead];
        bytes.extend(tail);
        let mut src: &[u8] = &bytes;
        let decoded = codec.decode(&mut src).unwrap();
        prop_assert!(decoded.is_empty());
        // 只消费了首字节
        prop_assert_eq!(src.len(), bytes.len() - 1);
    }
}
