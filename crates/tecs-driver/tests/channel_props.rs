//! 命令邮箱属性测试
//!
//! 任意入队序列在一次 drain 后应满足：
//! - 每个 `(单元, 操作)` 恰好出现一次
//! - 顺序为各键首次入队的顺序
//! - 参数为该键最后一次入队的参数

use proptest::prelude::*;
use tecs_driver::{Command, CommandChannel};

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Move(i32),
    Temp(i32),
    Home,
}

impl Command for Op {
    fn name(&self) -> &'static str {
        match self {
            Op::Move(_) => "move",
            Op::Temp(_) => "temp",
            Op::Home => "home",
        }
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<i32>().prop_map(Op::Move),
        any::<i32>().prop_map(Op::Temp),
        Just(Op::Home),
    ]
}

proptest! {
    #[test]
    fn drain_matches_last_write_wins_model(
        ops in prop::collection::vec((0usize..3, op_strategy()), 0..64)
    ) {
        let units = ["ut1", "ut2", "ut3"];
        let channel = CommandChannel::new();

        // 模型：按首次出现排序的 (键, 最后的命令)
        let mut model: Vec<((&str, &'static str), Op)> = Vec::new();
        for (u, op) in &ops {
            let key = (units[*u], op.name());
            match model.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = op.clone(),
                None => model.push((key, op.clone())),
            }
            channel.enqueue(units[*u], op.clone());
        }

        let drained = channel.drain();
        prop_assert_eq!(drained.len(), model.len());
        for (envelope, ((unit, _), op)) in drained.iter().zip(&model) {
            prop_assert_eq!(envelope.unit.as_str(), *unit);
            prop_assert_eq!(&envelope.command, op);
        }

        // 在途直到 settle
        for ((unit, name), _) in &model {
            prop_assert!(channel.is_pending(unit, name));
        }
        channel.settle();
        prop_assert!(channel.drain().is_empty());
        for ((unit, name), _) in &model {
            prop_assert!(!channel.is_pending(unit, name));
        }
    }
}
