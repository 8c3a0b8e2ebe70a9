//! 命令邮箱模块
//!
//! RPC 工作线程通过 [`CommandChannel`] 把意图交给控制线程，不触碰硬件、不阻塞在 I/O 上。
//!
//! **语义**：
//! - 按 `(单元, 操作名)` 为键的 FIFO 队列
//! - 同一键在被取走之前再次入队：原地覆盖参数，保留原来的排队位置（后写者胜）
//! - `drain()` 在一次加锁内取走全部条目，每个条目恰好被一次 drain 观察到
//! - 取走但结果尚未出现在已发布快照中的键记为"在途"，
//!   `is_pending()` 对排队中和在途的键都返回 true，直到控制线程调用 `settle()`

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

/// 可入队的命令
///
/// `name()` 是合并键的一部分：同一单元上同名的命令会被合并。
pub trait Command: Clone + Debug + Send + 'static {
    fn name(&self) -> &'static str;
}

/// 队列条目：目标单元 + 命令
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<C> {
    pub unit: String,
    pub command: C,
}

/// 入队结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// 新条目追加到队尾
    New,
    /// 覆盖了尚未取走的同名条目
    Coalesced,
}

type Key = (String, &'static str);

struct Slots<C> {
    queue: Vec<Envelope<C>>,
    in_flight: HashSet<Key>,
}

/// 门控期间（持锁）对某个单元 pending 状态的只读视图
pub struct PendingView<'a, C> {
    slots: &'a Slots<C>,
    unit: &'a str,
    operation: &'static str,
}

impl<C: Command> PendingView<'_, C> {
    /// 正在入队的这条命令的键是否 pending
    pub fn this(&self) -> bool {
        CommandChannel::pending_in(self.slots, self.unit, self.operation)
    }

    /// 同一单元上另一操作是否 pending
    pub fn operation(&self, operation: &str) -> bool {
        CommandChannel::pending_in(self.slots, self.unit, operation)
    }
}

/// 命令邮箱
pub struct CommandChannel<C> {
    slots: Mutex<Slots<C>>,
    /// 已发出的检查请求序号（单调递增）
    check_requests: AtomicU64,
    /// 控制线程最近一次受理到的请求序号
    checks_taken: AtomicU64,
}

impl<C: Command> CommandChannel<C> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                queue: Vec::new(),
                in_flight: HashSet::new(),
            }),
            check_requests: AtomicU64::new(0),
            checks_taken: AtomicU64::new(0),
        }
    }

    /// 入队（任意线程，不阻塞在硬件上）
    pub fn enqueue(&self, unit: &str, command: C) -> Enqueued {
        let mut slots = self.slots.lock();
        Self::push(&mut slots.queue, unit, command)
    }

    /// 带门控的入队
    ///
    /// `gate` 在持锁状态下执行，通过 [`PendingView`] 查看该单元的 pending 状态，
    /// 返回 `Ok` 才入队。检查与入队之间不会插入 `drain`/`settle`，
    /// 两个并发调用不可能同时通过"未 pending"的检查。
    ///
    /// `gate` 只应读取快照，不得回调本通道（锁不可重入）。
    pub fn enqueue_gated<E>(
        &self,
        unit: &str,
        command: C,
        gate: impl FnOnce(&PendingView<'_, C>) -> Result<(), E>,
    ) -> Result<Enqueued, E> {
        let mut slots = self.slots.lock();
        gate(&PendingView {
            slots: &slots,
            unit,
            operation: command.name(),
        })?;
        Ok(Self::push(&mut slots.queue, unit, command))
    }

    /// 取走全部排队条目（仅控制线程调用）
    pub fn drain(&self) -> Vec<Envelope<C>> {
        let mut slots = self.slots.lock();
        let drained = std::mem::take(&mut slots.queue);
        for envelope in &drained {
            slots
                .in_flight
                .insert((envelope.unit.clone(), envelope.command.name()));
        }
        drained
    }

    /// 该键是否排队中或在途
    pub fn is_pending(&self, unit: &str, operation: &str) -> bool {
        Self::pending_in(&self.slots.lock(), unit, operation)
    }

    /// 清空在途集合（控制线程在发布快照之后调用）
    pub fn settle(&self) {
        self.slots.lock().in_flight.clear();
    }

    /// 在邮箱锁内执行 `publish` 并清空在途集合
    ///
    /// 门控入队也持有同一把锁读取快照，所以不会出现
    /// "新快照已可见、但对应的键仍报告 pending"的窗口。
    pub fn settle_with(&self, publish: impl FnOnce()) {
        let mut slots = self.slots.lock();
        publish();
        slots.in_flight.clear();
    }

    /// 排队中的条目数
    pub fn len(&self) -> usize {
        self.slots.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 请求立即检查硬件，返回本次请求的序号
    ///
    /// 在此之后开始的检查发布的快照 `check_ticket` 不小于该序号。
    pub fn request_check(&self) -> u64 {
        self.check_requests.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// 受理所有未处理的检查请求（仅控制线程调用）
    ///
    /// 有新请求时返回其中最大的序号。
    pub fn take_check_request(&self) -> Option<u64> {
        let requested = self.check_requests.load(Ordering::Acquire);
        let taken = self.checks_taken.swap(requested, Ordering::AcqRel);
        (requested > taken).then_some(requested)
    }

    /// 已受理的最大请求序号
    pub fn checks_taken(&self) -> u64 {
        self.checks_taken.load(Ordering::Acquire)
    }

    fn pending_in(slots: &Slots<C>, unit: &str, operation: &str) -> bool {
        slots
            .queue
            .iter()
            .any(|e| e.unit == unit && e.command.name() == operation)
            || slots
                .in_flight
                .iter()
                .any(|(u, op)| u == unit && *op == operation)
    }

    fn push(queue: &mut Vec<Envelope<C>>, unit: &str, command: C) -> Enqueued {
        let name = command.name();
        if let Some(existing) = queue
            .iter_mut()
            .find(|e| e.unit == unit && e.command.name() == name)
        {
            existing.command = command;
            return Enqueued::Coalesced;
        }
        queue.push(Envelope {
            unit: unit.to_string(),
            command,
        });
        Enqueued::New
    }
}

impl<C: Command> Default for CommandChannel<C> {
    fn default() -> Self {
        Self::new()
    }
}
