// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::error;

use crate::domain::events::{DomainEvent, EventKind};

/// 事件处理器
///
/// 处理器不得无限阻塞；长耗时工作应转发到有界队列
pub type EventHandler =
    Arc<dyn Fn(DomainEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// 订阅句柄
///
/// 传回 `unsubscribe` 以移除对应处理器
#[derive(Debug)]
pub struct SubscriptionHandle {
    kind: EventKind,
    id: u64,
}

/// 进程级事件总线
///
/// 按事件种类维护订阅表。发布时按订阅顺序依次调用处理器，
/// 单个处理器失败被捕获并记录，不影响其余处理器。
/// 订阅表锁仅在订阅/退订时持有，从不跨越分发过程。
pub struct EventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<(u64, EventHandler)>>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// 创建空的事件总线
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 订阅指定种类的事件
    ///
    /// # 参数
    ///
    /// * `kind` - 事件种类
    /// * `handler` - 事件处理器
    ///
    /// # 返回值
    ///
    /// 返回可用于退订的句柄
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut table = self.subscribers.write().expect("subscriber table poisoned");
        table.entry(kind).or_default().push((id, handler));
        SubscriptionHandle { kind, id }
    }

    /// 订阅全部事件种类
    pub fn subscribe_all(&self, handler: EventHandler) -> Vec<SubscriptionHandle> {
        EventKind::ALL
            .iter()
            .map(|kind| self.subscribe(*kind, handler.clone()))
            .collect()
    }

    /// 退订
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut table = self.subscribers.write().expect("subscriber table poisoned");
        if let Some(handlers) = table.get_mut(&handle.kind) {
            handlers.retain(|(id, _)| *id != handle.id);
        }
    }

    /// 发布事件
    ///
    /// 按订阅顺序依次调用当前注册的处理器。处理器在锁外执行。
    pub async fn publish(&self, event: DomainEvent) {
        let handlers: Vec<EventHandler> = {
            let table = self.subscribers.read().expect("subscriber table poisoned");
            match table.get(&event.kind()) {
                Some(entries) => entries.iter().map(|(_, h)| h.clone()).collect(),
                None => return,
            }
        };

        let kind = event.kind();
        for handler in handlers {
            if let Err(e) = handler(event.clone()).await {
                error!(event_kind = %kind, error = %e, "event handler failed");
            }
        }
    }

    /// 指定种类的订阅数量
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .expect("subscriber table poisoned")
            .get(&kind)
            .map_or(0, |v| v.len())
    }
}
