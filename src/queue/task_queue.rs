// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::models::ids::TaskId;

/// 内存任务队列
///
/// 并发安全的待处理任务标识符FIFO队列。
/// 队列只携带标识符，不携带实体；工作器在独立的工作单元中
/// 按标识符加载任务实体。
pub struct TaskQueue {
    inner: Mutex<VecDeque<TaskId>>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    /// 创建空队列
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// 入队单个任务ID
    pub fn enqueue(&self, id: TaskId) {
        self.inner.lock().expect("task queue poisoned").push_back(id);
    }

    /// 批量入队任务ID
    pub fn enqueue_all(&self, ids: Vec<TaskId>) {
        let mut queue = self.inner.lock().expect("task queue poisoned");
        for id in ids {
            queue.push_back(id);
        }
    }

    /// 出队下一个任务ID
    ///
    /// # 返回值
    ///
    /// * `Some(TaskId)` - FIFO顺序的下一个任务
    /// * `None` - 队列为空
    pub fn dequeue(&self) -> Option<TaskId> {
        self.inner.lock().expect("task queue poisoned").pop_front()
    }

    /// 剩余任务数
    pub fn remaining(&self) -> usize {
        self.inner.lock().expect("task queue poisoned").len()
    }

    /// 清空队列
    ///
    /// # 返回值
    ///
    /// 返回被丢弃的任务数
    pub fn drain(&self) -> usize {
        let mut queue = self.inner.lock().expect("task queue poisoned");
        let dropped = queue.len();
        queue.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = TaskQueue::new();
        let first = TaskId::new();
        let second = TaskId::new();

        queue.enqueue_all(vec![first.clone(), second.clone()]);
        assert_eq!(queue.remaining(), 2);

        assert_eq!(queue.dequeue(), Some(first));
        assert_eq!(queue.dequeue(), Some(second));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_reenqueued_retry_goes_to_the_back() {
        let queue = TaskQueue::new();
        let retry = TaskId::new();
        let fresh = TaskId::new();

        queue.enqueue(fresh.clone());
        queue.enqueue(retry.clone());

        // 重试任务不享有优先级
        assert_eq!(queue.dequeue(), Some(fresh));
        assert_eq!(queue.dequeue(), Some(retry));
    }

    #[test]
    fn test_drain_reports_dropped_count() {
        let queue = TaskQueue::new();
        queue.enqueue_all(vec![TaskId::new(), TaskId::new(), TaskId::new()]);

        assert_eq!(queue.drain(), 3);
        assert_eq!(queue.remaining(), 0);
        assert_eq!(queue.drain(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_dequeue_is_exclusive() {
        use std::sync::Arc;

        let queue = Arc::new(TaskQueue::new());
        let ids: Vec<TaskId> = (0..100).map(|_| TaskId::new()).collect();
        queue.enqueue_all(ids.clone());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut taken = Vec::new();
                while let Some(id) = queue.dequeue() {
                    taken.push(id);
                }
                taken
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        // 每个ID恰好被一个工作器取走
        all.sort();
        let mut expected = ids;
        expected.sort();
        assert_eq!(all, expected);
    }
}
