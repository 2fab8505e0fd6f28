use std::collections::VecDeque;

use nanite_core::models::Packet;

/// 延迟到下一个调度周期执行的工作
#[derive(Debug, Clone, PartialEq)]
pub enum Deferred {
    /// 发布数据包到nanite的点对点队列
    Publish { queue: String, packet: Packet },
    /// 检查到期的请求超时
    SweepTimeouts,
}

/// 延迟任务队列
///
/// 事件处理过程中产生的发布只在这里排队（已调度），由服务循环在处理完当前事件后
/// 统一取出执行（已执行），避免在检查注册表的同时修改它。
#[derive(Debug, Default)]
pub struct DeferredQueue {
    tasks: VecDeque<Deferred>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, task: Deferred) {
        self.tasks.push_back(task);
    }

    pub fn schedule_publish(&mut self, queue: &str, packet: Packet) {
        self.schedule(Deferred::Publish {
            queue: queue.to_string(),
            packet,
        });
    }

    /// 取出当前排队的全部任务，执行期间新加入的任务留到下一个周期
    pub fn take(&mut self) -> Vec<Deferred> {
        std::mem::take(&mut self.tasks).into()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deferred> {
        self.tasks.iter()
    }

    /// 已调度但尚未执行的发布
    pub fn scheduled_publishes(&self) -> Vec<(&str, &Packet)> {
        self.tasks
            .iter()
            .filter_map(|task| match task {
                Deferred::Publish { queue, packet } => Some((queue.as_str(), packet)),
                Deferred::SweepTimeouts => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_preserves_order_and_empties() {
        let mut queue = DeferredQueue::new();
        queue.schedule_publish("nanite-1", Packet::Pong);
        queue.schedule(Deferred::SweepTimeouts);
        queue.schedule_publish("nanite-2", Packet::Advertise);

        assert_eq!(queue.scheduled_publishes().len(), 2);

        let tasks = queue.take();
        assert!(queue.is_empty());
        assert_eq!(tasks.len(), 3);
        assert_eq!(
            tasks[0],
            Deferred::Publish {
                queue: "nanite-1".to_string(),
                packet: Packet::Pong
            }
        );
        assert_eq!(tasks[1], Deferred::SweepTimeouts);
    }
}
