use std::collections::HashMap;

use async_trait::async_trait;
use nanite_core::{
    models::Packet,
    traits::{MessageBus, PacketReceiver},
    MapperResult,
};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// 内存消息总线实现
///
/// 使用 Tokio channels 模拟队列和fanout交换机，适用于单进程部署和测试。
/// 与RabbitMQ的默认交换机一致，发往没有消费者的队列的数据包会被丢弃。
#[derive(Debug)]
pub struct InMemoryMessageBus {
    /// 队列名 -> 消费者发送端
    queues: RwLock<HashMap<String, mpsc::Sender<Packet>>>,
    /// 交换机名 -> 绑定的队列
    exchanges: RwLock<HashMap<String, Vec<String>>>,
    buffer: usize,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::with_buffer(1024)
    }

    /// 指定每个队列的缓冲容量
    pub fn with_buffer(buffer: usize) -> Self {
        info!("创建内存消息总线，队列容量: {}", buffer);
        Self {
            queues: RwLock::new(HashMap::new()),
            exchanges: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// 当前有消费者的队列
    pub async fn queue_names(&self) -> Vec<String> {
        let queues = self.queues.read().await;
        let mut names: Vec<String> = queues.keys().cloned().collect();
        names.sort();
        names
    }

    async fn open_queue(&self, queue: &str) -> PacketReceiver {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut queues = self.queues.write().await;
        if queues.insert(queue.to_string(), tx).is_some() {
            debug!("队列 {} 已有消费者，替换为新的订阅", queue);
        }
        rx
    }

    async fn deliver(&self, queue: &str, packet: Packet) {
        let sender = self.queues.read().await.get(queue).cloned();
        match sender {
            Some(sender) => {
                if sender.send(packet).await.is_err() {
                    debug!("队列 {} 的消费者已关闭，移除队列", queue);
                    self.queues.write().await.remove(queue);
                }
            }
            None => debug!("队列 {} 没有消费者，丢弃 {} 数据包", queue, packet.kind()),
        }
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, queue: &str, packet: &Packet) -> MapperResult<()> {
        self.deliver(queue, packet.clone()).await;
        Ok(())
    }

    async fn broadcast(&self, exchange: &str, packet: &Packet) -> MapperResult<()> {
        let bound = self
            .exchanges
            .read()
            .await
            .get(exchange)
            .cloned()
            .unwrap_or_default();

        for queue in &bound {
            self.deliver(queue, packet.clone()).await;
        }
        debug!("{} 数据包已广播到 {} 个队列", packet.kind(), bound.len());
        Ok(())
    }

    async fn subscribe_fanout(&self, exchange: &str, queue: &str) -> MapperResult<PacketReceiver> {
        let rx = self.open_queue(queue).await;
        let mut exchanges = self.exchanges.write().await;
        let bound = exchanges.entry(exchange.to_string()).or_default();
        if !bound.iter().any(|q| q == queue) {
            bound.push(queue.to_string());
        }
        Ok(rx)
    }

    async fn subscribe_queue(&self, queue: &str) -> MapperResult<PacketReceiver> {
        Ok(self.open_queue(queue).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping(identity: &str) -> Packet {
        Packet::Ping {
            identity: identity.to_string(),
            status: 0.0,
        }
    }

    #[tokio::test]
    async fn test_publish_to_queue() {
        let bus = InMemoryMessageBus::new();
        let mut rx = bus.subscribe_queue("nanite-1").await.unwrap();

        bus.publish("nanite-1", &Packet::Pong).await.unwrap();
        assert_eq!(rx.recv().await, Some(Packet::Pong));
    }

    #[tokio::test]
    async fn test_publish_without_consumer_is_dropped() {
        let bus = InMemoryMessageBus::new();
        bus.publish("nobody", &Packet::Pong).await.unwrap();

        let mut rx = bus.subscribe_queue("nobody").await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_bound_queue() {
        let bus = InMemoryMessageBus::new();
        let mut first = bus.subscribe_fanout("heartbeat", "heartbeat-a").await.unwrap();
        let mut second = bus.subscribe_fanout("heartbeat", "heartbeat-b").await.unwrap();
        let mut other = bus.subscribe_fanout("registration", "mapper-a").await.unwrap();

        bus.broadcast("heartbeat", &ping("nanite-1")).await.unwrap();

        assert_eq!(first.recv().await, Some(ping("nanite-1")));
        assert_eq!(second.recv().await, Some(ping("nanite-1")));
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_consumer_is_removed() {
        let bus = InMemoryMessageBus::new();
        let rx = bus.subscribe_queue("gone").await.unwrap();
        drop(rx);

        bus.publish("gone", &Packet::Pong).await.unwrap();
        assert!(bus.queue_names().await.is_empty());
    }
}
