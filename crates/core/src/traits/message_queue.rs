use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{models::Packet, MapperResult};

/// 订阅得到的数据包接收端，发送端关闭表示订阅结束
pub type PacketReceiver = mpsc::Receiver<Packet>;

/// 消息总线抽象接口
///
/// 支持两种投递方式：发往命名队列的点对点消息，以及通过fanout交换机的广播。
/// 所有发布都是即发即弃，实现不需要等待消费者确认。
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// 发布数据包到指定队列
    async fn publish(&self, queue: &str, packet: &Packet) -> MapperResult<()>;

    /// 广播数据包到fanout交换机
    async fn broadcast(&self, exchange: &str, packet: &Packet) -> MapperResult<()>;

    /// 创建绑定到fanout交换机的独占队列并开始消费
    async fn subscribe_fanout(&self, exchange: &str, queue: &str) -> MapperResult<PacketReceiver>;

    /// 消费指定的点对点队列
    async fn subscribe_queue(&self, queue: &str) -> MapperResult<PacketReceiver>;
}
