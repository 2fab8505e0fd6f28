use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    Consumer, ExchangeKind,
};
use nanite_core::{
    config::MessageQueueConfig,
    models::Packet,
    traits::{MessageBus, PacketReceiver},
    MapperError, MapperResult,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// 每个订阅在内存中缓冲的数据包数量
const SUBSCRIPTION_BUFFER: usize = 1024;

/// RabbitMQ消息总线实现
pub struct RabbitMQMessageBus {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
}

impl RabbitMQMessageBus {
    /// 连接RabbitMQ并打开通道
    pub async fn new(config: &MessageQueueConfig) -> MapperResult<Self> {
        let connect = Connection::connect(&config.url, ConnectionProperties::default());
        let connection = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_seconds),
            connect,
        )
        .await
        .map_err(|_| {
            MapperError::MessageQueue(format!(
                "连接RabbitMQ超时 ({}秒)",
                config.connection_timeout_seconds
            ))
        })?
        .map_err(|e| MapperError::MessageQueue(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| MapperError::MessageQueue(format!("创建通道失败: {e}")))?;

        info!("成功连接到RabbitMQ: {}", config.url);

        Ok(Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    /// 声明fanout交换机
    async fn declare_exchange(&self, channel: &Channel, exchange: &str) -> MapperResult<()> {
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                MapperError::MessageQueue(format!("声明交换机 {exchange} 失败: {e}"))
            })?;

        debug!("交换机 {} 声明成功", exchange);
        Ok(())
    }

    /// 声明独占队列，连接断开后自动删除
    async fn declare_queue(&self, channel: &Channel, queue: &str) -> MapperResult<()> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: false,
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| MapperError::MessageQueue(format!("声明队列 {queue} 失败: {e}")))?;

        debug!("队列 {} 声明成功", queue);
        Ok(())
    }

    async fn consume(&self, channel: &Channel, queue: &str) -> MapperResult<PacketReceiver> {
        let consumer = channel
            .basic_consume(
                queue,
                &format!("{queue}-consumer"),
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| MapperError::MessageQueue(format!("创建消费者失败: {e}")))?;

        debug!("开始消费队列: {}", queue);
        Ok(spawn_consumer(queue.to_string(), consumer))
    }

    /// 获取连接状态
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    /// 关闭连接
    pub async fn close(&self) -> MapperResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| MapperError::MessageQueue(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

/// 将消费者的投递解码后转发到通道，无法解析的数据包记录后丢弃
fn spawn_consumer(queue: String, mut consumer: Consumer) -> PacketReceiver {
    let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

    tokio::spawn(async move {
        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(e) => {
                    error!("消费队列 {} 失败: {}", queue, e);
                    break;
                }
            };

            match Packet::decode(&delivery.data) {
                Ok(packet) => {
                    if tx.send(packet).await.is_err() {
                        debug!("队列 {} 的订阅方已关闭", queue);
                        break;
                    }
                }
                Err(e) => warn!("丢弃队列 {} 中无法解析的数据包: {}", queue, e),
            }
        }
        debug!("队列 {} 的消费者已退出", queue);
    });

    rx
}

#[async_trait]
impl MessageBus for RabbitMQMessageBus {
    /// 通过默认交换机发布到指定队列
    async fn publish(&self, queue: &str, packet: &Packet) -> MapperResult<()> {
        let payload = packet.encode()?;
        let channel = self.channel.lock().await;

        let confirm = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| {
                MapperError::MessageQueue(format!("发布数据包到队列 {queue} 失败: {e}"))
            })?;

        confirm
            .await
            .map_err(|e| MapperError::MessageQueue(format!("数据包发布确认失败: {e}")))?;

        debug!("{} 数据包已发布到队列: {}", packet.kind(), queue);
        Ok(())
    }

    async fn broadcast(&self, exchange: &str, packet: &Packet) -> MapperResult<()> {
        let payload = packet.encode()?;
        let channel = self.channel.lock().await;
        self.declare_exchange(&channel, exchange).await?;

        let confirm = channel
            .basic_publish(
                exchange,
                "",
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| {
                MapperError::MessageQueue(format!("广播数据包到交换机 {exchange} 失败: {e}"))
            })?;

        confirm
            .await
            .map_err(|e| MapperError::MessageQueue(format!("数据包发布确认失败: {e}")))?;

        debug!("{} 数据包已广播到交换机: {}", packet.kind(), exchange);
        Ok(())
    }

    async fn subscribe_fanout(&self, exchange: &str, queue: &str) -> MapperResult<PacketReceiver> {
        let channel = self.channel.lock().await;
        self.declare_exchange(&channel, exchange).await?;
        self.declare_queue(&channel, queue).await?;

        channel
            .queue_bind(
                queue,
                exchange,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                MapperError::MessageQueue(format!("绑定队列 {queue} 到交换机 {exchange} 失败: {e}"))
            })?;

        self.consume(&channel, queue).await
    }

    async fn subscribe_queue(&self, queue: &str) -> MapperResult<PacketReceiver> {
        let channel = self.channel.lock().await;
        self.declare_queue(&channel, queue).await?;
        self.consume(&channel, queue).await
    }
}
