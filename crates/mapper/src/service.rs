use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use nanite_core::{
    config::AppConfig,
    models::{RequestDefaults, RequestOptions, Results, Token, WorkerRecord},
    traits::MessageBus,
    MapperError, MapperResult,
};

use crate::mapper::{Mapper, ResultCallback};

/// 服务运行参数
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub heartbeat_exchange: String,
    pub registration_exchange: String,
    pub ping_interval: Duration,
    pub command_buffer: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            heartbeat_exchange: "heartbeat".to_string(),
            registration_exchange: "registration".to_string(),
            ping_interval: Duration::from_secs(15),
            command_buffer: 256,
        }
    }
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            heartbeat_exchange: config.message_queue.heartbeat_exchange.clone(),
            registration_exchange: config.message_queue.registration_exchange.clone(),
            ping_interval: config.mapper.ping_interval(),
            command_buffer: config.mapper.command_buffer,
        }
    }
}

enum MapperCommand {
    Request {
        service_type: String,
        payload: serde_json::Value,
        options: RequestOptions,
        on_result: Option<ResultCallback>,
        reply: oneshot::Sender<MapperResult<Token>>,
    },
    Push {
        service_type: String,
        payload: serde_json::Value,
        options: RequestOptions,
        reply: oneshot::Sender<bool>,
    },
    Workers {
        reply: oneshot::Sender<Vec<WorkerRecord>>,
    },
}

/// Mapper 的事件循环
///
/// 独占 [`Mapper`]，依次处理心跳、注册、结果、句柄命令和存活检查定时器。
/// 每个事件处理完后执行延迟队列并发布其中的数据包。
pub struct MapperService {
    mapper: Mapper,
    bus: Arc<dyn MessageBus>,
    settings: ServiceSettings,
    commands: mpsc::Receiver<MapperCommand>,
}

impl MapperService {
    pub fn new(
        mapper: Mapper,
        bus: Arc<dyn MessageBus>,
        settings: ServiceSettings,
    ) -> (Self, MapperHandle) {
        let (tx, rx) = mpsc::channel(settings.command_buffer.max(1));
        let handle = MapperHandle {
            commands: tx,
            identity: mapper.identity().to_string(),
            defaults: mapper.defaults(),
        };
        let service = Self {
            mapper,
            bus,
            settings,
            commands: rx,
        };
        (service, handle)
    }

    pub fn from_config(config: &AppConfig, bus: Arc<dyn MessageBus>) -> (Self, MapperHandle) {
        Self::new(
            Mapper::from_config(&config.mapper),
            bus,
            ServiceSettings::from_config(config),
        )
    }

    /// 订阅入站队列并运行直到收到关闭信号或所有句柄被释放
    ///
    /// 任一入站订阅被关闭时返回 [`MapperError::MessageQueue`]。
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> MapperResult<()> {
        let MapperService {
            mut mapper,
            bus,
            settings,
            mut commands,
        } = self;

        let identity = mapper.identity().to_string();
        let heartbeat_queue = format!("heartbeat{identity}");
        let registration_queue = format!("mapper{identity}");
        let mut heartbeats = bus
            .subscribe_fanout(&settings.heartbeat_exchange, &heartbeat_queue)
            .await?;
        let mut registrations = bus
            .subscribe_fanout(&settings.registration_exchange, &registration_queue)
            .await?;
        let mut results = bus.subscribe_queue(&identity).await?;

        let mut liveness = interval(settings.ping_interval);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Mapper {} 已启动，存活检查周期: {:?}", identity, settings.ping_interval);

        let mut outcome = Ok(());

        loop {
            let inbound = tokio::select! {
                packet = heartbeats.recv() => Some((packet, heartbeat_queue.as_str())),
                packet = registrations.recv() => Some((packet, registration_queue.as_str())),
                packet = results.recv() => Some((packet, identity.as_str())),
                command = commands.recv() => {
                    match command {
                        Some(command) => handle_command(&mut mapper, command),
                        None => {
                            info!("所有Mapper句柄已释放，停止事件循环");
                            break;
                        }
                    }
                    None
                }
                _ = liveness.tick() => {
                    mapper.tick(Utc::now());
                    None
                }
                _ = shutdown_rx.recv() => {
                    info!("Mapper {} 收到停止信号", identity);
                    break;
                }
            };

            match inbound {
                Some((Some(packet), _)) => mapper.handle_packet(packet, Utc::now()),
                Some((None, queue)) => {
                    error!("入站订阅 {} 已关闭，停止事件循环", queue);
                    outcome = Err(MapperError::MessageQueue(format!("订阅 {queue} 已关闭")));
                    break;
                }
                None => {}
            }

            flush(&mut mapper, bus.as_ref()).await;
        }

        flush(&mut mapper, bus.as_ref()).await;
        info!("Mapper {} 已停止", identity);
        outcome
    }
}

fn handle_command(mapper: &mut Mapper, command: MapperCommand) {
    match command {
        MapperCommand::Request {
            service_type,
            payload,
            options,
            on_result,
            reply,
        } => {
            let result = mapper.request(&service_type, payload, options, on_result, Utc::now());
            if reply.send(result).is_err() {
                debug!("请求方已放弃等待令牌");
            }
        }
        MapperCommand::Push {
            service_type,
            payload,
            options,
            reply,
        } => {
            let _ = reply.send(mapper.push(&service_type, payload, options));
        }
        MapperCommand::Workers { reply } => {
            let _ = reply.send(mapper.workers());
        }
    }
}

async fn flush(mapper: &mut Mapper, bus: &dyn MessageBus) {
    for outgoing in mapper.run_deferred(Utc::now()) {
        if let Err(e) = bus.publish(&outgoing.queue, &outgoing.packet).await {
            error!(
                "发布 {} 数据包到队列 {} 失败: {}",
                outgoing.packet.kind(),
                outgoing.queue,
                e
            );
        }
    }
}

/// Mapper 句柄，可克隆并在多个任务间共享
#[derive(Clone)]
pub struct MapperHandle {
    commands: mpsc::Sender<MapperCommand>,
    identity: String,
    defaults: RequestDefaults,
}

impl MapperHandle {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// 请求未指定策略或超时时使用的默认值
    pub fn defaults(&self) -> RequestDefaults {
        self.defaults
    }

    /// 发出请求但不关心结果
    pub async fn request(
        &self,
        service_type: &str,
        payload: serde_json::Value,
        options: RequestOptions,
    ) -> MapperResult<Token> {
        self.send_request(service_type, payload, options, None).await
    }

    /// 发出请求，所有目标应答后以结果调用回调，超时则以 `None` 调用
    pub async fn request_with_callback<F>(
        &self,
        service_type: &str,
        payload: serde_json::Value,
        options: RequestOptions,
        on_result: F,
    ) -> MapperResult<Token>
    where
        F: FnOnce(Option<Results>) + Send + 'static,
    {
        self.send_request(service_type, payload, options, Some(Box::new(on_result)))
            .await
    }

    /// 发出请求并等待结果，超时返回 `Ok(None)`
    pub async fn request_and_wait(
        &self,
        service_type: &str,
        payload: serde_json::Value,
        options: RequestOptions,
    ) -> MapperResult<Option<Results>> {
        let (tx, rx) = oneshot::channel();
        let callback: ResultCallback = Box::new(move |results| {
            let _ = tx.send(results);
        });
        let token = self
            .send_request(service_type, payload, options, Some(callback))
            .await?;

        rx.await.map_err(|_| {
            warn!("等待请求 {} 结果时Mapper已停止", token);
            MapperError::ServiceStopped
        })
    }

    /// 发送无需应答的请求，返回是否找到了路由
    pub async fn push(
        &self,
        service_type: &str,
        payload: serde_json::Value,
        options: RequestOptions,
    ) -> MapperResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(MapperCommand::Push {
            service_type: service_type.to_string(),
            payload,
            options,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MapperError::ServiceStopped)
    }

    /// 当前注册的nanite快照
    pub async fn workers(&self) -> MapperResult<Vec<WorkerRecord>> {
        let (reply, rx) = oneshot::channel();
        self.send(MapperCommand::Workers { reply }).await?;
        rx.await.map_err(|_| MapperError::ServiceStopped)
    }

    async fn send_request(
        &self,
        service_type: &str,
        payload: serde_json::Value,
        options: RequestOptions,
        on_result: Option<ResultCallback>,
    ) -> MapperResult<Token> {
        let (reply, rx) = oneshot::channel();
        self.send(MapperCommand::Request {
            service_type: service_type.to_string(),
            payload,
            options,
            on_result,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MapperError::ServiceStopped)?
    }

    async fn send(&self, command: MapperCommand) -> MapperResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| MapperError::ServiceStopped)
    }
}
