use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tracing::{debug, info, warn};

use nanite_core::{
    config::MapperConfig,
    models::{
        Answer, HeartbeatReply, Packet, RequestDefaults, RequestOptions, RequestPacket,
        ResultPacket, Results, SelectionPolicy, Token, WorkerRecord,
    },
    MapperError, MapperResult,
};

use crate::deferred::{Deferred, DeferredQueue};
use crate::dispatcher::Dispatcher;
use crate::reducer::{AnswerReducer, Fulfilled, Reducer};
use crate::registry::WorkerRegistry;
use crate::strategies::Selector;
use crate::timeout_manager::TimeoutManager;

/// 请求结果回调，超时时收到 `None`
pub type ResultCallback = Box<dyn FnOnce(Option<Results>) + Send>;

/// 待发布到消息总线的数据包
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub queue: String,
    pub packet: Packet,
}

/// Mapper
///
/// 组合注册表、分发器、超时管理器与归并器。所有方法都在同一个任务中以 `&mut self`
/// 调用，发布不会立即执行，而是进入延迟队列，由 [`Mapper::run_deferred`] 在下一个
/// 调度周期取出。
pub struct Mapper {
    identity: String,
    liveness_window: chrono::Duration,
    defaults: RequestDefaults,
    registry: WorkerRegistry,
    dispatcher: Dispatcher,
    timeouts: TimeoutManager,
    reducer: Box<dyn Reducer>,
    callbacks: HashMap<Token, ResultCallback>,
    deferred: DeferredQueue,
}

impl Mapper {
    pub fn new(identity: impl Into<String>, liveness_window: chrono::Duration) -> Self {
        Self {
            identity: identity.into(),
            liveness_window,
            defaults: RequestDefaults::default(),
            registry: WorkerRegistry::new(),
            dispatcher: Dispatcher::default(),
            timeouts: TimeoutManager::new(),
            reducer: Box::new(AnswerReducer::new()),
            callbacks: HashMap::new(),
            deferred: DeferredQueue::new(),
        }
    }

    pub fn from_config(config: &MapperConfig) -> Self {
        Self::new(config.resolve_identity(), config.liveness_window())
            .with_defaults(config.request_defaults())
    }

    pub fn with_defaults(mut self, defaults: RequestDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.dispatcher = Dispatcher::new(selector);
        self
    }

    pub fn with_reducer(mut self, reducer: Box<dyn Reducer>) -> Self {
        self.reducer = reducer;
        self
    }

    /// 发送需要应答的请求，返回关联令牌
    ///
    /// 未指定的策略和超时取配置的默认值。超时有限时总会设置定时器，到期后清理应答
    /// 记录，有回调时以 `None` 调用。出错时不会留下任何超时、应答或待发布记录。
    pub fn request(
        &mut self,
        service_type: &str,
        payload: serde_json::Value,
        options: RequestOptions,
        on_result: Option<ResultCallback>,
        now: DateTime<Utc>,
    ) -> MapperResult<Token> {
        let (policy, timeout) = options.resolve(&self.defaults);
        let request =
            RequestPacket::new(service_type, payload, &self.identity).with_reply_to(&self.identity);
        let token = request.token.clone();

        if let Some(timeout) = timeout {
            let deadline = Self::deadline_after(&token, now, timeout)?;
            self.timeouts.arm(&token, deadline, now)?;
        }

        let answer = match self.route(&request, policy, options.target.as_deref()) {
            Ok(answer) => answer,
            Err(e) => {
                self.timeouts.disarm(&token);
                return Err(e);
            }
        };

        // 既无回调也无超时时没有人会取走结果
        if on_result.is_some() || timeout.is_some() {
            self.reducer.watch_for(answer);
        }
        if let Some(callback) = on_result {
            self.callbacks.insert(token.clone(), callback);
        }

        counter!("nanite_requests_total", "selector" => policy.as_str()).increment(1);
        debug!("请求 {} 已发出: {}", token, service_type);
        Ok(token)
    }

    /// 发送不需要应答的请求，返回是否找到了路由
    pub fn push(
        &mut self,
        service_type: &str,
        payload: serde_json::Value,
        options: RequestOptions,
    ) -> bool {
        let (policy, _) = options.resolve(&self.defaults);
        let request = RequestPacket::new(service_type, payload, &self.identity);
        let routed = self
            .route(&request, policy, options.target.as_deref())
            .is_ok();
        if routed {
            counter!("nanite_pushes_total", "selector" => policy.as_str()).increment(1);
        }
        routed
    }

    fn route(
        &mut self,
        request: &RequestPacket,
        policy: SelectionPolicy,
        target: Option<&str>,
    ) -> MapperResult<Answer> {
        let result = match target {
            Some(target) => self.dispatcher.route_targeted(
                &self.registry,
                request,
                target,
                &mut self.deferred,
            ),
            None => self.dispatcher.route_broadcast(
                &self.registry,
                request,
                policy,
                &mut self.deferred,
            ),
        };
        if result.is_err() {
            counter!("nanite_no_route_total").increment(1);
        }
        result
    }

    fn deadline_after(
        token: &str,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> MapperResult<DateTime<Utc>> {
        chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|timeout| now.checked_add_signed(timeout))
            .ok_or_else(|| MapperError::InvalidDeadline {
                token: token.to_string(),
            })
    }

    /// 处理总线上收到的数据包，无法识别的数据包直接丢弃
    pub fn handle_packet(&mut self, packet: Packet, now: DateTime<Utc>) {
        match packet {
            Packet::Ping { identity, status } => self.handle_heartbeat(&identity, status, now),
            Packet::Register {
                identity,
                services,
                status,
            } => self.handle_registration(&identity, services, status, now),
            Packet::Result(result) => {
                self.handle_result(result);
            }
            other => {
                warn!("忽略不支持的数据包类型: {}", other.kind());
            }
        }
    }

    pub fn handle_heartbeat(&mut self, identity: &str, status: f64, now: DateTime<Utc>) {
        let reply = match self.registry.heartbeat(identity, status, now) {
            HeartbeatReply::Pong => Packet::Pong,
            HeartbeatReply::Advertise => Packet::Advertise,
        };
        self.deferred.schedule_publish(identity, reply);
    }

    pub fn handle_registration(
        &mut self,
        identity: &str,
        services: Vec<String>,
        status: f64,
        now: DateTime<Utc>,
    ) {
        self.registry.register(identity, services, status, now);
        gauge!("nanite_workers").set(self.registry.len() as f64);
    }

    /// 将结果交给归并器，请求完成时取消超时并调用回调
    pub fn handle_result(&mut self, result: ResultPacket) -> bool {
        match self.reducer.handle_result(result) {
            Some(Fulfilled { token, results }) => {
                self.timeouts.disarm(&token);
                if let Some(callback) = self.callbacks.remove(&token) {
                    callback(Some(results));
                }
                debug!("请求 {} 已完成", token);
                true
            }
            None => false,
        }
    }

    /// 外部收到应答时取消超时
    pub fn disarm(&mut self, token: &str) -> bool {
        self.timeouts.disarm(token)
    }

    /// 周期性存活检查：移除失效nanite，并在下一个周期检查请求超时
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired = self.registry.expire_stale(now, self.liveness_window);
        if !expired.is_empty() {
            info!("清理了 {} 个失效nanite", expired.len());
            counter!("nanite_workers_expired_total").increment(expired.len() as u64);
            gauge!("nanite_workers").set(self.registry.len() as f64);
        }
        self.deferred.schedule(Deferred::SweepTimeouts);
        expired
    }

    /// 执行上一周期排队的延迟任务，返回需要发布的数据包
    pub fn run_deferred(&mut self, now: DateTime<Utc>) -> Vec<Outgoing> {
        let mut outgoing = Vec::new();
        for task in self.deferred.take() {
            match task {
                Deferred::Publish { queue, packet } => outgoing.push(Outgoing { queue, packet }),
                Deferred::SweepTimeouts => {
                    self.sweep_timeouts(now);
                }
            }
        }
        outgoing
    }

    /// 触发所有到期请求的回调，返回超时的请求数
    pub fn sweep_timeouts(&mut self, now: DateTime<Utc>) -> usize {
        let expired = self.timeouts.sweep(now);
        for token in &expired {
            self.reducer.forget(token);
            if let Some(callback) = self.callbacks.remove(token) {
                callback(None);
            }
        }
        if !expired.is_empty() {
            counter!("nanite_request_timeouts_total").increment(expired.len() as u64);
        }
        expired.len()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn defaults(&self) -> RequestDefaults {
        self.defaults
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn timeouts(&self) -> &TimeoutManager {
        &self.timeouts
    }

    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    pub fn reducer(&self) -> &dyn Reducer {
        self.reducer.as_ref()
    }

    pub fn has_callback(&self, token: &str) -> bool {
        self.callbacks.contains_key(token)
    }

    pub fn workers(&self) -> Vec<WorkerRecord> {
        self.registry.snapshot()
    }
}
