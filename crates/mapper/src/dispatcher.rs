use tracing::{debug, warn};

use nanite_core::{
    models::{Answer, Packet, RequestPacket, SelectionPolicy},
    MapperError, MapperResult,
};

use crate::deferred::DeferredQueue;
use crate::registry::WorkerRegistry;
use crate::strategies::Selector;

/// 请求分发器
///
/// 为请求选出目标nanite、创建 [`Answer`]，并为每个目标调度一次延迟发布。
pub struct Dispatcher {
    selector: Selector,
}

impl Dispatcher {
    pub fn new(selector: Selector) -> Self {
        Self { selector }
    }

    /// 按选择策略路由请求
    pub fn route_broadcast(
        &mut self,
        registry: &WorkerRegistry,
        request: &RequestPacket,
        policy: SelectionPolicy,
        outbox: &mut DeferredQueue,
    ) -> MapperResult<Answer> {
        let workers: Vec<String> = self
            .selector
            .select(policy, &request.service_type, registry)
            .into_iter()
            .map(|record| record.identity.clone())
            .collect();

        if workers.is_empty() {
            warn!("没有可处理服务 {} 的nanite，请求无法路由", request.service_type);
            return Err(MapperError::NoRoute {
                service: request.service_type.clone(),
            });
        }

        let answer = Answer::new(request.token.clone(), workers.iter());
        for worker in &workers {
            outbox.schedule_publish(worker, Packet::Request(request.clone()));
        }

        debug!(
            "请求 {} ({}) 已调度到 {} 个nanite",
            request.token,
            request.service_type,
            workers.len()
        );
        Ok(answer)
    }

    /// 路由到指定nanite，不检查其公告的服务
    pub fn route_targeted(
        &mut self,
        registry: &WorkerRegistry,
        request: &RequestPacket,
        target: &str,
        outbox: &mut DeferredQueue,
    ) -> MapperResult<Answer> {
        if !registry.contains(target) {
            warn!("目标nanite {} 未注册，请求 {} 无法路由", target, request.token);
            return Err(MapperError::UnknownTarget {
                identity: target.to_string(),
            });
        }

        let answer = Answer::new(request.token.clone(), [target]);
        outbox.schedule_publish(target, Packet::Request(request.clone()));

        debug!("请求 {} 已调度到指定nanite {}", request.token, target);
        Ok(answer)
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut Selector {
        &mut self.selector
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Selector::new())
    }
}
