use std::collections::HashMap;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use nanite_core::models::{SelectionPolicy, WorkerRecord};

use crate::registry::WorkerRegistry;

/// nanite选择器
///
/// 四种策略通过 [`SelectionPolicy`] 分派。没有nanite提供所需服务时返回空列表，不报错。
/// 轮询游标按服务保存，在nanite集合变化后继续沿用，使用前若越界则归零。
pub struct Selector {
    cursors: HashMap<String, usize>,
    rng: StdRng,
}

impl Selector {
    pub fn new() -> Self {
        Self {
            cursors: HashMap::new(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// 使用固定种子创建，随机策略的结果可复现
    pub fn with_seed(seed: u64) -> Self {
        Self {
            cursors: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// 按策略选出服务的目标nanite
    pub fn select<'a>(
        &mut self,
        policy: SelectionPolicy,
        service: &str,
        registry: &'a WorkerRegistry,
    ) -> Vec<&'a WorkerRecord> {
        let candidates = registry.candidates_for(service);
        if candidates.is_empty() {
            debug!("没有支持服务 {} 的nanite", service);
            return Vec::new();
        }

        let selected = match policy {
            SelectionPolicy::LeastLoaded => Self::least_loaded(candidates),
            SelectionPolicy::All => candidates,
            SelectionPolicy::Random => self.random(candidates),
            SelectionPolicy::RoundRobin => self.round_robin(service, candidates),
        };

        debug!(
            "{} 策略为服务 {} 选择nanite: {:?}",
            policy,
            service,
            selected.iter().map(|r| r.identity.as_str()).collect::<Vec<_>>()
        );
        selected
    }

    /// 负载相同时取先遍历到的nanite
    fn least_loaded(candidates: Vec<&WorkerRecord>) -> Vec<&WorkerRecord> {
        candidates
            .into_iter()
            .min_by(|a, b| {
                a.load
                    .partial_cmp(&b.load)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .into_iter()
            .collect()
    }

    fn random<'a>(&mut self, candidates: Vec<&'a WorkerRecord>) -> Vec<&'a WorkerRecord> {
        let index = self.rng.random_range(0..candidates.len());
        vec![candidates[index]]
    }

    fn round_robin<'a>(
        &mut self,
        service: &str,
        candidates: Vec<&'a WorkerRecord>,
    ) -> Vec<&'a WorkerRecord> {
        let cursor = self.cursors.entry(service.to_string()).or_insert(0);
        if *cursor >= candidates.len() {
            *cursor = 0;
        }
        let selected = candidates[*cursor];
        *cursor += 1;
        vec![selected]
    }

    /// 服务当前的轮询游标
    pub fn cursor(&self, service: &str) -> Option<usize> {
        self.cursors.get(service).copied()
    }

    pub fn reset_cursor(&mut self, service: &str) {
        self.cursors.remove(service);
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}
