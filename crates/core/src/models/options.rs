use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::MapperError;

/// 默认请求超时时间
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// nanite选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// 选择负载最低的nanite
    #[default]
    LeastLoaded,
    /// 发送给所有提供该服务的nanite
    All,
    /// 随机选择一个nanite
    Random,
    /// 按服务轮询
    RoundRobin,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::LeastLoaded => "least_loaded",
            SelectionPolicy::All => "all",
            SelectionPolicy::Random => "random",
            SelectionPolicy::RoundRobin => "round_robin",
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionPolicy {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "least_loaded" => Ok(SelectionPolicy::LeastLoaded),
            "all" => Ok(SelectionPolicy::All),
            "random" => Ok(SelectionPolicy::Random),
            "round_robin" | "rr" => Ok(SelectionPolicy::RoundRobin),
            _ => Err(MapperError::InvalidSelector(s.to_string())),
        }
    }
}

/// 未指定选项时使用的默认值，来自 mapper 配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDefaults {
    pub policy: SelectionPolicy,
    /// None 表示不设置超时
    pub timeout: Option<Duration>,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            policy: SelectionPolicy::LeastLoaded,
            timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// request/push 的路由选项
///
/// 未设置的策略和超时由 mapper 按配置的默认值补全。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub policy: Option<SelectionPolicy>,
    /// `Some(Duration::ZERO)` 表示禁用超时
    pub timeout: Option<Duration>,
    /// 指定目标nanite，绕过选择策略
    pub target: Option<String>,
}

impl RequestOptions {
    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// 以秒为单位设置超时，0 表示禁用
    pub fn with_timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout = Some(Duration::from_secs(seconds));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = Some(Duration::ZERO);
        self
    }

    /// 用默认值补全策略和超时，返回的超时为 None 时不设置定时器
    pub fn resolve(&self, defaults: &RequestDefaults) -> (SelectionPolicy, Option<Duration>) {
        let policy = self.policy.unwrap_or(defaults.policy);
        let timeout = self
            .timeout
            .or(defaults.timeout)
            .filter(|timeout| !timeout.is_zero());
        (policy, timeout)
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "least_loaded".parse::<SelectionPolicy>().unwrap(),
            SelectionPolicy::LeastLoaded
        );
        assert_eq!("all".parse::<SelectionPolicy>().unwrap(), SelectionPolicy::All);
        assert_eq!(
            "random".parse::<SelectionPolicy>().unwrap(),
            SelectionPolicy::Random
        );
        assert_eq!(
            "round_robin".parse::<SelectionPolicy>().unwrap(),
            SelectionPolicy::RoundRobin
        );
        assert_eq!("rr".parse::<SelectionPolicy>().unwrap(), SelectionPolicy::RoundRobin);
        assert!("fastest".parse::<SelectionPolicy>().is_err());
    }

    #[test]
    fn test_policy_display_round_trips() {
        for policy in [
            SelectionPolicy::LeastLoaded,
            SelectionPolicy::All,
            SelectionPolicy::Random,
            SelectionPolicy::RoundRobin,
        ] {
            assert_eq!(policy.to_string().parse::<SelectionPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_unset_options_take_defaults() {
        let defaults = RequestDefaults {
            policy: SelectionPolicy::RoundRobin,
            timeout: Some(Duration::from_secs(30)),
        };
        let options = RequestOptions::default();
        assert!(options.policy.is_none());
        assert!(options.target.is_none());
        assert_eq!(
            options.resolve(&defaults),
            (SelectionPolicy::RoundRobin, Some(Duration::from_secs(30)))
        );

        let options = RequestOptions::default()
            .with_policy(SelectionPolicy::All)
            .with_timeout_secs(5);
        assert_eq!(
            options.resolve(&defaults),
            (SelectionPolicy::All, Some(Duration::from_secs(5)))
        );
    }

    #[test]
    fn test_zero_timeout_disables() {
        let defaults = RequestDefaults::default();
        assert_eq!(defaults.timeout, Some(DEFAULT_REQUEST_TIMEOUT));

        let options = RequestOptions::default().with_timeout_secs(0);
        assert_eq!(options.resolve(&defaults).1, None);

        let options = RequestOptions::default().with_timeout(Duration::ZERO);
        assert_eq!(options.resolve(&defaults).1, None);

        let options = RequestOptions::default().without_timeout();
        assert_eq!(options.resolve(&defaults).1, None);

        // 配置中禁用超时
        let disabled = RequestDefaults {
            timeout: None,
            ..RequestDefaults::default()
        };
        assert_eq!(RequestOptions::default().resolve(&disabled).1, None);
    }
}
