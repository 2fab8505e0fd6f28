use thiserror::Error;

/// 协调器错误类型定义
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("没有可处理服务 {service} 的nanite")]
    NoRoute { service: String },

    #[error("目标nanite未注册: {identity}")]
    UnknownTarget { identity: String },

    #[error("无效的超时截止时间: {token}")]
    InvalidDeadline { token: String },

    #[error("令牌仍在等待中，不能重复使用: {token}")]
    TokenInUse { token: String },

    #[error("无效的选择策略: {0}")]
    InvalidSelector(String),

    #[error("消息队列错误: {0}")]
    MessageQueue(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("mapper服务已停止")]
    ServiceStopped,
}

impl MapperError {
    /// 是否属于"无可用路由"类错误
    pub fn is_no_route(&self) -> bool {
        matches!(
            self,
            MapperError::NoRoute { .. } | MapperError::UnknownTarget { .. }
        )
    }
}

impl From<serde_json::Error> for MapperError {
    fn from(e: serde_json::Error) -> Self {
        MapperError::Serialization(e.to_string())
    }
}

/// 统一的Result类型
pub type MapperResult<T> = std::result::Result<T, MapperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_route_classification() {
        let no_route = MapperError::NoRoute {
            service: "/calc/add".to_string(),
        };
        let unknown = MapperError::UnknownTarget {
            identity: "nanite-1".to_string(),
        };
        let other = MapperError::ServiceStopped;

        assert!(no_route.is_no_route());
        assert!(unknown.is_no_route());
        assert!(!other.is_no_route());
    }

    #[test]
    fn test_error_display() {
        let err = MapperError::NoRoute {
            service: "/calc/add".to_string(),
        };
        assert!(err.to_string().contains("/calc/add"));

        let err = MapperError::InvalidDeadline {
            token: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "无效的超时截止时间: abc");
    }
}
