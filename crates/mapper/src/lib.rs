//! nanite 请求路由协调器
//!
//! 跟踪nanite的注册与心跳，按选择策略分发请求，归并异步结果并处理超时。

pub mod deferred;
pub mod dispatcher;
pub mod mapper;
pub mod reducer;
pub mod registry;
pub mod service;
pub mod strategies;
pub mod timeout_manager;

#[cfg(test)]
mod strategies_test;

pub use deferred::{Deferred, DeferredQueue};
pub use dispatcher::Dispatcher;
pub use mapper::{Mapper, Outgoing, ResultCallback};
pub use reducer::{AnswerReducer, Fulfilled, Reducer};
pub use registry::WorkerRegistry;
pub use service::{MapperHandle, MapperService, ServiceSettings};
pub use strategies::Selector;
pub use timeout_manager::TimeoutManager;
