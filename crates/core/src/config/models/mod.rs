pub mod app_config;
pub mod mapper;
pub mod message_queue;
pub mod observability;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use mapper::MapperConfig;
pub use message_queue::MessageQueueConfig;
pub use observability::ObservabilityConfig;
