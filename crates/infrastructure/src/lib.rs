pub mod in_memory_queue;
pub mod message_queue;

pub use in_memory_queue::*;
pub use message_queue::*;
