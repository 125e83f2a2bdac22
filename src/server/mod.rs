mod server;
mod port;
mod event_source_kafka;
mod event_source_memory;
mod offset_tracker;
mod user_event_listener;
mod user_events_handler;

pub use server::*;
pub use port::*;
pub use event_source_kafka::*;
pub use event_source_memory::*;
pub use offset_tracker::*;
pub use user_event_listener::*;
pub use user_events_handler::*;
