pub mod auth_cmd;
pub mod common;
pub mod config;
pub mod enqueue;
pub mod load;
pub mod queue;
pub mod sync;
