pub mod dispatch;
pub mod handler;
pub mod http;
pub mod usage;
