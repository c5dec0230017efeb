pub mod latency;
pub mod password;
pub mod sheet;
pub mod text;
