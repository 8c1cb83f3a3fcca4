pub mod backend;
pub mod codec;
pub mod command;
pub mod commands;
pub mod config;
pub mod connection;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod number;
pub mod server;
pub mod store;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
