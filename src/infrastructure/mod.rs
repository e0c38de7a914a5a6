pub mod config;
pub mod http;
pub mod owner;
pub mod repositories;
