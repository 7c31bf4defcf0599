#[macro_use]
pub mod log;

pub mod adapters;
pub mod command;
pub mod config;
pub mod db;
pub mod event;
pub mod matcher;
pub mod message;
pub mod plugins;
pub mod scheduler;
