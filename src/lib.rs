pub mod attendance;
pub mod backend;
pub mod config;
pub mod content;
pub mod db;
pub mod ipc;
pub mod serve;
pub mod update;
