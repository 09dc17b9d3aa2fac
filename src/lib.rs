pub mod commands;
pub mod core;
pub mod db;
pub mod error;
pub mod id;
pub mod types;
pub mod view;
