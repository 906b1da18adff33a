pub mod api;
pub mod assistant;
pub mod config;
pub mod db;
pub mod embedding;
pub mod llm;

pub use self::config::Config;
