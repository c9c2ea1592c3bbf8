pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod llms_txt;
pub mod metrics;
pub mod oracle;
pub mod rate_limit;
