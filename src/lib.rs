pub mod config;
pub mod db;
pub mod engine;
pub mod gateway;
pub mod metrics;
pub mod models;
pub mod services;
