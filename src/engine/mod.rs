pub mod accumulation;
pub mod copy_engine;
pub mod delta;
pub mod order_manager;
pub mod pricing;

pub use copy_engine::EngineConfig;
