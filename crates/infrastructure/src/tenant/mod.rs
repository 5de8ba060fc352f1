pub mod pool_manager;
pub mod registry;
