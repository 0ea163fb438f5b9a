pub mod collect;
pub mod config;
pub mod evaluate;
pub mod mock;
pub mod seed;
pub mod state;
