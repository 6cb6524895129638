pub mod archive;
pub mod breach;
pub mod bulk;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod favicon;
pub mod item;
pub mod pool;
pub mod progress;
pub mod store;
pub mod vault;

mod util;
