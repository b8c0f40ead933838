pub mod loader;
pub mod runtime;
pub mod server;
pub mod store;
pub mod ticker;
