pub mod desktop;
pub mod icon;
pub mod ipc;
mod macros;
pub mod wm;
