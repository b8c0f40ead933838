pub mod config;
pub mod controller;
pub mod events;
pub mod input;
pub mod menu;
pub mod providers;
pub mod sys;
