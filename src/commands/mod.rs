pub mod config;
pub mod install;
pub mod plan;
pub mod verify;
