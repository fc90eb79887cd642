pub mod config;
pub mod consent;
pub mod deliver;
pub mod disable;
pub mod pending;
pub mod schedule;
pub mod system;
