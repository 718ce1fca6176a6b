pub mod config;
pub mod heygen_adapter;
pub mod ui;
