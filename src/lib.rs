pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod derived;
pub mod gaps;
pub mod importers;
pub mod normalize;
pub mod services;
pub mod utils;
