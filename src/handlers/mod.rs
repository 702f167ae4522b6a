// src/handlers/mod.rs
pub mod error;
pub mod market_data;
pub mod model;
