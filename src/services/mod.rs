// src/services/mod.rs
pub mod black_litterman;
pub mod defi_llama;
pub mod equilibrium;
pub mod error;
pub mod market_data;
pub mod model;
pub mod optimizer;
pub mod views;
