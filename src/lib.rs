// src/lib.rs — Library root for specloop

pub mod api;
pub mod claims;
pub mod cli;
pub mod infra;
pub mod iteration;
pub mod pipeline;
pub mod provider;
