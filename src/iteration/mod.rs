// src/iteration/mod.rs — Persisted iterations and the stage controller

pub mod controller;
pub mod store;
pub mod types;

pub use controller::IterationController;
pub use store::{Artifact, IterationStore};
pub use types::*;
