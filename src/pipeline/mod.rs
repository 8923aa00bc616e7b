// src/pipeline/mod.rs — Stateless forward/reverse pipelines

pub mod forward;
pub mod reverse;
pub mod types;
pub mod usage;

use std::collections::HashSet;

pub use forward::ForwardPipeline;
pub use reverse::ReversePipeline;
pub use types::*;
pub use usage::{Usage, UsageMeter};

/// Fresh id attached to every pipeline response and error envelope.
pub fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().simple())
}

/// Keep the first item for each key, preserving order.
pub(crate) fn first_by_id<T>(
    items: impl Iterator<Item = T>,
    key: impl Fn(&T) -> String,
) -> Vec<T> {
    let mut seen = HashSet::new();
    items.filter(|i| seen.insert(key(i))).collect()
}
