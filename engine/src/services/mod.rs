//! Engine service implementations
//!
//! The side-effectful collaborators: the completion client, the target
//! client and the in-memory stores.

pub mod completion;
pub mod stores;
pub mod target;

#[cfg(test)]
pub mod tests;

pub use completion::*;
pub use stores::*;
pub use target::*;
