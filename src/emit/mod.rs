//! Semantic change events and the emission path: vocabulary, sink trait,
//! and the console printer thread.

pub mod console;
pub mod event;
pub mod sink;
