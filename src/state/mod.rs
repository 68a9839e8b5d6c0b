/// State management module
///
/// This module handles all application state, including:
/// - Shared data structures (data.rs)
/// - The note list and its reconciliation rules (collection.rs)
/// - The controller driving the capabilities (client.rs)

pub mod client;
pub mod collection;
pub mod data;
