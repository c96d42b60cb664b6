//! `frolf-bot` - the Discord edge of the frolf platform
//!
//! Turns Discord interactions into bus requests and backend events into
//! Discord messages, for many guilds at once. Each guild's configuration is
//! fetched over the bus on demand and cached locally.

// Deny the most critical lints that could lead to bugs or security issues
#![deny(
    // Security and correctness
    unsafe_code,
    unsafe_op_in_unsafe_fn,

    // Code quality - things that are almost always bugs
    unreachable_code,
    unreachable_patterns,
    unused_must_use,

    // Documentation - broken links are bugs
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
// Warn on things that should be fixed but aren't necessarily bugs
#![warn(
    // Documentation - missing docs should be added gradually
    missing_docs,

    // Clippy categories for overall code quality
    clippy::all,
    clippy::pedantic,
    clippy::nursery,

    // Performance
    clippy::inefficient_to_string,
    clippy::large_types_passed_by_value,
    clippy::needless_pass_by_value,
    clippy::unnecessary_wraps,

    // Correctness
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::exit,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,

    // Complexity and readability
    clippy::cognitive_complexity,
    clippy::large_enum_variant,
    clippy::match_same_arms,
    clippy::too_many_lines,

    // Style consistency
    clippy::enum_glob_use,
    clippy::inconsistent_struct_constructor,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::redundant_closure_for_method_calls,
    clippy::semicolon_if_nothing_returned,
    clippy::wildcard_imports,

    // Future compatibility
    future_incompatible,
    rust_2018_idioms,
)]
// Allow some pedantic lints that are too noisy or not applicable
#![allow(
    clippy::module_name_repetitions,  // Common pattern in Rust
    clippy::missing_errors_doc,        // Will add gradually
    clippy::missing_panics_doc,        // Will add gradually
)]

// `missing_docs` stays a warning: bus payload and port types are documented
// as they settle.

/// Discord side: interaction routing, handlers, session port, command lifecycle
pub mod bot;
/// Message bus envelope, topics, publisher port and NATS transport
pub mod bus;
/// Tenant-aware LRU/TTL guild config cache
pub mod cache;
/// Application configuration loading
pub mod config;
/// TTL store for deferred interactions
pub mod correlation;
/// Unified error types and result handling
pub mod errors;
/// Bus handlers for backend and Discord-originated events
pub mod handlers;
/// Handler and resolver counters
pub mod metrics;
/// Domain data: guild config, permissions, interactions, bus payloads
pub mod models;
/// Coalescing guild config resolver
pub mod resolver;
/// Bus router with middleware and output-topic policy
pub mod router;

#[cfg(test)]
pub mod test_utils;
