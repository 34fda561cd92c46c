//! Utility functions shared across the engine.
//!
//! - **URL identity**: canonicalization and relative-reference resolution,
//!   used for every dedup and "already subscribed" comparison
//! - **Text sanitation**: turning feed-supplied HTML into a bounded
//!   plain-text preview

pub mod text;
pub mod url;

pub use text::sanitize_content;
pub use url::{base_origin, canonicalize, resolve_relative, CanonicalUrl};
