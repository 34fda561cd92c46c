//! rivulet — a concurrent feed fetch-and-merge engine.
//!
//! rivulet takes a set of subscribed URLs, classifies each response as an
//! HTML page or a feed document, normalizes RSS/Atom/JSON Feed/RDF payloads
//! into one canonical [`feed::Feed`] model, discovers feed links and site
//! icons where metadata is missing, and merges newly observed entries into
//! a SQLite store without duplication. The whole cycle runs under a
//! bounded-concurrency orchestrator with per-feed timeout and retry budgets.
//!
//! Module map:
//!
//! - [`util`] — URL canonicalization and entry-content sanitation
//! - [`fetch`] — HTTP retrieval and HTML-vs-feed classification
//! - [`feed`] — canonical model, format normalizer, discovery, merge planner
//! - [`store`] — persistent feed/entry store (SQLite via sqlx)
//! - [`refresh`] — the bounded-concurrency refresh orchestrator
//! - [`wire`] — JSON payload types for the fetch-service boundary

pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod refresh;
pub mod store;
pub mod util;
pub mod wire;
