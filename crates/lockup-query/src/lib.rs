//! lockup-query
//!
//! Query layer over the lockup engine. Maps each `QueryRequest` variant to
//! the matching engine read and renders human-readable lock summaries.

pub mod querier;

pub use querier::LockupQuerier;
