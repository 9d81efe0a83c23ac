//! Tests for engine services
//!
//! Both clients are exercised against wiremock HTTP stubs so the wire
//! behavior (headers, request shape, failure mapping) is pinned down.

pub mod completion;
