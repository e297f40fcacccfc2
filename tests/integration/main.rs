//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! compliance gate, the fetch strategies and the validation path end-to-end.

mod common;
mod compliance_tests;
mod fetch_tests;
mod pipeline_tests;
