//! Integration tests for the archiver
//!
//! These tests use wiremock to stand in for the archived sites and run
//! the full crawl cycle end-to-end against temporary stores.

mod booth_tests;
mod common;
mod crawl_tests;
mod index_tests;
