//! CLI integration tests.

mod build_tests;
mod plan_tests;
