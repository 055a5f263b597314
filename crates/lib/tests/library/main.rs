//! Library integration tests.

mod build_tests;
mod moduleset_tests;
