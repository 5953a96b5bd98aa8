//! Rate-limit checker tests, driven through mocked HTTP, clock and IP sources

pub mod identity_tests;
pub mod result_tests;
