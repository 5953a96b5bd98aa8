//! Exporter tests: poller state handling, metrics and the HTTP routes

pub mod poller_tests;
