//! Integration tests for the harvester
//!
//! Controller scenarios run against scripted collaborators; pipeline tests
//! use wiremock to serve a small shop and run a full harvest.

mod controller_tests;
mod pipeline_tests;
mod storage_tests;
mod support;
