//! Feature integration tests

mod cache;
