//! Feature integration tests

mod signing;
