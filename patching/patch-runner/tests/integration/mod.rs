//! Feature integration tests

mod pipeline;
