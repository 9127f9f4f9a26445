//! Feature integration tests

mod loading;
