//! Feature integration tests

mod repackage;
