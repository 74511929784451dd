//! Message Store Tests

mod retention_tests;
