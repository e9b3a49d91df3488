//! Registry workflow integration tests.

mod assignment;
