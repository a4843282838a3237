//! Tests for the migrator CLI runtime.
