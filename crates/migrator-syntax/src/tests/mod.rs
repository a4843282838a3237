//! Tests for migrator-syntax.
