//! Tests for migrator-rules.
