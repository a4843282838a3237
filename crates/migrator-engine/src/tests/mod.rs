//! Tests for migrator-engine.

mod behaviour;
mod unit;
