#![cfg(any(test, feature = "testing"))]

// Testing utilities for sling-mock crates
//
// This module provides adapter factories and adaptable fixtures for exercising
// the adapter manager without hand-writing factory implementations in every test.
//
// Usage:
// - Use `MockAdapterFactory` to observe which factory answered a lookup and how often it was called
// - Toggle `set_should_decline` to simulate a factory that cannot adapt
// - Wrap a `TypeRef` in `TestAdaptable` to get an object the manager can resolve
//
// Note: Enable the `testing` feature to use these from another crate's tests

pub mod mock_adapter_factory;
pub mod test_adaptable;

pub use mock_adapter_factory::{MockAdapter, MockAdapterFactory};
pub use test_adaptable::TestAdaptable;
