//! Tests for ListUsers resolution.
//!
//! Organized by functionality:
//! - Direct tuples, wildcards and userset filters
//! - Computed usersets and tuple-to-userset
//! - Union, intersection and exclusion
//! - Cycles and depth limits
//! - Result caps, deadlines and throttling
//! - Conditions and contextual tuples
//! - Error propagation

pub(crate) mod mocks;
