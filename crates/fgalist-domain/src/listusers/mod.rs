//! ListUsers: which subjects hold a relation on an object.
//!
//! A request is expanded recursively over the rewrite rules of the model.
//! Each relation's rewrite is evaluated by kind:
//!
//! ```text
//! this                  -> read tuples, emit subjects, dispatch usersets
//! computed_userset      -> dispatch the other relation on the same object
//! tuple_to_userset      -> read the tupleset, dispatch on each parent
//! union / intersection  -> fan out to children, merge per-child results
//! exclusion             -> drain base and subtract, then subtract
//! ```
//!
//! Found users stream over bounded channels to the query, which
//! deduplicates them and stops at the result cap or the deadline.

mod config;
mod context;
mod expand;
mod pool;
mod query;
mod set_ops;
mod storage;
mod throttle;
mod traits;
mod types;
mod validation;

#[cfg(test)]
pub(crate) mod tests;

pub use config::{DispatchThrottlingConfig, ListUsersConfig};
pub use query::ListUsersQuery;
pub use storage::RequestTupleReader;
pub use throttle::{should_throttle, ConstantRateThrottler, Throttler};
pub use traits::{ReadFilter, ReadOptions, TupleReader, TupleStream};
pub use types::{
    ConsistencyPreference, FoundUser, ListUsersMetadata, ListUsersRequest, ListUsersResponse,
    RelationshipStatus, UserFilter,
};
pub use validation::validate_request;
