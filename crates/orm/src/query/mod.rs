//! Queries and statements
//!
//! [`SelectQuery`] and [`PrefetchTree`] describe what the caller wants.
//! [`SelectStatement`] is what gets handed to a statement executor.

pub mod prefetch;
pub mod select;
pub mod sql_generation;
pub mod statement;

pub use prefetch::{DepthFirst, PrefetchNode, PrefetchSemantics, PrefetchTree};
pub use select::{Expression, SelectQuery, SortOrder};
pub use statement::{
    ColumnRef, JoinClause, JoinType, OrderDirection, Predicate, SelectStatement, TableRef,
};
