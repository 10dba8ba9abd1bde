pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod types;

pub use error::QueryError;
pub use filter::compose;
pub use filter_order::ID_TIEBREAK;
pub use types::*;
