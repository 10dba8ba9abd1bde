pub mod extract;

pub use extract::{entity_id, JsonObject, QueryParams};
