pub mod gate;
pub mod response;

pub use gate::{authorize, require_authenticated, require_staff, AccessPolicy, Caller};
pub use response::{ApiResponse, ApiResult};
