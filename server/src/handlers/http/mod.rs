pub mod routes;
pub mod utils;

pub use routes::{Router, build_api_router};
