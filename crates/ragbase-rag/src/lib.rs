pub mod errors;
pub mod generation;
pub mod model;
pub mod prelude;
pub mod retrieval;
pub mod router;
