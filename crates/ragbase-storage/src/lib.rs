pub mod conversation;
pub mod errors;
pub mod memory;
pub mod model;
pub mod prelude;
