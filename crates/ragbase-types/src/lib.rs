pub mod id;
pub mod page;
pub mod prelude;
pub mod time;
