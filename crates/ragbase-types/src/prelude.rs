pub use crate::id::Id;
pub use crate::page::{Page, PageRequest, MAX_PAGE_SIZE};
pub use crate::time::Timestamp;
