pub use crate::codes;
pub use crate::codes::ErrorCode;
pub use crate::model::{ErrorBuilder, ErrorObj, PublicErrorView};
pub use crate::retry::RetryClass;
