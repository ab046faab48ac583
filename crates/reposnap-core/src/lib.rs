pub mod error;
pub mod status;
pub mod types;
pub mod validate;

pub use error::{CloneError, ProcessError, ProcessErrorKind};
pub use status::{CloneStatus, ErrorClass, PublicError, PublicResult};
pub use types::*;
pub use validate::ValidationError;
