pub mod error;
pub mod models;

pub use error::{PkiError, Result};
pub use models::*;
