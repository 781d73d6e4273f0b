pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod layout;
pub mod process;
pub mod year;

pub use config::{Config, FailurePolicy};
pub use error::{ConversionError, FarsError};
pub use layout::Layout;
pub use year::Year;
