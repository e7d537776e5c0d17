pub mod appconfig;
pub mod display;
pub mod error;
pub mod guard;
pub mod guid;
pub mod logger;
pub mod settings;

pub use appconfig::AppConfig;
pub use error::AppError;
pub use guid::CompactGuid;
