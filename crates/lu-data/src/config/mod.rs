//! Provider configuration

pub mod missing;
pub mod provider_config;

pub use missing::*;
pub use provider_config::*;
