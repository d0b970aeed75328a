// Shared types and path logic for rmirr

pub mod config;
pub mod endpoint;
pub mod mirrors;
pub mod resolve;
pub mod validation;

pub use config::RmirrConfig;
pub use endpoint::Endpoint;
pub use mirrors::{Defaults, MirrorRule, MirrorsConfig};
pub use resolve::{Resolution, resolve};
pub use validation::{ValidationError, ValidationResult};
