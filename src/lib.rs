pub mod atmosphere;
pub mod config;
pub mod constants;
pub mod env_state;
pub mod evolution;
pub mod filters;
pub mod fit;
pub mod geometry;
pub mod luminosity;
mod numeric;
pub mod oblate;
pub mod oblate_errors;
pub mod observations;
pub mod photometry;
pub mod projection;
pub mod simplex;
pub mod visibility;

pub use crate::oblate::Oblate;
pub use crate::oblate_errors::OblateError;
