//! # Oblate environment state
//!
//! This module defines [`OblateEnv`], the shared environment object used across the
//! `oblate` library. It owns the persistent **HTTP client** used to fetch atmosphere
//! grid files from the remote archive when they are not available locally.
//!
//! The object is cheaply cloneable and is passed to the tiered grid-file source so that
//! all remote fetches share one agent and one timeout policy.

use std::convert::TryFrom;
use std::{fmt::Debug, time::Duration};
use ureq::{
    http::{self, Uri},
    Agent,
};

use crate::oblate_errors::OblateError;

/// Shared environment: a single HTTP client with a global timeout.
///
/// # Fields
///
/// * `http_client` - A ureq agent used for all remote grid-file fetches
#[derive(Debug, Clone)]
pub struct OblateEnv {
    pub http_client: Agent,
}

impl Default for OblateEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl OblateEnv {
    /// Create a new environment with an HTTP client configured for grid-file downloads.
    /// Grid files are a few tens of megabytes, hence the generous global timeout.
    pub fn new() -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(120)))
            .build();
        let agent: Agent = config.into();

        OblateEnv { http_client: agent }
    }

    /// Perform a GET request and return the raw response body.
    ///
    /// Arguments
    /// -----------------
    /// * `url`: the resource to fetch.
    ///
    /// Return
    /// ----------
    /// * The response bytes, or an [`OblateError`] if the request or read fails.
    pub(crate) fn get_bytes<U>(&self, url: U) -> Result<Vec<u8>, OblateError>
    where
        Uri: TryFrom<U>,
        <Uri as TryFrom<U>>::Error: Into<http::Error>,
    {
        let bytes = self
            .http_client
            .get(url)
            .call()?
            .body_mut()
            .read_to_vec()?;
        Ok(bytes)
    }
}
