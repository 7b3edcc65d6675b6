use anyhow::{Context, Result};
use reqwest::{blocking::Client, redirect};
use std::time::Duration;

/// Create the blocking HTTP client used for reachability probes
///
/// The console serves a self-signed certificate on its TLS endpoints and
/// answers the bare address with redirects, so certificate validation is off
/// and redirects are reported instead of followed.
///
/// # Arguments
/// * `timeout` - Upper bound for a single request, connect included
///
/// # Examples
/// ```no_run
/// use fritz_provision::http_client::probe_client;
/// use std::time::Duration;
///
/// let client = probe_client(Duration::from_secs(3)).expect("failed to create client");
/// ```
pub fn probe_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(redirect::Policy::none())
        .danger_accept_invalid_certs(true)
        .build()
        .context("failed to create probe HTTP client")
}
