//! HTTP clients pinned to one candidate address.
//!
//! The request URL keeps its host name (for SNI and the `Host` header) while
//! the connection goes to the candidate. A URL whose host is an IP literal is
//! rewritten to the candidate instead.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use reqwest::header::{HeaderMap, SERVER};
use reqwest::redirect::Policy;
use reqwest::{Client, Url};

use crate::error::ProbeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    url: Url,
}

impl TargetUrl {
    /// Parses `raw` and forces its port to `port`.
    pub fn parse(raw: &str, port: u16) -> Result<Self, ProbeError> {
        let invalid = |reason: &str| ProbeError::Url {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut url: Url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("only http and https are supported"));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        url.set_port(Some(port))
            .map_err(|()| invalid("port cannot be set"))?;

        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(443)
    }

    pub fn pin(&self, addr: IpAddr) -> PinnedUrl {
        let mut url: Url = self.url.clone();
        let socket_addr: SocketAddr = SocketAddr::new(addr, self.port());

        let resolve: Option<(String, SocketAddr)> = match url.domain() {
            Some(domain) => Some((domain.to_string(), socket_addr)),
            None => {
                // IP literal hosts always accept an IP replacement.
                let _ = url.set_ip_host(addr);
                None
            }
        };

        PinnedUrl { url, resolve }
    }
}

#[derive(Debug, Clone)]
pub struct PinnedUrl {
    pub url: Url,
    /// Name override handed to the client, absent for IP literal URLs.
    pub resolve: Option<(String, SocketAddr)>,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    /// Whole-request bound; `None` leaves timing to the caller.
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

/// Builds a client that never follows redirects and never uses a proxy.
pub fn pinned_client(pinned: &PinnedUrl, options: &ClientOptions) -> Result<Client, ProbeError> {
    let mut builder = Client::builder()
        .redirect(Policy::none())
        .no_proxy()
        .connect_timeout(options.connect_timeout)
        .user_agent(options.user_agent.as_str());

    if let Some(request_timeout) = options.request_timeout {
        builder = builder.timeout(request_timeout);
    }
    if let Some((domain, socket_addr)) = &pinned.resolve {
        builder = builder.resolve(domain, *socket_addr);
    }

    Ok(builder.build()?)
}

/// Three-letter datacenter code of the serving edge, if the response names one.
///
/// Cloudflare carries it at the end of `cf-ray`, CloudFront in `x-amz-cf-pop`.
pub fn colo_from_headers(headers: &HeaderMap) -> Option<String> {
    let behind_cloudflare: bool = headers
        .get(SERVER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|server| server.trim().eq_ignore_ascii_case("cloudflare"));

    let header: &str = if behind_cloudflare { "cf-ray" } else { "x-amz-cf-pop" };
    let value: &str = headers.get(header)?.to_str().ok()?;
    colo_code(value)
}

/// First run of three upper-case ASCII letters.
pub fn colo_code(value: &str) -> Option<String> {
    value
        .as_bytes()
        .windows(3)
        .find(|window| window.iter().all(u8::is_ascii_uppercase))
        .map(|window| String::from_utf8_lossy(window).into_owned())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
