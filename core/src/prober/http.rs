use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use edgeprobe_common::config::ProbeConfig;
use edgeprobe_common::measurement::ProbeResult;
use reqwest::header::CONNECTION;
use reqwest::{Client, Response, Url};
use tracing::{debug, trace};

use super::Probe;
use crate::error::ProbeError;
use crate::network::client::{ClientOptions, PinnedUrl, TargetUrl, colo_from_headers, pinned_client};

/// HEAD based probe.
///
/// The first request decides whether the candidate is usable at all
/// (status and datacenter checks); the following `ping_times` requests are
/// timed on the same connection.
pub struct HttpProbe {
    target: TargetUrl,
    options: ClientOptions,
    ping_times: u32,
    status_codes: Vec<u16>,
    colos: Option<BTreeSet<String>>,
}

impl HttpProbe {
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        Ok(Self {
            target: TargetUrl::parse(&config.url, config.port)?,
            options: ClientOptions {
                connect_timeout: config.http_timeout,
                request_timeout: Some(config.http_timeout),
                user_agent: config.user_agent.clone(),
            },
            ping_times: config.ping_times,
            status_codes: config.status_codes.clone(),
            colos: config.colos.clone(),
        })
    }

    /// Datacenter code only, without accepting or rejecting anything.
    pub async fn lookup_colo(&self, addr: IpAddr) -> Option<String> {
        let pinned: PinnedUrl = self.target.pin(addr);
        let client: Client = pinned_client(&pinned, &self.options).ok()?;
        let response: Response = client.head(pinned.url).send().await.ok()?;
        colo_from_headers(response.headers())
    }

    async fn verify(&self, client: &Client, url: &Url) -> Result<Option<String>, ProbeError> {
        let response: Response = client.head(url.clone()).send().await?;

        let status: u16 = response.status().as_u16();
        if !self.status_codes.contains(&status) {
            return Err(ProbeError::Status { status });
        }

        let colo: Option<String> = colo_from_headers(response.headers());
        if let Some(allowed) = &self.colos {
            if !colo.as_ref().is_some_and(|code| allowed.contains(code)) {
                return Err(ProbeError::Colo { colo });
            }
        }

        Ok(colo)
    }

    async fn measure(&self, addr: IpAddr) -> Result<ProbeResult, ProbeError> {
        let pinned: PinnedUrl = self.target.pin(addr);
        let client: Client = pinned_client(&pinned, &self.options)?;
        let colo: Option<String> = self.verify(&client, &pinned.url).await?;

        let mut received: u32 = 0;
        let mut total: Duration = Duration::ZERO;

        for attempt in 0..self.ping_times {
            let mut request = client.head(pinned.url.clone());
            if attempt + 1 == self.ping_times {
                request = request.header(CONNECTION, "close");
            }

            let started: Instant = Instant::now();
            match request.send().await {
                Ok(_) => {
                    received += 1;
                    total += started.elapsed();
                }
                Err(e) => trace!("{addr} attempt {attempt}: {e}"),
            }
        }

        Ok(ProbeResult::new(addr, self.ping_times, received, total).with_colo(colo))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, addr: IpAddr) -> ProbeResult {
        match self.measure(addr).await {
            Ok(result) => result,
            Err(e) => {
                debug!("{addr} rejected: {e}");
                ProbeResult::new(addr, self.ping_times, 0, Duration::ZERO)
            }
        }
    }
}
