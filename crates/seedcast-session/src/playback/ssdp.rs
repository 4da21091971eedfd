//! SSDP device discovery and URL hand-off.
//!
//! A single M-SEARCH datagram goes to the well-known multicast group and the
//! first matching response wins. The play request posts the access URL to
//! the control endpoint the device advertised in its LOCATION header.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

use super::{DeviceBrowser, DiscoveredDevice};

const SSDP_MULTICAST: &str = "239.255.255.250:1900";

/// Real SSDP browser used outside of tests.
pub struct SsdpBrowser {
    client: reqwest::Client,
}

impl SsdpBrowser {
    /// Browser with a fresh HTTP client for play requests.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SsdpBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceBrowser for SsdpBrowser {
    async fn discover_first(
        &self,
        search_target: &str,
        window: Duration,
    ) -> io::Result<Option<DiscoveredDevice>> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        let request = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {SSDP_MULTICAST}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: 2\r\n\
             ST: {search_target}\r\n\r\n"
        );
        socket.send_to(request.as_bytes(), SSDP_MULTICAST).await?;

        let mut buf = [0u8; 2048];
        match timeout(window, socket.recv_from(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Err(err)) => Err(err),
            Ok(Ok((len, address))) => {
                let response = String::from_utf8_lossy(&buf[..len]);
                let location = header_value(&response, "location");
                debug!(%address, ?location, "ssdp response received");
                Ok(Some(DiscoveredDevice { address, location }))
            }
        }
    }

    async fn play(&self, device: &DiscoveredDevice, url: &str) -> io::Result<()> {
        let endpoint = device
            .location
            .clone()
            .unwrap_or_else(|| format!("http://{}/", device.address));
        self.client
            .post(endpoint)
            .header("content-type", "text/plain")
            .body(url.to_owned())
            .send()
            .await
            .map_err(io::Error::other)?
            .error_for_status()
            .map_err(io::Error::other)?;
        Ok(())
    }
}

fn header_value(response: &str, name: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_owned())
    })
}
