//! Per-host routing between a default dialer and a bypass dialer.
//!
//! A destination is sent to the bypass dialer when its host matches one of
//! the configured rules:
//! - a literal IP address, or an IP network in CIDR form
//! - a DNS zone (`*.example.com` / `.example.com`), matching the zone apex
//!   and every name below it
//! - an exact host name
//!
//! IP rules only match destinations given as literal IPs; a named host never
//! matches an IP rule, since no resolution happens here.

use crate::context::DialContext;
use crate::dial::dial_safely;
use crate::dialer::{ContextDialer, DialError, Dialer, IoStream, Network, SharedDialer};
use crate::util::split_host_port;
use async_trait::async_trait;
use ipnet::IpNet;
use std::net::IpAddr;
use tracing::trace;

pub struct PerHost {
    default: SharedDialer,
    bypass: SharedDialer,
    bypass_networks: Vec<IpNet>,
    bypass_ips: Vec<IpAddr>,
    // stored with a leading dot
    bypass_zones: Vec<String>,
    bypass_hosts: Vec<String>,
}

impl PerHost {
    pub fn new(default: SharedDialer, bypass: SharedDialer) -> Self {
        Self {
            default,
            bypass,
            bypass_networks: Vec::new(),
            bypass_ips: Vec::new(),
            bypass_zones: Vec::new(),
            bypass_hosts: Vec::new(),
        }
    }

    /// Add rules from a comma-separated list. Each entry is a CIDR network,
    /// an IP address, a zone (`*.example.com`) or a host name. Parsing is
    /// best effort: entries that look like CIDR but do not parse are skipped.
    pub fn add_from_str(&mut self, s: &str) {
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            if entry.contains('/') {
                if let Ok(net) = entry.parse::<IpNet>() {
                    self.add_network(net);
                } else {
                    trace!(entry, "skipping unparsable bypass network");
                }
                continue;
            }
            if let Ok(ip) = entry.parse::<IpAddr>() {
                self.add_ip(ip);
                continue;
            }
            if let Some(zone) = entry.strip_prefix("*.") {
                self.add_zone(&format!(".{zone}"));
                continue;
            }
            self.add_host(entry);
        }
    }

    pub fn add_ip(&mut self, ip: IpAddr) {
        self.bypass_ips.push(ip);
    }

    pub fn add_network(&mut self, net: IpNet) {
        self.bypass_networks.push(net);
    }

    /// A zone of `example.com` matches `example.com` and all its subdomains.
    pub fn add_zone(&mut self, zone: &str) {
        let zone = zone.strip_suffix('.').unwrap_or(zone);
        let zone = if zone.starts_with('.') {
            zone.to_string()
        } else {
            format!(".{zone}")
        };
        self.bypass_zones.push(zone);
    }

    pub fn add_host(&mut self, host: &str) {
        let host = host.strip_suffix('.').unwrap_or(host);
        self.bypass_hosts.push(host.to_string());
    }

    /// Whether `host` would be routed to the bypass dialer.
    pub fn bypasses(&self, host: &str) -> bool {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return self.bypass_networks.iter().any(|n| n.contains(&ip))
                || self.bypass_ips.contains(&ip);
        }

        let zone_hit = self
            .bypass_zones
            .iter()
            .any(|zone| host.ends_with(zone.as_str()) || host == &zone[1..]);
        zone_hit || self.bypass_hosts.iter().any(|h| h == host)
    }

    fn route(&self, addr: &str) -> Result<&SharedDialer, DialError> {
        let (host, _) = split_host_port(addr)?;
        let bypass = self.bypasses(host);
        trace!(host, bypass, "per-host route");
        Ok(if bypass { &self.bypass } else { &self.default })
    }
}

impl Dialer for PerHost {
    fn dial(&self, network: Network, addr: &str) -> Result<IoStream, DialError> {
        self.route(addr)?.dial(network, addr)
    }

    fn as_context_dialer(&self) -> Option<&dyn ContextDialer> {
        Some(self)
    }
}

#[async_trait]
impl ContextDialer for PerHost {
    async fn dial_context(
        &self,
        ctx: &DialContext,
        network: Network,
        addr: &str,
    ) -> Result<IoStream, DialError> {
        let dialer = self.route(addr)?;
        dial_safely(ctx, dialer, network, addr).await
    }
}
