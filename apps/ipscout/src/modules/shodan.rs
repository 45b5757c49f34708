//! # Shodan Module
//!
//! Host lookup against the Shodan API. Domains (and URL hosts) are first
//! resolved to their first IPv4 address.

use super::http::ApiClient;
use super::{display_value, require_target};
use colored::Colorize;
use ipscout_core::{Module, ModuleContext, ModuleError, ReconError, TargetType, extract_hostname};
use serde_json::Value;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

const TARGETS: &[TargetType] = &[TargetType::Ip, TargetType::Domain, TargetType::Url];

const HELP: &str = "shodan: Query Shodan for info about an IP address (or domain → IP).\n\
Usage: shodan\n\
Supported target types: ip, domain, url\n\
Requires: Shodan API key ([api_keys].shodan or IPSCOUT_SHODAN_KEY)";

const API_BASE: &str = "https://api.shodan.io/shodan/host";

/// All IPv4 addresses `host` resolves to, in resolver order.
fn resolve_ipv4(host: &str) -> Result<Vec<Ipv4Addr>, ModuleError> {
    let addrs = (host, 0)
        .to_socket_addrs()
        .map_err(|e| ModuleError::Failed(format!("DNS resolution failed: {e}")))?;
    let mut ips: Vec<Ipv4Addr> = Vec::new();
    for addr in addrs {
        if let IpAddr::V4(ip) = addr.ip() {
            if !ips.contains(&ip) {
                ips.push(ip);
            }
        }
    }
    Ok(ips)
}

/// Service banner: product, else HTTP title.
pub fn service_name(svc: &Value) -> Option<&str> {
    svc.get("product")
        .and_then(Value::as_str)
        .or_else(|| svc.pointer("/http/title").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn field(data: &Value, key: &str, fallback: &str) -> String {
    match data.get(key) {
        Some(Value::Null) | None => fallback.to_string(),
        Some(v) => display_value(v),
    }
}

pub struct Shodan {
    ctx: ModuleContext,
    client: ApiClient,
    api_key: Option<String>,
}

impl Shodan {
    pub fn new(ctx: ModuleContext, client: ApiClient, api_key: Option<String>) -> Self {
        Self {
            ctx,
            client,
            api_key,
        }
    }

    fn print_report(&self, data: &Value, out: &mut dyn Write) -> Result<(), ModuleError> {
        writeln!(out, "\n{}", "General Information:".green())?;
        writeln!(out, "  {} {}", "IP:".yellow(), field(data, "ip_str", "N/A"))?;
        writeln!(out, "  {}", "Hostnames:".yellow())?;
        for h in data.get("hostnames").and_then(Value::as_array).into_iter().flatten() {
            writeln!(out, "    - {}", display_value(h))?;
        }
        writeln!(out, "  {} {}", "Organization:".yellow(), field(data, "org", "N/A"))?;
        writeln!(out, "  {} {}", "Operating System:".yellow(), field(data, "os", "Unknown"))?;
        writeln!(
            out,
            "  {} {}, {}",
            "City:".yellow(),
            field(data, "city", "N/A"),
            field(data, "country_name", "N/A")
        )?;
        writeln!(out, "  {} {}", "ISP:".yellow(), field(data, "isp", "N/A"))?;
        writeln!(out, "  {} {}", "ASN:".yellow(), field(data, "asn", "N/A"))?;

        let mut ports: Vec<u64> = data
            .get("ports")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_u64)
            .collect();
        ports.sort_unstable();
        if !ports.is_empty() {
            writeln!(out, "\n{}", "Open Ports:".green())?;
            for port in &ports {
                writeln!(out, "  - {port}")?;
            }
        }

        if let Some(services) = data.get("data").and_then(Value::as_array).filter(|s| !s.is_empty()) {
            writeln!(out, "\n{}", "Detected Services:".green())?;
            for svc in services {
                let port = field(svc, "port", "?");
                let banner = service_name(svc).unwrap_or("Unknown service");
                writeln!(out, "  {} {banner}", format!("Port {port}:").yellow())?;
            }
        }
        Ok(())
    }

    fn record(&self, fallback_ip: &str, data: &Value) -> Result<(), ReconError> {
        let ip = data.get("ip_str").and_then(Value::as_str).unwrap_or(fallback_ip);
        self.ctx.add_node(ip, "ip")?;

        for h in data.get("hostnames").and_then(Value::as_array).into_iter().flatten() {
            if let Some(h) = h.as_str() {
                self.ctx.add_node(h, "hostname")?;
                self.ctx.add_edge(ip, h, "hostname")?;
            }
        }
        for port in data.get("ports").and_then(Value::as_array).into_iter().flatten() {
            let node = format!("port_{}", display_value(port));
            self.ctx.add_node(&node, "port")?;
            self.ctx.add_edge(ip, &node, "port")?;
        }
        for svc in data.get("data").and_then(Value::as_array).into_iter().flatten() {
            if let Some(service) = service_name(svc) {
                let node = format!("svc_{}_{service}", field(svc, "port", "?"));
                self.ctx.add_node(&node, "service")?;
                self.ctx.add_edge(ip, &node, "service")?;
            }
        }
        if let Some(org) = data.get("org").and_then(Value::as_str).filter(|s| !s.is_empty()) {
            self.ctx.add_node(org, "org")?;
            self.ctx.add_edge(ip, org, "org")?;
        }
        if let Some(asn) = data.get("asn").and_then(Value::as_str).filter(|s| !s.is_empty()) {
            self.ctx.add_node(asn, "asn")?;
            self.ctx.add_edge(ip, asn, "asn")?;
        }
        Ok(())
    }
}

impl Module for Shodan {
    fn targets(&self) -> &[TargetType] {
        TARGETS
    }

    fn help(&self) -> &str {
        HELP
    }

    fn run(
        &mut self,
        target: Option<&str>,
        _args: &[String],
        out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        let key = self.api_key.clone().ok_or_else(|| ModuleError::MissingApiKey {
            service: "Shodan".to_string(),
        })?;
        let original = require_target(target)?;

        let mut host = original.to_string();
        if original.starts_with("http://") || original.starts_with("https://") {
            host = extract_hostname(original).ok_or(ReconError::HostExtraction)?;
            writeln!(
                out,
                "{} Extracted domain '{host}' from URL '{original}'.",
                "Note:".yellow()
            )?;
        }

        let ip = match host.parse::<Ipv4Addr>() {
            Ok(ip) => ip,
            Err(_) => {
                let ips = resolve_ipv4(&host)?;
                let first = *ips
                    .first()
                    .ok_or_else(|| ModuleError::Failed("No A records found.".to_string()))?;
                if ips.len() > 1 {
                    writeln!(out, "{} Multiple IPs found. Using first: {first}", "Note:".yellow())?;
                }
                writeln!(out, "{} Using resolved IP: {first}", "Note:".yellow())?;
                first
            }
        };
        let ip = ip.to_string();

        writeln!(out, "{} {ip}", "Querying Shodan for IP:".blue())?;
        let req = self
            .client
            .get(&format!("{API_BASE}/{ip}"))
            .query(&[("key", key.as_str())]);
        let data = match self.client.json(req) {
            Ok(data) => data,
            Err(ModuleError::HttpStatus { status: 404, .. }) => {
                writeln!(out, "{}", format!("No Shodan data found for {ip}.").yellow())?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.print_report(&data, out)?;
        self.record(&ip, &data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_name_prefers_product() {
        assert_eq!(service_name(&json!({"product": "nginx", "http": {"title": "Hi"}})), Some("nginx"));
        assert_eq!(service_name(&json!({"http": {"title": "Welcome"}})), Some("Welcome"));
        assert_eq!(service_name(&json!({"port": 22})), None);
    }

    #[test]
    fn field_fallbacks() {
        let data = json!({"org": "Example", "os": null, "port": 443});
        assert_eq!(field(&data, "org", "N/A"), "Example");
        assert_eq!(field(&data, "os", "Unknown"), "Unknown");
        assert_eq!(field(&data, "isp", "N/A"), "N/A");
        assert_eq!(field(&data, "port", "?"), "443");
    }

    #[test]
    fn localhost_resolves_to_ipv4() {
        let ips = resolve_ipv4("127.0.0.1").expect("resolve");
        assert_eq!(ips, vec![Ipv4Addr::LOCALHOST]);
    }
}
