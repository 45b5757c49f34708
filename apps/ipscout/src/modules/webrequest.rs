//! # Web Request Module
//!
//! Probes HTTP and HTTPS on the usual web ports and records every port that
//! answers as a `web` node.
//!
//! Redirects are followed here rather than by the client so that each hop
//! can be reported as `<status> → <Location>`.

use super::http::ApiClient;
use super::require_target;
use colored::Colorize;
use ipscout_core::{Module, ModuleContext, ModuleError, TargetType, extract_hostname};
use reqwest::Url;
use reqwest::blocking::Response;
use reqwest::header::{HOST, LOCATION, USER_AGENT};
use std::fmt;
use std::io::Write;
use std::time::Duration;

const TARGETS: &[TargetType] = &[TargetType::Ip, TargetType::Domain, TargetType::Url];

const HELP: &str = "webrequest: Scan for HTTP(S) services across common ports, follow redirects, and display headers and response size.\n\
Usage: webrequest\n\
Supported target types: IP, domain, URL";

const SCHEMES: [&str; 2] = ["http", "https"];
const COMMON_PORTS: [u16; 4] = [80, 443, 8080, 8443];
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REDIRECTS: usize = 10;
const BROWSER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/122.0 Safari/537.36";

/// Every `<scheme>://<host>:<port>` combination probed, in order.
pub fn probe_urls(host: &str) -> Vec<(&'static str, u16, String)> {
    SCHEMES
        .iter()
        .flat_map(|scheme| {
            COMMON_PORTS
                .iter()
                .map(move |port| (*scheme, *port, format!("{scheme}://{host}:{port}")))
        })
        .collect()
}

/// One redirect response: its status and the `Location` it pointed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub status: u16,
    pub location: String,
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.status, self.location)
    }
}

/// Where a `Location` value leads from the URL that returned it.
pub fn resolve_location(current: &Url, location: &str) -> Option<Url> {
    current.join(location).ok()
}

/// The final response of a probe and the redirects taken to reach it.
#[derive(Debug)]
pub struct Probe {
    pub url: Url,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body_len: usize,
    pub hops: Vec<Hop>,
}

impl Probe {
    fn read(resp: Response, hops: Vec<Hop>) -> Self {
        let url = resp.url().clone();
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body_len = resp.bytes().map(|b| b.len()).unwrap_or(0);
        Self {
            url,
            status,
            headers,
            body_len,
            hops,
        }
    }
}

/// GET `start`, following up to ten redirects by hand.
///
/// `host` is sent as the `Host` header on the first request only.
pub fn follow_redirects(client: &ApiClient, start: Url, host: &str) -> Result<Probe, reqwest::Error> {
    let mut current = start;
    let mut hops = Vec::new();
    loop {
        let mut req = client
            .get_direct(current.as_str())
            .header(USER_AGENT, BROWSER_AGENT)
            .timeout(PROBE_TIMEOUT);
        if hops.is_empty() {
            req = req.header(HOST, host);
        }
        let resp = req.send()?;

        let status = resp.status();
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let next = location
            .as_deref()
            .filter(|_| status.is_redirection() && hops.len() < MAX_REDIRECTS)
            .and_then(|l| resolve_location(&current, l));

        match (next, location) {
            (Some(next), Some(location)) => {
                tracing::debug!(status = status.as_u16(), %next, "following redirect");
                hops.push(Hop {
                    status: status.as_u16(),
                    location,
                });
                current = next;
            }
            _ => return Ok(Probe::read(resp, hops)),
        }
    }
}

pub struct WebRequest {
    ctx: ModuleContext,
    client: ApiClient,
}

impl WebRequest {
    pub fn new(ctx: ModuleContext, client: ApiClient) -> Self {
        Self { ctx, client }
    }
}

impl Module for WebRequest {
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
        let target = require_target(target)?;
        let host = if target.starts_with("http://") || target.starts_with("https://") {
            extract_hostname(target).ok_or(ipscout_core::ReconError::HostExtraction)?
        } else {
            target.to_string()
        };

        writeln!(
            out,
            "{}",
            format!("Scanning HTTP/HTTPS services for {target}...").blue()
        )?;

        for (scheme, port, url) in probe_urls(&host) {
            let start = match Url::parse(&url) {
                Ok(start) => start,
                Err(e) => {
                    writeln!(out, "{} {e}", format!("[-] {url} failed:").red())?;
                    continue;
                }
            };
            let probe = match follow_redirects(&self.client, start, &host) {
                Ok(probe) => probe,
                Err(e) if e.is_connect() => continue,
                Err(e) => {
                    writeln!(out, "{} {e}", format!("[-] {url} failed:").red())?;
                    continue;
                }
            };

            writeln!(
                out,
                "\n{}",
                format!("[+] {} on port {port} responded:", scheme.to_uppercase()).green()
            )?;
            writeln!(out, "{} {}", "URL:".cyan(), probe.url)?;
            writeln!(out, "{} {}", "Status:".cyan(), probe.status)?;
            writeln!(out, "{}", "Headers:".cyan())?;
            for (k, v) in &probe.headers {
                writeln!(out, "  {k}: {v}")?;
            }
            writeln!(out, "{} {} bytes", "Body Size:".cyan(), probe.body_len)?;
            if !probe.hops.is_empty() {
                writeln!(out, "{}", "Redirect chain:".yellow())?;
                for hop in &probe.hops {
                    writeln!(out, "  {hop}")?;
                }
            }

            let node = format!("{scheme}://{host}:{port}");
            self.ctx.add_node(&node, "web")?;
            self.ctx.add_edge(
                target,
                &node,
                &format!("{} {}", scheme.to_uppercase(), probe.status),
            )?;
        }
        Ok(())
    }
}
