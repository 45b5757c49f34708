//! `ipinfo`: ipinfo.io lookup for an IP address. The token is optional.

use super::http::ApiClient;
use super::{display_value, require_target};
use colored::Colorize;
use ipscout_core::{Module, ModuleContext, ModuleError, TargetType};
use serde_json::Value;
use std::io::Write;

const TARGETS: &[TargetType] = &[TargetType::Ip];

const HELP: &str = "ipinfo: Query ipinfo.io for details about an IP address.\n\
Usage: ipinfo\n\
Supported target types: ip";

/// First letter upper case, the rest lower case.
pub fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub struct IpInfo {
    ctx: ModuleContext,
    client: ApiClient,
    token: Option<String>,
}

impl IpInfo {
    pub fn new(ctx: ModuleContext, client: ApiClient, token: Option<String>) -> Self {
        Self { ctx, client, token }
    }
}

impl Module for IpInfo {
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
        let mut req = self.client.get(&format!("https://ipinfo.io/{target}"));
        if let Some(token) = &self.token {
            req = req.query(&[("token", token.as_str())]);
        }
        let data = self.client.json(req)?;

        writeln!(out, "{}", "IP Info:".green())?;
        if let Value::Object(map) = &data {
            for (k, v) in map {
                writeln!(out, "  {} {}", format!("{}:", capitalize(k)).yellow(), display_value(v))?;
            }
        }

        self.ctx.add_node(target, "ip")?;
        if let Some(org) = data.get("org").and_then(Value::as_str).filter(|s| !s.is_empty()) {
            self.ctx.add_node(org, "org")?;
            self.ctx.add_edge(target, org, "org")?;
        }
        // Only present on paid plans.
        if let Some(asn) = data
            .get("asn")
            .and_then(|a| a.get("asn"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            self.ctx.add_node(asn, "asn")?;
            self.ctx.add_edge(target, asn, "ASN")?;
        }
        Ok(())
    }
}
