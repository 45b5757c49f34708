//! # VirusTotal Module
//!
//! VirusTotal v3 report for an IP, domain or URL. URL reports are fetched
//! by their unpadded base64url identifier.

use super::http::ApiClient;
use super::{display_value, require_target};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use colored::Colorize;
use ipscout_core::{Module, ModuleContext, ModuleError, ReconError, TargetType, classify};
use serde_json::{Map, Value};
use std::io::Write;

const TARGETS: &[TargetType] = &[TargetType::Ip, TargetType::Domain, TargetType::Url];

const HELP: &str = "vt: Query VirusTotal for IP, domain, or URL information.\n\
Usage: vt\n\
Supported target types: ip, domain, url\n\
Requires: VirusTotal API key ([api_keys].virustotal or IPSCOUT_VT_KEY)";

const API_BASE: &str = "https://www.virustotal.com/api/v3";
const TOOL_NODE: &str = "virustotal";

/// API path for a target of the given type.
pub fn endpoint(target: &str, kind: TargetType) -> String {
    match kind {
        TargetType::Ip => format!("/ip_addresses/{target}"),
        TargetType::Domain => format!("/domains/{target}"),
        TargetType::Url => format!("/urls/{}", URL_SAFE_NO_PAD.encode(target)),
    }
}

/// Engines whose verdict is neither `harmless` nor `undetected`.
pub fn flagged_engines(attributes: &Value) -> Vec<(String, String)> {
    let Some(results) = attributes
        .get("last_analysis_results")
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };
    results
        .iter()
        .filter_map(|(engine, result)| {
            let category = result
                .get("category")
                .and_then(Value::as_str)
                .unwrap_or_default();
            (!matches!(category, "harmless" | "undetected"))
                .then(|| (engine.clone(), category.to_string()))
        })
        .collect()
}

/// Non-zero entries of `last_analysis_stats`.
pub fn positive_stats(attributes: &Value) -> Vec<(String, u64)> {
    attributes
        .get("last_analysis_stats")
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .filter_map(|(key, val)| val.as_u64().filter(|v| *v > 0).map(|v| (key.clone(), v)))
        .collect()
}

/// Falsy in the JSON sense: null, false, zero, empty string or container.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_i64() == Some(0) || n.as_u64() == Some(0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        Value::Object(map) => render_map(map),
        other => display_value(other),
    }
}

fn render_map(map: &Map<String, Value>) -> String {
    map.iter()
        .map(|(k, v)| format!("{k}: {}", display_value(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn paint(category: &str, text: String) -> colored::ColoredString {
    match category {
        "malicious" => text.red(),
        "suspicious" => text.yellow(),
        "phishing" => text.magenta(),
        _ => text.bright_black(),
    }
}

pub struct VirusTotal {
    ctx: ModuleContext,
    client: ApiClient,
    api_key: Option<String>,
}

impl VirusTotal {
    pub fn new(ctx: ModuleContext, client: ApiClient, api_key: Option<String>) -> Self {
        Self {
            ctx,
            client,
            api_key,
        }
    }

    fn record(&self, target: &str, kind: TargetType, attributes: &Value) -> Result<(), ReconError> {
        self.ctx
            .link((target, kind.as_str()), (TOOL_NODE, "tool"), "vt_query")?;

        for tag in attributes.get("tags").and_then(Value::as_array).into_iter().flatten() {
            let tag = display_value(tag);
            self.ctx.add_node(&tag, "vt_tag")?;
            self.ctx.add_edge(TOOL_NODE, &tag, "tag")?;
        }
        for category in attributes
            .get("categories")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|m| m.values())
        {
            let category = display_value(category);
            self.ctx.add_node(&category, "vt_category")?;
            self.ctx.add_edge(TOOL_NODE, &category, "category")?;
        }
        if let Some(rep) = attributes.get("reputation").filter(|v| !v.is_null()) {
            let node = format!("vt_reputation:{}", display_value(rep));
            self.ctx.add_node(&node, "vt_score")?;
            self.ctx.add_edge(TOOL_NODE, &node, "reputation")?;
        }
        for (key, val) in positive_stats(attributes) {
            let node = format!("vt_{key}:{val}");
            self.ctx.add_node(&node, "vt_stat")?;
            self.ctx.add_edge(TOOL_NODE, &node, "analysis")?;
        }
        Ok(())
    }
}

impl Module for VirusTotal {
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
            service: "VirusTotal".to_string(),
        })?;
        let target = require_target(target)?;
        let kind = classify(target);

        let req = self
            .client
            .get(&format!("{API_BASE}{}", endpoint(target, kind)))
            .header("x-apikey", key);
        let data = self.client.json(req)?;

        writeln!(out, "{}\n", format!("VirusTotal results for {target} ({kind}):").blue())?;
        let empty = Value::Object(Map::new());
        let attributes = data.pointer("/data/attributes").unwrap_or(&empty);

        let fields = [
            ("Reputation", "reputation"),
            ("Last Analysis Stats", "last_analysis_stats"),
            ("Categories", "categories"),
            ("Tags", "tags"),
            ("ASN", "asn"),
            ("ISP", "isp"),
            ("Country", "country"),
        ];
        for (label, key) in fields {
            if let Some(value) = attributes.get(key).filter(|v| !is_blank(v)) {
                writeln!(out, "{} {}", format!("{label}:").yellow(), render(value))?;
            }
        }

        let flagged = flagged_engines(attributes);
        if !flagged.is_empty() {
            writeln!(out, "\n{}", "Last Analysis Results (Filtered):".green())?;
            for (engine, category) in &flagged {
                writeln!(out, "  {}", paint(category, format!("{engine}: {category}")))?;
            }
        }

        self.record(target, kind, attributes)?;
        Ok(())
    }
}
