//! # Investigative Modules
//!
//! The concrete adapters registered with the shell. Each one is a thin
//! I/O wrapper (subprocess or HTTP) that prints what it found and turns
//! it into graph contributions through its `ModuleContext`.
//!
//! | name         | targets          | source                        |
//! |--------------|------------------|-------------------------------|
//! | `ping`       | ip, domain       | `ping` subprocess             |
//! | `dnslookup`  | ip, domain       | DNS resolvers (hickory)       |
//! | `cert`       | domain, url      | TLS handshake (rustls)        |
//! | `whois`      | ip, domain       | `whois` subprocess            |
//! | `nmap`       | ip               | `nmap` subprocess             |
//! | `webrequest` | ip, domain, url  | HTTP(S) probe                 |
//! | `ipinfo`     | ip               | ipinfo.io                     |
//! | `pdns`       | ip, domain       | Mnemonic passive DNS          |
//! | `shodan`     | ip, domain, url  | Shodan host API               |
//! | `stinfo`     | domain           | SecurityTrails                |
//! | `vt`         | ip, domain, url  | VirusTotal v3                 |
//! | `retarget`   | ip, domain, url  | current per-target log        |
//! | `history`    | none             | log directory                 |

pub mod cert;
pub mod dnslookup;
pub mod history;
pub mod http;
pub mod ipinfo;
pub mod nmap;
pub mod pdns;
pub mod ping;
pub mod retarget;
pub mod shodan;
pub mod stinfo;
pub mod vt;
pub mod webrequest;
pub mod whois;

use crate::config::Config;
use http::ApiClient;
use ipscout_core::{Module, ModuleContext, ModuleError, ModuleFactory, Shell};
use std::io::ErrorKind;
use std::process::{Command, Output};

/// Every module this binary knows, in registration order.
pub const MODULE_NAMES: &[&str] = &[
    "ping",
    "dnslookup",
    "cert",
    "whois",
    "nmap",
    "webrequest",
    "ipinfo",
    "pdns",
    "shodan",
    "stinfo",
    "vt",
    "retarget",
    "history",
];

/// Build the factory for `name`, or `None` for an unknown name.
pub fn factory(name: &str, config: &Config, client: &ApiClient) -> Option<ModuleFactory> {
    let keys = config.api_keys.clone();
    let client = client.clone();
    let pdns_timeout = config.network.pdns_timeout();

    let factory: ModuleFactory = match name {
        "ping" => Box::new(|ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(ping::Ping::new(ctx.clone()))
        }),
        "dnslookup" => Box::new(|ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(dnslookup::DnsLookup::new(ctx.clone()))
        }),
        "cert" => Box::new(|ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(cert::Cert::new(ctx.clone()))
        }),
        "whois" => Box::new(|ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(whois::Whois::new(ctx.clone()))
        }),
        "nmap" => Box::new(|ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(nmap::Nmap::new(ctx.clone()))
        }),
        "webrequest" => Box::new(move |ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(webrequest::WebRequest::new(ctx.clone(), client.clone()))
        }),
        "ipinfo" => Box::new(move |ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(ipinfo::IpInfo::new(ctx.clone(), client.clone(), keys.ipinfo.clone()))
        }),
        "pdns" => Box::new(move |ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(pdns::Pdns::new(ctx.clone(), client.clone(), pdns_timeout))
        }),
        "shodan" => Box::new(move |ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(shodan::Shodan::new(ctx.clone(), client.clone(), keys.shodan.clone()))
        }),
        "stinfo" => Box::new(move |ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(stinfo::StInfo::new(
                ctx.clone(),
                client.clone(),
                keys.securitytrails.clone(),
            ))
        }),
        "vt" => Box::new(move |ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(vt::VirusTotal::new(
                ctx.clone(),
                client.clone(),
                keys.virustotal.clone(),
            ))
        }),
        "retarget" => Box::new(|ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(retarget::Retarget::new(ctx.clone()))
        }),
        "history" => Box::new(|ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(history::History::new(ctx.clone()))
        }),
        _ => return None,
    };
    Some(factory)
}

/// Register every module allowed by `[modules].enabled`.
///
/// Unknown names in the list are reported and skipped.
pub fn register_all(shell: &mut Shell, config: &Config, client: &ApiClient) {
    if let Some(enabled) = &config.modules.enabled {
        for name in enabled {
            if !MODULE_NAMES.contains(&name.as_str()) {
                tracing::warn!(module = %name, "unknown module in configuration, skipped");
            }
        }
    }
    for name in MODULE_NAMES {
        if !config.modules.is_enabled(name) {
            continue;
        }
        if let Some(factory) = factory(name, config, client) {
            shell.register(*name, factory);
        }
    }
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// The effective target, or `NoTarget` for a module invoked without one.
pub fn require_target(target: Option<&str>) -> Result<&str, ModuleError> {
    target.ok_or(ModuleError::NoTarget)
}

/// Run an external tool to completion, capturing its output.
///
/// A binary that cannot be found maps to `ToolMissing`.
pub fn run_tool(tool: &str, args: &[&str]) -> Result<Output, ModuleError> {
    tracing::debug!(tool, ?args, "spawning tool");
    Command::new(tool).args(args).output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ModuleError::ToolMissing {
                tool: tool.to_string(),
            }
        } else {
            ModuleError::Failed(format!("failed to run {tool}: {e}"))
        }
    })
}

/// Render a JSON value for display: strings unquoted, everything else as JSON.
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_binary_is_tool_missing() {
        let err = run_tool("ipscout-definitely-not-installed", &[]).expect_err("must fail");
        assert!(matches!(err, ModuleError::ToolMissing { ref tool } if tool == "ipscout-definitely-not-installed"));
    }

    #[test]
    fn require_target_reports_absence() {
        assert_eq!(require_target(Some("a")).expect("target"), "a");
        assert!(matches!(require_target(None), Err(ModuleError::NoTarget)));
    }

    #[test]
    fn display_value_unquotes_strings() {
        assert_eq!(display_value(&json!("AS15169 Google LLC")), "AS15169 Google LLC");
        assert_eq!(display_value(&json!(42)), "42");
        assert_eq!(display_value(&json!(["a", "b"])), "[\"a\",\"b\"]");
    }

    #[test]
    fn every_name_has_a_factory() {
        let config = Config::default();
        let client = ApiClient::new(&config.network).expect("client");
        for name in MODULE_NAMES {
            assert!(factory(name, &config, &client).is_some(), "{name}");
        }
        assert!(factory("traceroute", &config, &client).is_none());
    }
}
