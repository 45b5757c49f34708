//! # Certificate Module
//!
//! Fetches the leaf certificate a TLS server presents and records its
//! subject, issuer organisation and DNS alternative names.
//!
//! The handshake uses rustls with the webpki root set, so a certificate
//! that does not verify is reported as a retrieval failure.

use super::require_target;
use chrono::DateTime;
use colored::Colorize;
use ipscout_core::{Module, ModuleContext, ModuleError, ReconError, TargetType, extract_hostname};
use reqwest::Url;
use ring::digest::{self, SHA1_FOR_LEGACY_USE_ONLY, SHA256};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::io::Write;
use std::net::{IpAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;
use x509_parser::time::ASN1Time;
use x509_parser::x509::{AttributeTypeAndValue, X509Name};

const TARGETS: &[TargetType] = &[TargetType::Domain, TargetType::Url];

const HELP: &str = "cert: Retrieve and display the SSL/TLS certificate for a domain or URL.\n\
Usage: cert\n\
Supported target types: domain, url";

const DEFAULT_PORT: u16 = 443;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const UNKNOWN_CN: &str = "Unknown CN";

/// The distinguished-name attributes this module reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFields {
    pub common_name: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    pub locality: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

fn first_text(attr: Option<&AttributeTypeAndValue<'_>>) -> Option<String> {
    attr.and_then(|a| a.as_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl NameFields {
    fn from_name(name: &X509Name<'_>) -> Self {
        Self {
            common_name: first_text(name.iter_common_name().next()),
            organization: first_text(name.iter_organization().next()),
            organizational_unit: first_text(name.iter_organizational_unit().next()),
            locality: first_text(name.iter_locality().next()),
            state: first_text(name.iter_state_or_province().next()),
            country: first_text(name.iter_country().next()),
        }
    }
}

/// Everything printed and graphed for one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSummary {
    pub subject: NameFields,
    pub issuer: NameFields,
    pub serial: String,
    pub version: u32,
    pub not_before: String,
    pub not_after: String,
    /// `(kind, value)` pairs, e.g. `("DNS", "www.example.com")`.
    pub alt_names: Vec<(String, String)>,
    pub sha1: String,
    pub sha256: String,
}

/// Upper-case hex bytes joined by `:`.
pub fn colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Serial number as upper-case hex without DER sign padding.
fn serial_hex(raw: &[u8]) -> String {
    let start = raw
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(raw.len().saturating_sub(1));
    raw.get(start..)
        .unwrap_or_default()
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect()
}

/// `Oct 14 10:07:36 2026 GMT`
fn display_time(time: &ASN1Time) -> String {
    DateTime::from_timestamp(time.timestamp(), 0)
        .map(|t| t.format("%b %e %H:%M:%S %Y GMT").to_string())
        .unwrap_or_else(|| time.to_string())
}

fn ip_text(bytes: &[u8]) -> String {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return IpAddr::from(octets).to_string();
    }
    if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        return IpAddr::from(octets).to_string();
    }
    colon_hex(bytes)
}

fn alt_name(name: &GeneralName<'_>) -> Option<(String, String)> {
    let (kind, value) = match name {
        GeneralName::DNSName(dns) => ("DNS", (*dns).to_string()),
        GeneralName::IPAddress(bytes) => ("IP Address", ip_text(bytes)),
        GeneralName::RFC822Name(mail) => ("email", (*mail).to_string()),
        GeneralName::URI(uri) => ("URI", (*uri).to_string()),
        _ => return None,
    };
    Some((kind.to_string(), value))
}

/// Decode a DER certificate into the fields this module reports.
pub fn summarize(der: &[u8]) -> Result<CertSummary, ModuleError> {
    let (_, cert) =
        parse_x509_certificate(der).map_err(|e| ModuleError::Parse(format!("certificate: {e}")))?;

    let alt_names = cert
        .subject_alternative_name()
        .map_err(|e| ModuleError::Parse(format!("subjectAltName: {e}")))?
        .map(|ext| ext.value.general_names.iter().filter_map(alt_name).collect())
        .unwrap_or_default();

    Ok(CertSummary {
        subject: NameFields::from_name(cert.subject()),
        issuer: NameFields::from_name(cert.issuer()),
        serial: serial_hex(cert.raw_serial()),
        version: cert.version().0.saturating_add(1),
        not_before: display_time(&cert.validity().not_before),
        not_after: display_time(&cert.validity().not_after),
        alt_names,
        sha1: colon_hex(digest::digest(&SHA1_FOR_LEGACY_USE_ONLY, der).as_ref()),
        sha256: colon_hex(digest::digest(&SHA256, der).as_ref()),
    })
}

/// One graph contribution: typed source, typed target, edge label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertLink {
    pub source: (String, &'static str),
    pub target: (String, &'static str),
    pub label: &'static str,
}

impl CertLink {
    fn new(
        source: (&str, &'static str),
        target: (&str, &'static str),
        label: &'static str,
    ) -> Self {
        Self {
            source: (source.0.to_string(), source.1),
            target: (target.0.to_string(), target.1),
            label,
        }
    }
}

/// Graph contributions for `summary` as seen on `host`.
///
/// Non-DNS alternative names are printed but not graphed.
pub fn cert_links(host: &str, summary: &CertSummary) -> Vec<CertLink> {
    let cn = summary.subject.common_name.as_deref().unwrap_or(UNKNOWN_CN);
    let subject = (cn, "cert_subject");
    let mut links = vec![CertLink::new((host, "domain"), subject, "cert_subject")];

    let metadata = [
        (&summary.subject.organization, "Org", "org"),
        (&summary.subject.country, "Country", "country"),
        (&summary.subject.state, "Region", "region"),
    ];
    for (value, label, kind) in metadata {
        if let Some(value) = value {
            links.push(CertLink::new(subject, (value.as_str(), kind), label));
        }
    }
    if let Some(org) = &summary.issuer.organization {
        links.push(CertLink::new(subject, (org.as_str(), "issuer_org"), "issued_by"));
    }
    for (kind, name) in &summary.alt_names {
        if kind == "DNS" {
            links.push(CertLink::new(subject, (name.as_str(), "san"), "SAN"));
        }
    }
    links
}

fn tls_config() -> Result<Arc<ClientConfig>, ModuleError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| ModuleError::Failed(format!("TLS setup: {e}")))?
            .with_root_certificates(roots)
            .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Complete a TLS handshake with `host:port` and return the leaf certificate.
fn fetch_leaf(host: &str, port: u16) -> Result<Vec<u8>, ModuleError> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ModuleError::Failed(format!("{host} did not resolve")))?;
    let sock = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
    sock.set_read_timeout(Some(CONNECT_TIMEOUT))?;
    sock.set_write_timeout(Some(CONNECT_TIMEOUT))?;

    let name = ServerName::try_from(host.to_string())
        .map_err(|e| ModuleError::Failed(format!("invalid server name '{host}': {e}")))?;
    let conn = ClientConnection::new(tls_config()?, name)
        .map_err(|e| ModuleError::Failed(format!("TLS setup: {e}")))?;
    let mut tls = StreamOwned::new(conn, sock);
    while tls.conn.is_handshaking() {
        tls.conn.complete_io(&mut tls.sock)?;
    }
    tracing::debug!(host, port, "TLS handshake complete");

    tls.conn
        .peer_certificates()
        .and_then(|chain| chain.first())
        .map(|leaf| leaf.as_ref().to_vec())
        .ok_or_else(|| ModuleError::Failed("server presented no certificate".to_string()))
}

fn print_field(out: &mut dyn Write, label: &str, value: Option<&str>) -> std::io::Result<()> {
    match value {
        Some(value) if !value.is_empty() => writeln!(out, "{} {value}", format!("{label}:").yellow()),
        _ => Ok(()),
    }
}

fn print_summary(summary: &CertSummary, out: &mut dyn Write) -> std::io::Result<()> {
    let s = &summary.subject;
    writeln!(out, "{}", "Subject Details:".green())?;
    print_field(out, "commonName", s.common_name.as_deref())?;
    print_field(out, "organizationName", s.organization.as_deref())?;
    print_field(out, "organizationalUnitName", s.organizational_unit.as_deref())?;
    print_field(out, "localityName", s.locality.as_deref())?;
    print_field(out, "stateOrProvinceName", s.state.as_deref())?;
    print_field(out, "countryName", s.country.as_deref())?;

    let i = &summary.issuer;
    writeln!(out, "\n{}", "Issuer Details:".green())?;
    print_field(out, "commonName", i.common_name.as_deref())?;
    print_field(out, "organizationName", i.organization.as_deref())?;
    print_field(out, "countryName", i.country.as_deref())?;

    print_field(out, "Serial Number", Some(summary.serial.as_str()))?;
    print_field(out, "Version", Some(summary.version.to_string().as_str()))?;
    print_field(out, "Not Before", Some(summary.not_before.as_str()))?;
    print_field(out, "Not After", Some(summary.not_after.as_str()))?;

    if !summary.alt_names.is_empty() {
        writeln!(out, "\n{}", "Subject Alt Names:".yellow())?;
        for (kind, name) in &summary.alt_names {
            writeln!(out, "  - {kind}: {name}")?;
        }
    }
    print_field(out, "SHA-1 Fingerprint", Some(summary.sha1.as_str()))?;
    print_field(out, "SHA-256 Fingerprint", Some(summary.sha256.as_str()))
}

pub struct Cert {
    ctx: ModuleContext,
}

impl Cert {
    pub fn new(ctx: ModuleContext) -> Self {
        Self { ctx }
    }
}

impl Module for Cert {
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
        if target.starts_with("http://") {
            writeln!(out, "{} HTTP does not use certificates.", "Error:".red())?;
            return Ok(());
        }
        let url = if target.starts_with("https://") {
            target.to_string()
        } else {
            writeln!(
                out,
                "{} Using 'https://{target}' to fetch the certificate.",
                "Note:".yellow()
            )?;
            format!("https://{target}")
        };
        let port = Url::parse(&url)
            .ok()
            .and_then(|u| u.port())
            .unwrap_or(DEFAULT_PORT);
        let host = extract_hostname(&url).ok_or(ReconError::HostExtraction)?;

        let summary = match fetch_leaf(&host, port).and_then(|der| summarize(&der)) {
            Ok(summary) => summary,
            Err(e) => {
                writeln!(out, "{} Failed to retrieve certificate: {e}", "Error:".red())?;
                return Ok(());
            }
        };

        writeln!(out, "{}", format!("Certificate for {host}:{port}").blue())?;
        print_summary(&summary, out)?;

        for link in cert_links(&host, &summary) {
            self.ctx.link(
                (&link.source.0, link.source.1),
                (&link.target.0, link.target.1),
                link.label,
            )?;
        }
        Ok(())
    }
}
