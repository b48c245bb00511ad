//! Session-backed HTTP client.
//!
//! # Design
//! `HttpApiClient` concretizes the contract in [`crate::client`] on top of a
//! persistent [`ureq::Agent`]. The agent exists only between
//! `open_connection` and `close_connection`; `is_open` reflects the reference
//! itself, never exception state. Default headers are an ordered list applied
//! to every request, with caller-supplied per-call headers taking precedence.
//! The client performs blocking calls, owns its transport exclusively, and is
//! not safe for concurrent use from multiple threads.

use std::path::PathBuf;

use log::debug;
use serde_json::Value;
use ureq::tls::{Certificate, RootCerts, TlsConfig};
use ureq::Agent;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::host::{self, ApiDefaults};
use crate::http::{ApiResponse, HttpMethod};

/// Certificate verification policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VerifyCert {
    /// Validate against the built-in root store.
    #[default]
    On,
    /// Skip certificate validation entirely.
    Off,
    /// Validate against a PEM trust bundle on disk.
    CaFile(PathBuf),
}

impl From<bool> for VerifyCert {
    fn from(enabled: bool) -> Self {
        if enabled {
            VerifyCert::On
        } else {
            VerifyCert::Off
        }
    }
}

impl From<PathBuf> for VerifyCert {
    fn from(path: PathBuf) -> Self {
        VerifyCert::CaFile(path)
    }
}

/// How the `Accept` header is derived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Accept {
    /// Mirror the request content type, falling back to `*/*`.
    #[default]
    Mirror,
    /// Send a fixed value.
    Value(String),
    /// Send no `Accept` header.
    Skip,
}

/// Declarative option set a client type contributes.
///
/// Profiles compose explicitly: a derived client builds its profile by
/// merging its own contributions onto its parent's with [`ClientProfile::merge`],
/// once, when the client is assembled.
#[derive(Debug, Clone)]
pub struct ClientProfile {
    pub defaults: ApiDefaults,
    /// `Content-Type` for outgoing requests; `None` sends none.
    pub content_type: Option<String>,
    pub accept: Accept,
    /// Baseline headers contributed by the client type.
    pub headers: Vec<(String, String)>,
}

impl Default for ClientProfile {
    fn default() -> Self {
        ClientProfile {
            defaults: ApiDefaults::default(),
            content_type: Some("application/json".to_string()),
            accept: Accept::Mirror,
            headers: Vec::new(),
        }
    }
}

impl ClientProfile {
    /// Layer `child` on top of this profile: the child's scalar options
    /// replace the parent's, header contributions accumulate in declaration
    /// order.
    pub fn merge(mut self, child: ClientProfile) -> ClientProfile {
        self.defaults = child.defaults;
        self.content_type = child.content_type;
        self.accept = child.accept;
        self.headers.extend(child.headers);
        self
    }
}

/// Per-call options for [`HttpApiClient::api_call`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Tolerant mode: classify failures as `(false, None)` instead of
    /// raising [`ApiError::Call`].
    pub errors_ok: bool,
    /// Redact the URL from log lines, for sensitive endpoints.
    pub nolog_url: bool,
    /// Extra headers for this call only; they win over client defaults.
    pub headers: Vec<(String, String)>,
}

/// Blocking API client owning a persistent HTTP session.
#[derive(Debug)]
pub struct HttpApiClient {
    base_url: String,
    real_host: String,
    verify_cert: VerifyCert,
    content_type: Option<String>,
    accept: Accept,
    headers: Vec<(String, String)>,
    log_target: String,
    agent: Option<Agent>,
}

/// Builder for [`HttpApiClient`]; the merge point for profile and
/// per-instance options.
#[derive(Debug)]
pub struct ClientBuilder {
    host: String,
    real_host: Option<String>,
    verify_cert: VerifyCert,
    profile: ClientProfile,
    headers: Vec<(String, String)>,
    log_target: String,
}

impl ClientBuilder {
    /// Override the host used for network addressing.
    pub fn real_host(mut self, real_host: impl Into<String>) -> Self {
        self.real_host = Some(real_host.into());
        self
    }

    pub fn verify_cert(mut self, verify_cert: impl Into<VerifyCert>) -> Self {
        self.verify_cert = verify_cert.into();
        self
    }

    /// Merge a client type's profile onto the base profile.
    pub fn profile(mut self, profile: ClientProfile) -> Self {
        self.profile = self.profile.merge(profile);
        self
    }

    /// Add an instance-level default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Dot-separated log target for this client's log lines.
    pub fn logger_name(mut self, name: impl Into<String>) -> Self {
        self.log_target = name.into();
        self
    }

    /// Resolve the host and produce a client in the Closed state.
    pub fn build(self) -> Result<HttpApiClient, ApiError> {
        let resolved = host::resolve(
            &self.host,
            self.real_host.as_deref(),
            &self.profile.defaults,
        )?;

        let mut headers = self.profile.headers;
        headers.extend(self.headers);

        Ok(HttpApiClient {
            base_url: resolved.base_url,
            real_host: resolved.real_host,
            verify_cert: self.verify_cert,
            content_type: self.profile.content_type,
            accept: self.profile.accept,
            headers,
            log_target: self.log_target,
            agent: None,
        })
    }
}

impl HttpApiClient {
    pub fn builder(host: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            host: host.into(),
            real_host: None,
            verify_cert: VerifyCert::default(),
            profile: ClientProfile::default(),
            headers: Vec::new(),
            log_target: "restapi.client".to_string(),
        }
    }

    /// Client with the default profile (https, JSON both ways).
    pub fn new(host: &str) -> Result<Self, ApiError> {
        Self::builder(host).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn real_host(&self) -> &str {
        &self.real_host
    }

    /// Join an endpoint onto the base URL.
    pub fn join_url(&self, endpoint: &str) -> String {
        if endpoint.is_empty() {
            return self.base_url.clone();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Set a default header, replacing any existing value for the name.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
        } else {
            self.headers.push((name, value));
        }
    }

    /// Remove a default header. Returns whether anything was removed, so a
    /// caller that cares about a missing name can check.
    pub fn remove_header(&mut self, name: &str) -> bool {
        let before = self.headers.len();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.len() != before
    }

    fn agent(&self) -> &Agent {
        self.agent
            .as_ref()
            .expect("no active session: client is not open")
    }

    fn tls_config(&self) -> Result<TlsConfig, ApiError> {
        match &self.verify_cert {
            VerifyCert::On => Ok(TlsConfig::builder().build()),
            VerifyCert::Off => Ok(TlsConfig::builder().disable_verification(true).build()),
            VerifyCert::CaFile(path) => {
                let pem = std::fs::read(path).map_err(|err| {
                    ApiError::InvalidArgument(format!(
                        "cannot read CA bundle {}: {err}",
                        path.display()
                    ))
                })?;
                let cert = Certificate::from_pem(&pem).map_err(|err| {
                    ApiError::InvalidArgument(format!(
                        "invalid CA bundle {}: {err}",
                        path.display()
                    ))
                })?;
                Ok(TlsConfig::builder()
                    .root_certs(RootCerts::new_with_certs(&[cert]))
                    .build())
            }
        }
    }

    /// Full header list for one request: `Host`, content negotiation, client
    /// defaults, then per-call extras. Later entries replace earlier ones of
    /// the same name.
    fn assembled_headers(&self, extra: &[(String, String)]) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = Vec::new();

        let mut push = |name: &str, value: &str| {
            if let Some(entry) = merged
                .iter_mut()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
            {
                entry.1 = value.to_string();
            } else {
                merged.push((name.to_string(), value.to_string()));
            }
        };

        push("Host", &self.real_host);

        if let Some(content_type) = &self.content_type {
            push("Content-Type", content_type);
        }

        match &self.accept {
            Accept::Mirror => push("Accept", self.content_type.as_deref().unwrap_or("*/*")),
            Accept::Value(value) => push("Accept", value),
            Accept::Skip => {}
        }

        for (name, value) in self.headers.iter().chain(extra) {
            push(name, value);
        }

        merged
    }

    /// Dispatch one request through the active session.
    ///
    /// Logs method and target before dispatch and status after; `nolog_url`
    /// redacts the target from both lines. Transport errors propagate
    /// unchanged. Panics if the client is not open.
    pub fn request(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&Value>,
        options: &CallOptions,
    ) -> Result<ApiResponse, ApiError> {
        let shown_url = if options.nolog_url {
            "NOT_LOGGING_URL"
        } else {
            url
        };

        // Decode is reserved for response bodies; a payload that cannot be
        // encoded is a caller-side problem.
        let payload = match body {
            Some(value) => Some(serde_json::to_string(value).map_err(|err| {
                ApiError::InvalidArgument(format!("cannot encode request payload: {err}"))
            })?),
            None => None,
        };

        let headers = self.assembled_headers(&options.headers);

        debug!(target: self.log_target.as_str(), "API {method} request: {shown_url}");

        // ureq's request builders are typestated on whether they carry a
        // body, so each arm completes the call itself.
        let mut response = match (method, payload) {
            (HttpMethod::Get, _) => {
                let mut req = self.agent().get(url);
                for (name, value) in &headers {
                    req = req.header(name.as_str(), value.as_str());
                }
                req.call()
            }
            (HttpMethod::Delete, _) => {
                let mut req = self.agent().delete(url);
                for (name, value) in &headers {
                    req = req.header(name.as_str(), value.as_str());
                }
                req.call()
            }
            (HttpMethod::Post, payload) => {
                let mut req = self.agent().post(url);
                for (name, value) in &headers {
                    req = req.header(name.as_str(), value.as_str());
                }
                match payload {
                    Some(body) => req.send(body.as_bytes()),
                    None => req.send_empty(),
                }
            }
            (HttpMethod::Put, payload) => {
                let mut req = self.agent().put(url);
                for (name, value) in &headers {
                    req = req.header(name.as_str(), value.as_str());
                }
                match payload {
                    Some(body) => req.send(body.as_bytes()),
                    None => req.send_empty(),
                }
            }
            (HttpMethod::Patch, payload) => {
                let mut req = self.agent().patch(url);
                for (name, value) in &headers {
                    req = req.header(name.as_str(), value.as_str());
                }
                match payload {
                    Some(body) => req.send(body.as_bytes()),
                    None => req.send_empty(),
                }
            }
        }?;

        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;

        debug!(target: self.log_target.as_str(), "API {method} response status {status}: {shown_url}");

        Ok(ApiResponse { status, body })
    }

    /// Dispatch a call to `endpoint` and classify the response.
    ///
    /// Classification uses this client's decode and render hooks. A wrapper
    /// type that overrides them should dispatch via [`Self::request`] and
    /// classify with its own `process_response`.
    pub fn api_call(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<&Value>,
        options: &CallOptions,
    ) -> Result<(bool, Option<Value>), ApiError> {
        let url = self.join_url(endpoint);
        let response = self.request(method, &url, body, options)?;
        self.process_response(response, options.errors_ok)
    }

    /// Strict convenience wrapper: dispatch, classify without tolerant mode,
    /// return the decoded body.
    pub fn api_query(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let (_, decoded) = self.api_call(method, endpoint, body, &CallOptions::default())?;
        Ok(decoded.unwrap_or(Value::Null))
    }
}

impl ApiClient for HttpApiClient {
    /// Build the persistent agent. Every fallible setup step runs before the
    /// agent is stored, so a failure leaves the client Closed with nothing
    /// retained.
    fn open_connection(&mut self) -> Result<(), ApiError> {
        debug_assert!(
            self.agent.is_none(),
            "open_connection on an already-open client"
        );

        let tls = self.tls_config()?;

        // Status interpretation belongs to process_response, not the
        // transport.
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .tls_config(tls)
            .build()
            .new_agent();

        self.agent = Some(agent);
        Ok(())
    }

    /// No handshake by default; authenticated clients wrap `HttpApiClient`
    /// and supply their own.
    fn login(&mut self) -> Result<(), ApiError> {
        Ok(())
    }

    fn logout(&mut self) -> Result<(), ApiError> {
        Ok(())
    }

    fn close_connection(&mut self) {
        self.agent = None;
    }

    fn is_open(&self) -> bool {
        self.agent.is_some()
    }

    /// JSON parse, with an empty body decoding to `null` so bodyless
    /// success responses (204, 205) classify cleanly.
    fn decode_body(&self, text: &str) -> Result<Value, ApiError> {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpApiClient {
        HttpApiClient::new("example.com").unwrap()
    }

    #[test]
    fn build_resolves_host_fail_fast() {
        let err = HttpApiClient::new("").unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[test]
    fn new_client_is_closed() {
        let client = client();
        assert!(!client.is_open());
        assert_eq!(client.base_url(), "https://example.com/");
        assert_eq!(client.real_host(), "example.com");
    }

    #[test]
    fn open_and_close_track_the_agent() {
        let mut client = client();
        client.open_connection().unwrap();
        assert!(client.is_open());
        client.close_connection();
        assert!(!client.is_open());
        // closing again is a no-op
        client.close_connection();
        assert!(!client.is_open());
    }

    #[test]
    fn open_with_malformed_ca_bundle_stays_closed() {
        let path = std::env::temp_dir().join("restapi-core-malformed-bundle.pem");
        std::fs::write(&path, "this is not PEM data").unwrap();

        let mut client = HttpApiClient::builder("example.com")
            .verify_cert(path.clone())
            .build()
            .unwrap();
        let err = client.open_connection().unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)), "got {err:?}");
        assert!(!client.is_open());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn client_is_debug_printable() {
        let rendered = format!("{:?}", client());
        assert!(rendered.contains("HttpApiClient"));
        assert!(rendered.contains("example.com"));
    }

    #[test]
    fn open_with_missing_ca_bundle_stays_closed() {
        let mut client = HttpApiClient::builder("example.com")
            .verify_cert(PathBuf::from("/nonexistent/bundle.pem"))
            .build()
            .unwrap();
        let err = client.open_connection().unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
        assert!(!client.is_open());
    }

    #[test]
    fn join_url_trims_slashes() {
        let client = client();
        assert_eq!(client.join_url("/notes"), "https://example.com/notes");
        assert_eq!(client.join_url("notes/1"), "https://example.com/notes/1");
        assert_eq!(client.join_url(""), "https://example.com/");
    }

    #[test]
    fn add_header_replaces_existing_value() {
        let mut client = client();
        client.add_header("X-Trace", "a");
        client.add_header("x-trace", "b");
        let headers = client.assembled_headers(&[]);
        let trace: Vec<_> = headers.iter().filter(|(n, _)| n == "X-Trace").collect();
        assert_eq!(trace, vec![&("X-Trace".to_string(), "b".to_string())]);
    }

    #[test]
    fn remove_header_reports_whether_present() {
        let mut client = client();
        client.add_header("Authorization", "Bearer t");
        assert!(client.remove_header("authorization"));
        assert!(!client.remove_header("Authorization"));
    }

    #[test]
    fn assembled_headers_default_content_negotiation() {
        let client = client();
        let headers = client.assembled_headers(&[]);
        assert_eq!(
            headers,
            vec![
                ("Host".to_string(), "example.com".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ]
        );
    }

    #[test]
    fn per_call_headers_win_over_defaults() {
        let mut client = client();
        client.add_header("X-Mode", "default");
        let headers = client.assembled_headers(&[("X-Mode".to_string(), "call".to_string())]);
        assert!(headers.contains(&("X-Mode".to_string(), "call".to_string())));
        assert!(!headers.iter().any(|(_, v)| v == "default"));
    }

    #[test]
    fn accept_skip_sends_no_accept_header() {
        let profile = ClientProfile {
            accept: Accept::Skip,
            ..ClientProfile::default()
        };
        let client = HttpApiClient::builder("example.com")
            .profile(profile)
            .build()
            .unwrap();
        let headers = client.assembled_headers(&[]);
        assert!(!headers.iter().any(|(n, _)| n == "Accept"));
    }

    #[test]
    fn accept_mirror_falls_back_to_wildcard() {
        let profile = ClientProfile {
            content_type: None,
            ..ClientProfile::default()
        };
        let client = HttpApiClient::builder("example.com")
            .profile(profile)
            .build()
            .unwrap();
        let headers = client.assembled_headers(&[]);
        assert!(headers.contains(&("Accept".to_string(), "*/*".to_string())));
        assert!(!headers.iter().any(|(n, _)| n == "Content-Type"));
    }

    #[test]
    fn profile_merge_accumulates_headers_and_replaces_scalars() {
        let parent = ClientProfile {
            headers: vec![("X-Base".to_string(), "1".to_string())],
            ..ClientProfile::default()
        };
        let child = ClientProfile {
            defaults: ApiDefaults {
                scheme: "http".to_string(),
                port: Some(8080),
                base_path: Some("/api".to_string()),
            },
            content_type: Some("application/xml".to_string()),
            accept: Accept::Value("text/plain".to_string()),
            headers: vec![("X-Child".to_string(), "2".to_string())],
        };

        let merged = parent.merge(child);
        assert_eq!(merged.defaults.scheme, "http");
        assert_eq!(merged.defaults.port, Some(8080));
        assert_eq!(merged.content_type.as_deref(), Some("application/xml"));
        assert_eq!(merged.accept, Accept::Value("text/plain".to_string()));
        assert_eq!(
            merged.headers,
            vec![
                ("X-Base".to_string(), "1".to_string()),
                ("X-Child".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn builder_profile_feeds_host_resolution() {
        let profile = ClientProfile {
            defaults: ApiDefaults {
                scheme: "http".to_string(),
                port: Some(8443),
                base_path: None,
            },
            ..ClientProfile::default()
        };
        let client = HttpApiClient::builder("[::1]")
            .profile(profile)
            .build()
            .unwrap();
        assert_eq!(client.real_host(), "[::1]:8443");
        assert_eq!(client.base_url(), "http://[::1]:8443/");
    }

    #[test]
    fn verify_cert_conversions() {
        assert_eq!(VerifyCert::from(true), VerifyCert::On);
        assert_eq!(VerifyCert::from(false), VerifyCert::Off);
        assert_eq!(
            VerifyCert::from(PathBuf::from("/etc/ssl/ca.pem")),
            VerifyCert::CaFile(PathBuf::from("/etc/ssl/ca.pem"))
        );
    }

    #[test]
    fn empty_body_decodes_to_null() {
        let client = client();
        assert_eq!(client.decode_body("").unwrap(), Value::Null);
        assert_eq!(client.decode_body("  \n").unwrap(), Value::Null);
        assert!(client.decode_body("not json").is_err());
    }
}
