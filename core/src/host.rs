//! Host argument resolution.
//!
//! # Design
//! A client is constructed from a single user-supplied `host` string that may
//! be either a complete URL or a bare `host[:port]`. Resolution turns that
//! plus an optional real-host override into the canonical base URL and the
//! host used for wire-level addressing. The two can differ when the
//! connection is tunneled (e.g. over SSH) and the apparent host is not the
//! address actually dialed.

use url::Url;

use crate::error::ApiError;

/// Defaults a concrete client type declares for host resolution.
#[derive(Debug, Clone)]
pub struct ApiDefaults {
    /// Scheme used when `host` is a bare `host[:port]` value.
    pub scheme: String,
    /// Port appended to bare hosts that do not carry one. `None` leaves the
    /// host untouched and the scheme's well-known port applies.
    pub port: Option<u16>,
    /// Path prefix under which all endpoints live, e.g. `/api/v2`.
    pub base_path: Option<String>,
}

impl Default for ApiDefaults {
    fn default() -> Self {
        ApiDefaults {
            scheme: "https".to_string(),
            port: None,
            base_path: None,
        }
    }
}

/// Outcome of resolving a host argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHost {
    /// Canonical URL prefix for all API calls.
    pub base_url: String,
    /// Host value used for network addressing, `host[:port]` form.
    pub real_host: String,
}

/// Append the default port unless the host already carries one.
///
/// Bracketed IPv6 literals get the port after the closing bracket; a
/// bracketed host that already has a `:port` suffix is left untouched.
fn append_default_port(host: &str, port: Option<u16>) -> String {
    let Some(port) = port else {
        return host.to_string();
    };

    if host.starts_with('[') {
        if host.ends_with(']') {
            return format!("{host}:{port}");
        }
        return host.to_string();
    }

    if host.contains(':') {
        return host.to_string();
    }

    format!("{host}:{port}")
}

/// Resolve a host argument into `(base_url, real_host)`.
///
/// A `host` that parses as a URL with scheme and authority is used verbatim
/// as the base URL, and its authority host (credentials stripped) becomes the
/// default real host. Anything else is treated as `host[:port]` and combined
/// with the declared defaults. An explicitly supplied `real_host` gets the
/// default-port rule applied independently.
pub fn resolve(
    host: &str,
    real_host: Option<&str>,
    defaults: &ApiDefaults,
) -> Result<ResolvedHost, ApiError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ApiError::InvalidArgument("empty API host".to_string()));
    }

    let (base_url, parsed_host) = match Url::parse(host) {
        Ok(url) if url.has_authority() => {
            // Take the authority as spelled in the input: `Url` normalizes a
            // scheme's default port away, but an explicit `:443` must stay
            // part of the real host.
            let rest = host[url.scheme().len() + 1..].trim_start_matches('/');
            let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
            let authority = authority.rsplit('@').next().unwrap_or("").to_string();
            (host.to_string(), authority)
        }
        _ => {
            let with_port = append_default_port(host, defaults.port);
            let base_path = defaults
                .base_path
                .as_deref()
                .unwrap_or("")
                .trim_start_matches('/');
            let base_url = format!("{}://{}/{}", defaults.scheme, with_port, base_path);
            (base_url, with_port)
        }
    };

    let real_host = match real_host {
        Some(value) if !value.is_empty() => append_default_port(value, defaults.port),
        _ => parsed_host,
    };

    Ok(ResolvedHost {
        base_url,
        real_host,
    })
}
