//! SIP-URI model (spec §4.2, component C2): `scheme:authority[;params][?headers]`.

pub mod parser;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::params::Params;

/// URI scheme. Always stored lower-case (data model invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Sip,
    Sips,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
        }
    }

    /// RFC 3261 §19.1.1 scheme-default port.
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Sip => 5060,
            Scheme::Sips => 5061,
        }
    }

    /// RFC 3261 §19.1.4 lazy-equivalence default transport.
    pub fn default_transport(&self) -> &'static str {
        match self {
            Scheme::Sip => "udp",
            Scheme::Sips => "tls",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `scheme:[userinfo@]host[:port][;params][?headers]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uri {
    pub scheme: Scheme,
    pub userinfo: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub parameters: Params,
    pub headers: Params,
}

impl Uri {
    pub fn new(scheme: Scheme, host: impl Into<String>) -> Self {
        Uri {
            scheme,
            userinfo: None,
            host: host.into(),
            port: None,
            parameters: Params::new(),
            headers: Params::new(),
        }
    }

    /// The effective port: explicit if present, otherwise the scheme
    /// default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(self.scheme.default_port())
    }

    pub fn transport(&self) -> Option<&str> {
        self.parameters.get("transport").flatten()
    }

    fn param_default_for_equivalence(name: &str) -> Option<&'static str> {
        match name {
            "user" | "ttl" | "method" | "maddr" => None,
            _ => None,
        }
    }

    /// Strict equivalence per RFC 3261 §19.1.4: missing `user`/`ttl`/
    /// `method`/`maddr`/`transport` on one side never matches a present
    /// value on the other unless `configured_defaults` supplies one.
    pub fn equivalent_strict(&self, other: &Uri, configured_defaults: &Params) -> bool {
        self.equivalent(other, false, configured_defaults)
    }

    /// Lazy equivalence: `transport` and `port` additionally default per
    /// scheme before comparison.
    pub fn equivalent_lazy(&self, other: &Uri) -> bool {
        self.equivalent(other, true, &Params::new())
    }

    fn equivalent(&self, other: &Uri, lazy: bool, configured_defaults: &Params) -> bool {
        if self.scheme != other.scheme {
            return false;
        }
        match (&self.userinfo, &other.userinfo) {
            (Some(a), Some(b)) if a == b => {}
            (None, None) => {}
            _ => return false,
        }
        if !self.host.eq_ignore_ascii_case(&other.host) {
            return false;
        }

        let (a_port, b_port) = if lazy {
            (self.effective_port(), other.effective_port())
        } else {
            (
                self.port.unwrap_or(self.scheme.default_port()),
                other.port.unwrap_or(other.scheme.default_port()),
            )
        };
        if a_port != b_port {
            return false;
        }

        const DISQUALIFYING: &[&str] = &["user", "ttl", "method", "maddr", "transport"];
        for name in DISQUALIFYING {
            let a = self.parameters.get(name).flatten();
            let b = other.parameters.get(name).flatten();
            let resolved_default = if lazy && *name == "transport" {
                Some(self.scheme.default_transport())
            } else {
                Self::param_default_for_equivalence(name)
                    .or_else(|| configured_defaults.get(name).flatten())
            };
            match (a, b) {
                (Some(a), Some(b)) => {
                    if !a.eq_ignore_ascii_case(b) {
                        return false;
                    }
                }
                (Some(a), None) => {
                    if Some(a) != resolved_default {
                        return false;
                    }
                }
                (None, Some(b)) => {
                    if Some(b) != resolved_default {
                        return false;
                    }
                }
                (None, None) => {}
            }
        }

        for (name, value) in self.parameters.iter() {
            if DISQUALIFYING.contains(&name.to_ascii_lowercase().as_str()) {
                continue;
            }
            if let Some(other_value) = other.parameters.get(name) {
                if !value.eq_ignore_ascii_case(&other_value.unwrap_or_default()) {
                    return false;
                }
            }
        }

        if self.headers.len() != other.headers.len() {
            return false;
        }
        for (name, value) in self.headers.iter() {
            match other.headers.get(name) {
                Some(other_value) => {
                    if !value
                        .unwrap_or_default()
                        .eq_ignore_ascii_case(other_value.unwrap_or_default())
                    {
                        return false;
                    }
                }
                None => return false,
            }
        }

        true
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(ui) = &self.userinfo {
            write!(f, "{ui}@")?;
        }
        if self.host.contains(':') {
            write!(f, "[{}]", self.host)?;
        } else {
            write!(f, "{}", self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "{}", self.parameters)?;
        if !self.headers.is_empty() {
            write!(f, "?")?;
            let mut first = true;
            for (name, value) in self.headers.iter() {
                if !first {
                    write!(f, "&")?;
                }
                first = false;
                write!(f, "{name}")?;
                if let Some(v) = value {
                    write!(f, "={v}")?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parser::parse_uri(s.as_bytes()).map(|(_, uri)| uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_port_per_scheme() {
        let uri: Uri = "sip:alice@example.com".parse().unwrap();
        assert_eq!(uri.effective_port(), 5060);
        let uri: Uri = "sips:alice@example.com".parse().unwrap();
        assert_eq!(uri.effective_port(), 5061);
    }

    #[test]
    fn strict_equivalence_ignores_default_port() {
        let a: Uri = "sip:alice@example.com".parse().unwrap();
        let b: Uri = "sip:alice@example.com:5060".parse().unwrap();
        assert!(a.equivalent_strict(&b, &Params::new()));
    }

    #[test]
    fn strict_equivalence_is_host_case_insensitive() {
        let a: Uri = "sip:alice@Example.Com".parse().unwrap();
        let b: Uri = "sip:alice@example.com".parse().unwrap();
        assert!(a.equivalent_strict(&b, &Params::new()));
    }

    #[test]
    fn strict_equivalence_rejects_userinfo_mismatch() {
        let a: Uri = "sip:alice@example.com".parse().unwrap();
        let b: Uri = "sip:bob@example.com".parse().unwrap();
        assert!(!a.equivalent_strict(&b, &Params::new()));
    }

    #[test]
    fn lazy_equivalence_defaults_transport_per_scheme() {
        let a: Uri = "sip:alice@example.com".parse().unwrap();
        let b: Uri = "sip:alice@example.com;transport=udp".parse().unwrap();
        assert!(a.equivalent_lazy(&b));
    }

    #[test]
    fn display_round_trips_parameters_and_headers() {
        let uri: Uri = "sip:alice@example.com;transport=tcp?subject=project".parse().unwrap();
        assert_eq!(uri.to_string(), "sip:alice@example.com;transport=tcp?subject=project");
    }
}
