//! `Set-Cookie` rendering for the session cookie.
//!
//! The attributes depend on how the API and the UI are deployed, which is
//! a configuration switch rather than a code path: a cross-site
//! deployment (API and UI on different origins) needs `SameSite=None` and
//! `Secure`; a same-site deployment can use `SameSite=Lax`.

use std::fmt;
use std::str::FromStr;

use notype_core::error::NotypeError;

pub const DEFAULT_COOKIE_NAME: &str = "notype.sid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// API and UI on different sites.
    CrossSite,
    /// API and UI share a site, or local development.
    SameSite,
}

impl FromStr for DeploymentMode {
    type Err = NotypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cross-site" | "cross_site" | "production" => Ok(Self::CrossSite),
            "same-site" | "same_site" | "development" => Ok(Self::SameSite),
            other => Err(NotypeError::Validation {
                message: format!("unknown deployment mode: {other}"),
            }),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CrossSite => f.write_str("cross-site"),
            Self::SameSite => f.write_str("same-site"),
        }
    }
}

/// How the session cookie is scoped and flagged.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub name: String,
    pub mode: DeploymentMode,
    /// `Domain` attribute. Must be the API's own domain, never the UI's.
    /// `None` yields a host-only cookie.
    pub domain: Option<String>,
    /// Whether a same-site cookie is marked `Secure`. Cross-site cookies
    /// are always `Secure`.
    pub secure: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self::same_site(false)
    }
}

impl CookiePolicy {
    pub fn cross_site(domain: Option<String>) -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            mode: DeploymentMode::CrossSite,
            domain,
            secure: true,
        }
    }

    pub fn same_site(secure: bool) -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            mode: DeploymentMode::SameSite,
            domain: None,
            secure,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn is_secure(&self) -> bool {
        self.mode == DeploymentMode::CrossSite || self.secure
    }

    fn same_site_attr(&self) -> &'static str {
        match self.mode {
            DeploymentMode::CrossSite => "None",
            DeploymentMode::SameSite => "Lax",
        }
    }

    fn render(&self, value: &str, max_age_secs: u64) -> String {
        let mut cookie = format!(
            "{}={value}; Path=/; HttpOnly; SameSite={}; Max-Age={max_age_secs}",
            self.name,
            self.same_site_attr()
        );
        if self.is_secure() {
            cookie.push_str("; Secure");
        }
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        cookie
    }

    /// `Set-Cookie` value carrying a freshly issued session token.
    pub fn session_cookie(&self, token: &str, max_age_secs: u64) -> String {
        self.render(token, max_age_secs)
    }

    /// `Set-Cookie` value that makes the client drop the session cookie.
    pub fn clear_cookie(&self) -> String {
        self.render("", 0)
    }

    /// Pull the session token out of a `Cookie` request header.
    pub fn extract_token<'a>(&self, cookie_header: &'a str) -> Option<&'a str> {
        cookie_header.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == self.name && !value.trim().is_empty()).then(|| value.trim())
        })
    }
}
