//! URL splitting and dynamic secret name derivation.
//!
//! Connection URLs are the second way a secret gets identified: code that
//! wants "the secret for this URL" without naming one derives a
//! deterministic, filesystem-safe name from the URL's components. Host and
//! port stay visible in the name for manageability; the path and username are
//! sensitive, so they contribute only through a hash.

use crate::errors::{Result, SecretsError};
use crate::utils::fnv32;

/// URL scheme accepted by the splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlScheme {
    Http,
    Https,
}

impl UrlScheme {
    /// The scheme including the `://` separator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http://",
            Self::Https => "https://",
        }
    }

    /// The port implied when a URL omits one.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

impl std::fmt::Display for UrlScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Components of a split `http`/`https` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: UrlScheme,
    /// Username from the userinfo section, empty when absent.
    pub user: String,
    /// Password from the userinfo section, empty when absent.
    pub password: String,
    pub host: String,
    /// Explicit port, `None` when the URL relies on the scheme default.
    pub port: Option<u16>,
    /// Path including the leading `/`, empty when absent or a bare `/`.
    pub path: String,
}

impl UrlParts {
    /// `scheme://host[:port]`, the base used for issuing requests.
    pub fn scheme_host_port(&self) -> String {
        match self.port {
            Some(port) => format!("{}{}:{}", self.scheme, self.host, port),
            None => format!("{}{}", self.scheme, self.host),
        }
    }
}

/// Split `scheme://[user[:password]@]host[:port][/path]` into its parts.
///
/// Only `http` and `https` are recognized, case-insensitively. A trailing
/// path of exactly `/` is treated as no path so that equivalent URLs produce
/// equal parts.
pub fn split_url(url: &str) -> Result<UrlParts> {
    let (scheme, rest) = if url.len() >= 8 && url[..8].eq_ignore_ascii_case("https://") {
        (UrlScheme::Https, &url[8..])
    } else if url.len() >= 7 && url[..7].eq_ignore_ascii_case("http://") {
        (UrlScheme::Http, &url[7..])
    } else if url.is_empty() {
        return Err(SecretsError::invalid_url("empty URL"));
    } else {
        return Err(SecretsError::invalid_url(format!("protocol not recognized in {url}")));
    };

    let (authority, path) = match rest.find('/') {
        Some(idx) => {
            let path = &rest[idx..];
            (&rest[..idx], if path == "/" { "" } else { path })
        }
        None => (rest, ""),
    };

    let (userinfo, hostport) = match authority.find('@') {
        Some(idx) => (&authority[..idx], &authority[idx + 1..]),
        None => ("", authority),
    };

    let (user, password) = match userinfo.find(':') {
        Some(idx) => (&userinfo[..idx], &userinfo[idx + 1..]),
        None => (userinfo, ""),
    };

    let (host, port) = match hostport.find(':') {
        Some(idx) => {
            let port_text = &hostport[idx + 1..];
            let port = port_text.parse::<u16>().map_err(|_| {
                SecretsError::invalid_url(format!("invalid port {port_text} in {url}"))
            })?;
            (&hostport[..idx], Some(port))
        }
        None => (hostport, None),
    };

    Ok(UrlParts {
        scheme,
        user: user.to_string(),
        password: password.to_string(),
        host: host.to_string(),
        port,
        path: path.to_string(),
    })
}

/// Derive a deterministic secret name for a connection URL.
///
/// `user_password` may be a bare username or a `user:password` pair; only the
/// username contributes to the name, so a password rotation does not move the
/// secret. A `port` of 0 means no explicit port, and the scheme's default
/// port is suppressed so that explicit and implicit forms produce the same
/// name.
pub fn generate_dynamic_url_secret_name(
    scheme: UrlScheme,
    user_password: &str,
    host: &str,
    port: u16,
    path: &str,
) -> String {
    let mut name = String::from("http-connect-");
    let mut port = port;
    match scheme {
        UrlScheme::Https => {
            if port == 443 {
                port = 0;
            }
            name.push_str("ssl-");
        }
        UrlScheme::Http => {
            if port == 80 {
                port = 0;
            }
        }
    }
    // The port is sometimes written as part of the host; mangle both.
    for c in host.chars() {
        name.push(if c == '.' || c == ':' { '-' } else { c });
    }
    if port != 0 {
        name.push('-');
        name.push_str(&port.to_string());
    }

    let mut hash = 0u32;
    if !path.is_empty() {
        hash = fnv32(path.as_bytes(), hash);
    }
    if !user_password.is_empty() {
        let user = match user_password.find(':') {
            Some(idx) => &user_password[..idx],
            None => user_password,
        };
        hash = fnv32(user.as_bytes(), hash);
    }
    if hash != 0 {
        name.push_str(&format!("-{hash:x}"));
    }
    name
}

/// Derive a deterministic secret name directly from a URL.
///
/// When `username` is given it replaces any username embedded in the URL.
pub fn dynamic_url_secret_name(url: &str, username: Option<&str>) -> Result<String> {
    let parts = split_url(url)?;
    let user = match username {
        Some(u) if !u.is_empty() => u,
        _ => parts.user.as_str(),
    };
    Ok(generate_dynamic_url_secret_name(
        parts.scheme,
        user,
        &parts.host,
        parts.port.unwrap_or(0),
        &parts.path,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_url() {
        let parts = split_url("https://u:p@h:8443/x/y").unwrap();
        assert_eq!(parts.scheme, UrlScheme::Https);
        assert_eq!(parts.user, "u");
        assert_eq!(parts.password, "p");
        assert_eq!(parts.host, "h");
        assert_eq!(parts.port, Some(8443));
        assert_eq!(parts.path, "/x/y");
    }

    #[test]
    fn test_split_preserves_explicit_default_port() {
        // Default port elision is a name-generation rule, not a parsing rule.
        let parts = split_url("https://u:p@h:443/x").unwrap();
        assert_eq!(parts.port, Some(443));
        assert_eq!(parts.scheme_host_port(), "https://h:443");
    }

    #[test]
    fn test_split_minimal() {
        let parts = split_url("http://example.com").unwrap();
        assert_eq!(parts.scheme, UrlScheme::Http);
        assert!(parts.user.is_empty());
        assert!(parts.password.is_empty());
        assert_eq!(parts.host, "example.com");
        assert_eq!(parts.port, None);
        assert!(parts.path.is_empty());
        assert_eq!(parts.scheme_host_port(), "http://example.com");
    }

    #[test]
    fn test_split_case_insensitive_scheme() {
        assert_eq!(split_url("HTTPS://h").unwrap().scheme, UrlScheme::Https);
        assert_eq!(split_url("HtTp://h").unwrap().scheme, UrlScheme::Http);
    }

    #[test]
    fn test_split_bare_trailing_slash_is_no_path() {
        assert_eq!(split_url("http://h/").unwrap().path, "");
        assert_eq!(split_url("http://h/x").unwrap().path, "/x");
    }

    #[test]
    fn test_split_user_without_password() {
        let parts = split_url("http://alice@h/x").unwrap();
        assert_eq!(parts.user, "alice");
        assert!(parts.password.is_empty());
    }

    #[test]
    fn test_split_rejects_unknown_scheme() {
        assert!(split_url("ftp://h").is_err());
        assert!(split_url("h:8200").is_err());
        assert!(split_url("").is_err());
    }

    #[test]
    fn test_split_rejects_bad_port() {
        assert!(split_url("http://h:notaport/").is_err());
        assert!(split_url("http://h:99999/").is_err());
    }

    #[test]
    fn test_dynamic_name_shape() {
        let name =
            generate_dynamic_url_secret_name(UrlScheme::Https, "", "svc.example.com", 8443, "");
        assert_eq!(name, "http-connect-ssl-svc-example-com-8443");

        let name = generate_dynamic_url_secret_name(UrlScheme::Http, "", "svc.example.com", 0, "");
        assert_eq!(name, "http-connect-svc-example-com");
    }

    #[test]
    fn test_dynamic_name_suppresses_default_ports() {
        let implicit = dynamic_url_secret_name("http://h/", None).unwrap();
        let explicit = dynamic_url_secret_name("http://h:80/", None).unwrap();
        assert_eq!(implicit, explicit);

        let implicit = dynamic_url_secret_name("https://h/", None).unwrap();
        let explicit = dynamic_url_secret_name("https://h:443/", None).unwrap();
        assert_eq!(implicit, explicit);

        // The https default is not suppressed for http and vice versa.
        let http443 = dynamic_url_secret_name("http://h:443/", None).unwrap();
        assert_ne!(http443, dynamic_url_secret_name("http://h/", None).unwrap());
    }

    #[test]
    fn test_dynamic_name_deterministic_across_calls() {
        let a = generate_dynamic_url_secret_name(
            UrlScheme::Https,
            "alice",
            "svc.example.com",
            443,
            "/v1",
        );
        let b = generate_dynamic_url_secret_name(
            UrlScheme::Https,
            "alice",
            "svc.example.com",
            0,
            "/v1",
        );
        assert_eq!(a, b);

        let c =
            generate_dynamic_url_secret_name(UrlScheme::Https, "bob", "svc.example.com", 0, "/v1");
        assert_ne!(a, c);
    }

    #[test]
    fn test_dynamic_name_ignores_password() {
        let with_pw = generate_dynamic_url_secret_name(UrlScheme::Http, "alice:s3cret", "h", 0, "");
        let without = generate_dynamic_url_secret_name(UrlScheme::Http, "alice", "h", 0, "");
        let rotated = generate_dynamic_url_secret_name(UrlScheme::Http, "alice:other", "h", 0, "");
        assert_eq!(with_pw, without);
        assert_eq!(with_pw, rotated);
    }

    #[test]
    fn test_dynamic_name_path_contributes() {
        let with_path = dynamic_url_secret_name("http://h/v1", None).unwrap();
        let without = dynamic_url_secret_name("http://h/", None).unwrap();
        assert_ne!(with_path, without);
        assert_eq!(without, "http-connect-h");
    }

    #[test]
    fn test_dynamic_name_username_override() {
        let from_url = dynamic_url_secret_name("http://alice@h/", None).unwrap();
        let overridden = dynamic_url_secret_name("http://alice@h/", Some("bob")).unwrap();
        let bob_url = dynamic_url_secret_name("http://bob@h/", None).unwrap();
        assert_ne!(from_url, overridden);
        assert_eq!(overridden, bob_url);
    }
}
