//! Vault backend client.
//!
//! One [`VaultClient`] per configured vault owns that vault's authentication
//! state and fetching. Authentication is a small state machine: a token is
//! obtained on first need, replaced when its lease expires, and forcibly
//! refreshed once when the vault answers 403 (the token may have been
//! invalidated before its expiration time, for example by a max usage
//! count). Transport-level failures are retried a configured number of times
//! with a fixed wait; HTTP-level failures are not.
//!
//! Tokens live behind an async mutex that is held across the login request,
//! so concurrent fetches coalesce onto a single login per vault.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::VaultDefinition;
use crate::errors::{Result, SecretsError};
use crate::secrets::local::read_local_secret;
use crate::secrets::transport::{HttpResponse, HttpTransport};
use crate::secrets::types::{SecretString, VaultKind};
use crate::utils::split_url;

/// Where kubernetes mounts the service account JWT used for vault login.
/// Deliberately not under the secret mount.
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/token";

const DEFAULT_KUBERNETES_ROLE: &str = "keyplane-vault-access";
const DEFAULT_APP_ROLE_SECRET: &str = "appRoleSecret";

/// How a vault client authenticates.
#[derive(Debug, Clone)]
pub enum VaultAuthMethod {
    Kubernetes { role: String },
    AppRole { role_id: String, secret_name: String },
    Token,
    ClientCert { role: String },
    Unknown,
}

impl VaultAuthMethod {
    /// Label used in error messages and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AppRole { .. } => return "approle",
            Self::Kubernetes { .. } => return "kubernetes",
            Self::Token => return "token",
            Self::ClientCert { .. } => return "clientcert",
            Self::Unknown => {}
        }
        "unknown"
    }
}

#[derive(Debug, Default)]
struct TokenState {
    token: Option<SecretString>,
    expires_at: Option<DateTime<Utc>>,
    #[allow(dead_code)] // tracked for future renewal support
    renewable: bool,
}

impl TokenState {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= Utc::now(),
            None => false,
        }
    }
}

/// Client for one configured vault.
pub struct VaultClient {
    name: String,
    category: String,
    kind: VaultKind,
    scheme_host_port: String,
    location_template: String,
    namespace: Option<String>,
    basic_auth: Option<(String, SecretString)>,
    auth: VaultAuthMethod,
    retries: u32,
    retry_wait: Duration,
    mount: PathBuf,
    transport: Arc<dyn HttpTransport>,
    token: Mutex<TokenState>,
}

impl fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultClient")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("kind", &self.kind)
            .field("url", &self.scheme_host_port)
            .field("auth", &self.auth.label())
            .finish()
    }
}

impl VaultClient {
    /// Build a client for one vault definition.
    ///
    /// `mount` is the local secret mount, used to resolve the appRole
    /// `secret-id` and static client tokens. The transport is injected so the
    /// client stays free of HTTP details (and testable); the production
    /// registry builds it from the same definition.
    pub async fn new(
        category: &str,
        definition: &VaultDefinition,
        mount: &Path,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let category = category.to_ascii_lowercase();
        let url = definition.expanded_url();
        let parts = split_url(&url)?;

        let scheme_host_port = parts.scheme_host_port();
        info!(vault = %definition.name, url = %scheme_host_port, "configuring vault");

        let basic_auth = if !parts.user.is_empty() || !parts.password.is_empty() {
            warn!(vault = %definition.name, user = %parts.user,
                "unexpected use of basic auth in vault url");
            if !parts.user.is_empty() && !parts.password.is_empty() {
                Some((parts.user.clone(), SecretString::new(parts.password.clone())))
            } else {
                None
            }
        } else {
            None
        };

        let namespace = definition.namespace.as_deref().filter(|ns| !ns.is_empty()).map(|ns| {
            info!(vault = %definition.name, namespace = %ns, "vault namespace");
            if ns.ends_with('/') {
                ns.to_string()
            } else {
                format!("{ns}/")
            }
        });

        let mut initial_token = None;
        let auth = Self::resolve_auth(&definition.name, definition, mount, &mut initial_token)
            .await?;

        Ok(Self {
            name: definition.name.clone(),
            category,
            kind: definition.kind,
            scheme_host_port,
            location_template: parts.path,
            namespace,
            basic_auth,
            auth,
            retries: definition.retries,
            retry_wait: definition.retry_wait(),
            mount: mount.to_path_buf(),
            transport,
            token: Mutex::new(TokenState { token: initial_token, ..TokenState::default() }),
        })
    }

    /// Decide the authentication method from the definition, in precedence
    /// order: appRole, static client token, client certificate, kubernetes
    /// (when a service account token is mounted), unknown.
    async fn resolve_auth(
        vault_name: &str,
        definition: &VaultDefinition,
        mount: &Path,
        initial_token: &mut Option<SecretString>,
    ) -> Result<VaultAuthMethod> {
        if let Some(role_id) = definition.app_role_id.as_deref().filter(|id| !id.is_empty()) {
            let secret_name = definition
                .app_role_secret
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or(DEFAULT_APP_ROLE_SECRET)
                .to_string();
            return Ok(VaultAuthMethod::AppRole { role_id: role_id.to_string(), secret_name });
        }

        if let Some(client_secret) =
            definition.client_secret.as_deref().filter(|name| !name.is_empty())
        {
            match read_local_secret(mount, "system", client_secret).await? {
                Some(contents) => match contents.get_str("token") {
                    Some(token) if !token.is_empty() => {
                        info!(vault = %vault_name, "using a client token for vault auth");
                        *initial_token = Some(SecretString::new(token));
                        return Ok(VaultAuthMethod::Token);
                    }
                    _ => {
                        warn!(vault = %vault_name, secret = %client_secret,
                            "client token secret has no token key");
                        return Ok(VaultAuthMethod::Unknown);
                    }
                },
                None => {
                    warn!(vault = %vault_name, secret = %client_secret,
                        "client token secret not found");
                    return Ok(VaultAuthMethod::Unknown);
                }
            }
        }

        if definition.use_tls_certificate_auth {
            return Ok(VaultAuthMethod::ClientCert {
                role: definition.role.clone().unwrap_or_default(),
            });
        }

        if Path::new(SERVICE_ACCOUNT_TOKEN_PATH).exists() {
            info!(vault = %vault_name, "using kubernetes vault auth");
            let role = definition
                .role
                .as_deref()
                .filter(|role| !role.is_empty())
                .unwrap_or(DEFAULT_KUBERNETES_ROLE)
                .to_string();
            return Ok(VaultAuthMethod::Kubernetes { role });
        }

        Ok(VaultAuthMethod::Unknown)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn kind(&self) -> VaultKind {
        self.kind
    }

    pub fn auth_label(&self) -> &'static str {
        self.auth.label()
    }

    /// Fetch a secret body from this vault.
    ///
    /// Returns the raw response body together with this vault's kv kind so
    /// the caller can unwrap the payload. Absence (404, permission denied
    /// after a forced re-login, unreachable backend after retries) comes back
    /// as `None`; only authentication failures surface as errors.
    pub async fn fetch_secret(
        &self,
        secret: &str,
        version: Option<&str>,
    ) -> Result<Option<(VaultKind, Vec<u8>)>> {
        if secret.is_empty() {
            return Ok(None);
        }
        if self.location_template.is_empty() {
            error!(vault = %self.name, "cannot fetch secret: vault url has no location template");
            return Ok(None);
        }
        let location = self
            .location_template
            .replace("${secret}", secret)
            .replace("${version}", version.unwrap_or("1"));

        let mut permission_denied = false;
        loop {
            self.ensure_authenticated(permission_denied).await?;

            let url = format!("{}{}", self.scheme_host_port, location);
            let headers = self.request_headers().await;
            let response = match self.get_with_retry(&url, &headers).await {
                Ok(response) => response,
                Err(e) => {
                    error!(vault = %self.name, secret = %secret, location = %location,
                        error = %e, "vault request failed");
                    return Ok(None);
                }
            };

            match response.status {
                200 => return Ok(Some((self.kind, response.body))),
                403 => {
                    // Force one re-login in case the token was invalidated
                    // before its expiration time, then give up.
                    if !permission_denied {
                        permission_denied = true;
                        continue;
                    }
                    error!(vault = %self.name, secret = %secret, location = %location,
                        namespace = self.namespace.as_deref().unwrap_or(""),
                        response = %response.body_text(),
                        "permission denied accessing secret (check namespace?)");
                    return Ok(None);
                }
                404 => {
                    warn!(vault = %self.name, secret = %secret, location = %location,
                        "secret not found in vault");
                    return Ok(None);
                }
                status => {
                    error!(vault = %self.name, secret = %secret, location = %location,
                        status, response = %response.body_text(), "error accessing secret");
                    return Ok(None);
                }
            }
        }
    }

    /// Make sure a usable token is present, logging in when needed.
    ///
    /// `permission_denied` forces a fresh login even if the current token
    /// looks valid. Static tokens cannot be refreshed: a 403 on token auth
    /// fails this request but keeps the token, since the denial may concern
    /// one specific secret rather than the token itself.
    async fn ensure_authenticated(&self, permission_denied: bool) -> Result<()> {
        match &self.auth {
            VaultAuthMethod::AppRole { role_id, secret_name } => {
                self.app_role_login(role_id, secret_name, permission_denied).await?;
            }
            VaultAuthMethod::Kubernetes { role } => {
                self.kubernetes_login(role, permission_denied).await?;
            }
            VaultAuthMethod::ClientCert { role } => {
                self.client_cert_login(role, permission_denied).await?;
            }
            VaultAuthMethod::Token => {
                if permission_denied {
                    return Err(self.auth_error("token permission denied"));
                }
            }
            VaultAuthMethod::Unknown => {}
        }

        let state = self.token.lock().await;
        if state.token.is_none() {
            return Err(self.auth_error("no vault access token"));
        }
        Ok(())
    }

    async fn kubernetes_login(&self, role: &str, force: bool) -> Result<()> {
        let mut state = self.token.lock().await;
        if !force && state.token.is_some() && !state.is_expired() {
            return Ok(());
        }
        debug!(vault = %self.name, forced = force, "kubernetes login");

        let jwt = tokio::fs::read_to_string(SERVICE_ACCOUNT_TOKEN_PATH)
            .await
            .map_err(|_| self.auth_error("missing service account token"))?;
        let jwt = jwt.trim();
        if jwt.is_empty() {
            return Err(self.auth_error("missing service account token"));
        }

        let body = json!({ "jwt": jwt, "role": role });
        let response = self.post_with_retry("/v1/auth/kubernetes/login", &body).await;
        self.apply_login_response(&mut state, response)
    }

    async fn app_role_login(&self, role_id: &str, secret_name: &str, force: bool) -> Result<()> {
        let mut state = self.token.lock().await;
        if !force && state.token.is_some() && !state.is_expired() {
            return Ok(());
        }
        debug!(vault = %self.name, forced = force, "appRole login");

        let secret = read_local_secret(&self.mount, "system", secret_name)
            .await?
            .ok_or_else(|| self.auth_error(format!("appRole secret {secret_name} not found")))?;
        let secret_id = secret.get_str("secret-id").ok_or_else(|| {
            self.auth_error(format!("appRole secret id not found at '{secret_name}/secret-id'"))
        })?;
        if secret_id.is_empty() {
            return Err(self.auth_error("missing app-role-secret-id"));
        }

        let body = json!({ "role_id": role_id, "secret_id": secret_id });
        let response = self.post_with_retry("/v1/auth/approle/login", &body).await;
        self.apply_login_response(&mut state, response)
    }

    async fn client_cert_login(&self, role: &str, force: bool) -> Result<()> {
        let mut state = self.token.lock().await;
        if !force && state.token.is_some() && !state.is_expired() {
            return Ok(());
        }
        debug!(vault = %self.name, forced = force, "client certificate login");

        // An empty name is accepted but makes the vault search for the
        // certificate being used.
        let body = json!({ "name": role });
        let response = self.post_with_retry("/v1/auth/cert/login", &body).await;
        self.apply_login_response(&mut state, response)
    }

    /// Digest a login response into the token state.
    fn apply_login_response(
        &self,
        state: &mut TokenState,
        response: Result<HttpResponse>,
    ) -> Result<()> {
        let response = response
            .map_err(|e| self.auth_error(format!("login communication error: {e}")))?;
        if response.status != 200 {
            return Err(self.auth_error(format!(
                "login failed [{}] - response: {}",
                response.status,
                response.body_text()
            )));
        }
        if response.body.is_empty() {
            return Err(self.auth_error("empty login response"));
        }
        let payload: serde_json::Value = serde_json::from_slice(&response.body)
            .map_err(|e| self.auth_error(format!("parsing login response: {e}")))?;

        let token = payload
            .pointer("/auth/client_token")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("");
        if token.is_empty() {
            return Err(self.auth_error("login response missing client_token"));
        }

        let lease_duration = payload
            .pointer("/auth/lease_duration")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);

        state.token = Some(SecretString::new(token));
        state.renewable = payload
            .pointer("/auth/renewable")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        // Zero means the token never expires. Renewal is not implemented; a
        // token nearing expiry is simply replaced by the next login.
        state.expires_at = if lease_duration == 0 {
            None
        } else {
            Some(Utc::now() + chrono::Duration::seconds(lease_duration as i64))
        };

        info!(vault = %self.name, lease_duration, "obtained vault token");
        Ok(())
    }

    async fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        {
            let state = self.token.lock().await;
            if let Some(token) = &state.token {
                headers.push(("X-Vault-Token".to_string(), token.expose_secret().to_string()));
            }
        }
        self.push_common_headers(&mut headers);
        headers
    }

    fn login_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        self.push_common_headers(&mut headers);
        headers
    }

    fn push_common_headers(&self, headers: &mut Vec<(String, String)>) {
        if let Some(namespace) = &self.namespace {
            headers.push(("X-Vault-Namespace".to_string(), namespace.clone()));
        }
        if let Some((user, password)) = &self.basic_auth {
            use base64::Engine;
            let credentials = base64::engine::general_purpose::STANDARD
                .encode(format!("{user}:{}", password.expose_secret()));
            headers.push(("Authorization".to_string(), format!("Basic {credentials}")));
        }
    }

    async fn get_with_retry(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse> {
        let mut attempts_left = self.retries;
        loop {
            match self.transport.get(url, headers).await {
                Ok(response) => return Ok(response),
                Err(e) if attempts_left > 0 => {
                    attempts_left -= 1;
                    error!(vault = %self.name, error = %e,
                        "retrying vault request after communication error");
                    if !self.retry_wait.is_zero() {
                        tokio::time::sleep(self.retry_wait).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_with_retry(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        let url = format!("{}{}", self.scheme_host_port, path);
        let headers = self.login_headers();
        let mut attempts_left = self.retries;
        loop {
            match self.transport.post_json(&url, &headers, body).await {
                Ok(response) => return Ok(response),
                Err(e) if attempts_left > 0 => {
                    attempts_left -= 1;
                    error!(vault = %self.name, error = %e,
                        "retrying vault login after communication error");
                    if !self.retry_wait.is_zero() {
                        tokio::time::sleep(self.retry_wait).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn auth_error(&self, message: impl fmt::Display) -> SecretsError {
        let err = SecretsError::vault_auth(&self.name, self.auth.label(), message.to_string());
        error!(error = %err, "vault auth error");
        err
    }
}
