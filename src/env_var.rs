pub(crate) const AUTHORITY: &str = "AUTHORITY";
pub(crate) const CLIENT_ID: &str = "CLIENT_ID";
pub(crate) const CLIENT_SECRET: &str = "CLIENT_SECRET";
pub(crate) const REDIRECT_URL: &str = "REDIRECT_URL";

/// Comma seperated list of scopes.
pub(crate) const OIDC_SCOPES: &str = "OIDC_SCOPES";
/// Expected `aud` of verified tokens. Falls back to [`CLIENT_ID`].
pub(crate) const OIDC_AUDIENCE: &str = "OIDC_AUDIENCE";

pub(crate) const AUTHORIZATION_ENDPOINT: &str = "AUTHORIZATION_ENDPOINT";
pub(crate) const TOKEN_ENDPOINT: &str = "TOKEN_ENDPOINT";

pub(crate) const COOKIE_DOMAIN: &str = "COOKIE_DOMAIN";
pub(crate) const COOKIE_SECURE: &str = "COOKIE_SECURE";
pub(crate) const ACCESS_TOKEN_LIFETIME_SECONDS: &str = "ACCESS_TOKEN_LIFETIME_SECONDS";

/// 32 character key used to encrypt the challenge cookie.
pub(crate) const ENCRYPTION_KEY: &str = "ENCRYPTION_KEY";

pub(crate) const HTTP_TIMEOUT_SECONDS: &str = "HTTP_TIMEOUT_SECONDS";
pub(crate) const BIND_ADDRESS: &str = "BIND_ADDRESS";
