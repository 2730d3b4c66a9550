use crate::{
    cookie::{ChallengeCipher, CookieSettings},
    env_var,
    route::AUTH_CALLBACK_PATH,
};
use oauth2::{url::Url, AuthUrl, ClientId, ClientSecret, RedirectUrl, Scope, TokenUrl};
use openidconnect::IssuerUrl;
use std::{
    collections::HashSet,
    env::{self, VarError},
    time::Duration,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            name,
            reason: reason.to_string(),
        }
    }
}

/// Static configuration of the gateway.
///
/// Built once at startup, either from the process environment with
/// [`GatewaySettings::from_env`] or from any key lookup with
/// [`GatewaySettings::from_lookup`], and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct GatewaySettings {
    pub(crate) authority: IssuerUrl,
    pub(crate) client_id: ClientId,
    pub(crate) client_secret: ClientSecret,
    pub(crate) redirect_url: RedirectUrl,
    pub(crate) scopes: HashSet<Scope>,
    pub(crate) audience: String,
    pub(crate) authorization_endpoint: Option<AuthUrl>,
    pub(crate) token_endpoint: Option<TokenUrl>,
    pub(crate) cookie: CookieSettings,
    pub(crate) challenge_cipher: ChallengeCipher,
    pub(crate) http_timeout: Duration,
    pub bind_address: String,
}

impl GatewaySettings {
    const SCOPE_OPENID: &'static str = "openid";
    const DEFAULT_SCOPES: &'static str = "profile,email";
    const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;
    const DEFAULT_ACCESS_TOKEN_LIFETIME_SECONDS: i64 = 60 * 60;
    const DEFAULT_BIND_ADDRESS: &'static str = "127.0.0.1:8080";

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let authority = IssuerUrl::new(Self::required(&lookup, env_var::AUTHORITY)?)
            .map_err(|err| ConfigError::invalid(env_var::AUTHORITY, err))?;
        let client_id = Self::required(&lookup, env_var::CLIENT_ID)?;
        let client_secret = Self::required(&lookup, env_var::CLIENT_SECRET)?;
        let redirect_url = RedirectUrl::new(Self::required(&lookup, env_var::REDIRECT_URL)?)
            .map_err(|err| ConfigError::invalid(env_var::REDIRECT_URL, err))?;

        if redirect_url.url().path() != AUTH_CALLBACK_PATH {
            log::warn!(
                "{} does not point at {}, the provider will redirect to a route the gateway does not serve.",
                env_var::REDIRECT_URL,
                AUTH_CALLBACK_PATH
            );
        }

        let audience =
            Self::optional(&lookup, env_var::OIDC_AUDIENCE).unwrap_or_else(|| client_id.clone());

        let authorization_endpoint = Self::optional(&lookup, env_var::AUTHORIZATION_ENDPOINT)
            .map(AuthUrl::new)
            .transpose()
            .map_err(|err| ConfigError::invalid(env_var::AUTHORIZATION_ENDPOINT, err))?;
        let token_endpoint = Self::optional(&lookup, env_var::TOKEN_ENDPOINT)
            .map(TokenUrl::new)
            .transpose()
            .map_err(|err| ConfigError::invalid(env_var::TOKEN_ENDPOINT, err))?;

        let cookie = CookieSettings {
            domain: Self::optional(&lookup, env_var::COOKIE_DOMAIN),
            secure: Self::parse_or(&lookup, env_var::COOKIE_SECURE, true)?,
            lifetime_seconds: Self::parse_or(
                &lookup,
                env_var::ACCESS_TOKEN_LIFETIME_SECONDS,
                Self::DEFAULT_ACCESS_TOKEN_LIFETIME_SECONDS,
            )?,
        };
        if cookie.lifetime_seconds <= 0 {
            return Err(ConfigError::invalid(
                env_var::ACCESS_TOKEN_LIFETIME_SECONDS,
                "must be positive",
            ));
        }

        let challenge_cipher = match Self::optional(&lookup, env_var::ENCRYPTION_KEY) {
            Some(key) => ChallengeCipher::new(key.as_bytes())
                .map_err(|err| ConfigError::invalid(env_var::ENCRYPTION_KEY, err))?,
            None => {
                log::debug!(
                    "{} not set, challenge cookies only survive this process.",
                    env_var::ENCRYPTION_KEY
                );
                ChallengeCipher::random()
            }
        };

        let http_timeout = Duration::from_secs(Self::parse_or(
            &lookup,
            env_var::HTTP_TIMEOUT_SECONDS,
            Self::DEFAULT_HTTP_TIMEOUT_SECONDS,
        )?);

        Ok(Self {
            authority,
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            redirect_url,
            scopes: Self::make_scopes_from_env(lookup(env_var::OIDC_SCOPES)),
            audience,
            authorization_endpoint,
            token_endpoint,
            cookie,
            challenge_cipher,
            http_timeout,
            bind_address: Self::optional(&lookup, env_var::BIND_ADDRESS)
                .unwrap_or_else(|| Self::DEFAULT_BIND_ADDRESS.to_string()),
        })
    }

    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    pub fn redirect_url(&self) -> &Url {
        self.redirect_url.url()
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    fn make_scopes_from_env(env_var_oidc_scopes: Result<String, VarError>) -> HashSet<Scope> {
        let env_scopes =
            env_var_oidc_scopes.unwrap_or_else(|_| Self::DEFAULT_SCOPES.to_string());
        let mut scopes: HashSet<Scope> = env_scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Scope::new(s.to_string()))
            .collect();
        scopes.insert(Scope::new(Self::SCOPE_OPENID.to_string()));
        scopes
    }

    fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        Self::optional(lookup, name).ok_or(ConfigError::Missing(name))
    }

    fn optional<F>(lookup: &F, name: &'static str) -> Option<String>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        lookup(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
        T: std::str::FromStr,
        T::Err: ToString,
    {
        match Self::optional(lookup, name) {
            Some(value) => value
                .parse::<T>()
                .map_err(|err| ConfigError::invalid(name, err)),
            None => Ok(default),
        }
    }
}
