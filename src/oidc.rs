use crate::config::GatewaySettings;
use crate::http_client::HttpClient;
use crate::identity::Identity;
use crate::route;
use actix_web::web;
use async_trait::async_trait;
use oauth2::url::Url;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, CsrfToken, ErrorResponse, PkceCodeChallenge,
    PkceCodeVerifier, Scope, TokenUrl,
};
use openidconnect::core::{
    CoreAuthenticationFlow, CoreClient, CoreIdToken, CoreIdTokenVerifier, CoreJsonWebKeySet,
    CoreProviderMetadata, CoreTokenResponse,
};
use openidconnect::{
    AccessTokenHash, ClaimsVerificationError, IssuerUrl, Nonce, OAuth2TokenResponse,
    RequestTokenError, TokenResponse,
};
use std::collections::HashSet;
use std::error::Error;
use std::str::FromStr;

pub type OidcClient = OidcClientGeneric<OidcGatewayClient>;

impl OidcClient {
    /// Discovers the provider configured in `settings` and wraps the resulting
    /// client for registration as app data.
    ///
    /// Verification cannot work without provider metadata, so a failure here is
    /// meant to stop the host from serving. Retrying is left to the caller.
    pub async fn setup(settings: GatewaySettings) -> Result<web::Data<OidcClient>, InitError> {
        OidcGatewayClient::discover(&settings)
            .await
            .map(|client| web::Data::new(OidcClient::new(client, settings)))
    }
}

pub struct OidcClientGeneric<OGC: OidcGatewayClientTrait> {
    pub client: OGC,
    pub settings: GatewaySettings,
}

impl<OGC: OidcGatewayClientTrait> OidcClientGeneric<OGC> {
    pub fn new(client: OGC, settings: GatewaySettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
pub trait OidcGatewayClientTrait {
    fn authorize_url(&self, challenge: PkceCodeChallenge) -> (Url, CsrfToken, Nonce);

    async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: String,
    ) -> Result<CoreTokenResponse, OidcError>;

    /// Verifies the ID token of a token response, when one was returned.
    fn verify_id_token(
        &self,
        token_response: &CoreTokenResponse,
        nonce: &Nonce,
    ) -> Result<Option<Identity>, OidcError>;

    fn verify_bearer_token(&self, token: &str) -> Result<Identity, OidcError>;
}

/// Endpoints and key material of the provider, as discovered or overridden.
#[derive(Clone, Debug)]
pub(crate) struct ProviderEndpoints {
    pub(crate) issuer: IssuerUrl,
    pub(crate) authorization_endpoint: AuthUrl,
    pub(crate) token_endpoint: Option<TokenUrl>,
    pub(crate) jwks: CoreJsonWebKeySet,
}

impl From<&CoreProviderMetadata> for ProviderEndpoints {
    fn from(metadata: &CoreProviderMetadata) -> Self {
        Self {
            issuer: metadata.issuer().clone(),
            authorization_endpoint: metadata.authorization_endpoint().clone(),
            token_endpoint: metadata.token_endpoint().cloned(),
            jwks: metadata.jwks().clone(),
        }
    }
}

pub struct OidcGatewayClient {
    client: CoreClient,
    bearer_verifier: CoreIdTokenVerifier<'static>,
    scopes: HashSet<Scope>,
    http: HttpClient,
}

#[async_trait]
impl OidcGatewayClientTrait for OidcGatewayClient {
    fn authorize_url(&self, challenge: PkceCodeChallenge) -> (Url, CsrfToken, Nonce) {
        self.client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .add_scopes(self.scopes.clone())
            .set_pkce_challenge(challenge)
            .url()
    }

    async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: String,
    ) -> Result<CoreTokenResponse, OidcError> {
        log::debug!("exchanging authorization code.");

        let http = self.http.clone();
        self.client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(move |request| http.execute(request))
            .await
            .map_err(|err| OidcError::ExchangeCode(describe_token_error(&err)))
    }

    fn verify_id_token(
        &self,
        token_response: &CoreTokenResponse,
        nonce: &Nonce,
    ) -> Result<Option<Identity>, OidcError> {
        let id_token = match token_response.id_token() {
            Some(id_token) => id_token,
            None => return Ok(None),
        };
        let claims = id_token.claims(&self.client.id_token_verifier(), nonce)?;

        if let Some(expected_access_token_hash) = claims.access_token_hash() {
            let signing_alg = id_token
                .signing_alg()
                .map_err(|err| OidcError::SigningAlgorithm(err.to_string()))?;
            let actual_access_token_hash =
                AccessTokenHash::from_token(token_response.access_token(), &signing_alg)
                    .map_err(|err| OidcError::SigningAlgorithm(err.to_string()))?;
            if actual_access_token_hash != *expected_access_token_hash {
                return Err(OidcError::AccessTokenHash);
            }
        }

        Ok(Some(Identity::from(claims)))
    }

    fn verify_bearer_token(&self, token: &str) -> Result<Identity, OidcError> {
        let id_token = CoreIdToken::from_str(token).map_err(OidcError::MalformedToken)?;
        let claims = id_token.claims(&self.bearer_verifier, skip_nonce)?;

        Ok(Identity::from(claims))
    }
}

impl OidcGatewayClient {
    pub async fn discover(settings: &GatewaySettings) -> Result<OidcGatewayClient, InitError> {
        let http = HttpClient::new(settings.http_timeout)?;

        log::info!("discovering provider {}.", settings.authority.as_str());
        let discovery_http = http.clone();
        let provider_metadata = CoreProviderMetadata::discover_async(
            settings.authority.clone(),
            move |request| discovery_http.clone().execute(request),
        )
        .await
        .map_err(|err| InitError::Discovery(describe(&err)))?;
        log::debug!(
            "provider discovered with {} signing keys.",
            provider_metadata.jwks().keys().len()
        );

        OidcGatewayClient::from_endpoints(
            settings,
            ProviderEndpoints::from(&provider_metadata),
            http,
        )
    }

    pub(crate) fn from_endpoints(
        settings: &GatewaySettings,
        endpoints: ProviderEndpoints,
        http: HttpClient,
    ) -> Result<OidcGatewayClient, InitError> {
        let authorization_endpoint = settings
            .authorization_endpoint
            .clone()
            .unwrap_or(endpoints.authorization_endpoint);
        let token_endpoint = settings
            .token_endpoint
            .clone()
            .or(endpoints.token_endpoint)
            .ok_or(InitError::MissingTokenEndpoint)?;

        let client = CoreClient::new(
            settings.client_id.clone(),
            Some(settings.client_secret.clone()),
            endpoints.issuer.clone(),
            authorization_endpoint,
            Some(token_endpoint),
            None,
            endpoints.jwks.clone(),
        )
        .set_redirect_uri(settings.redirect_url.clone());

        let bearer_verifier = CoreIdTokenVerifier::new_public_client(
            ClientId::new(settings.audience.clone()),
            endpoints.issuer,
            endpoints.jwks,
        );

        Ok(OidcGatewayClient {
            client,
            bearer_verifier,
            scopes: settings.scopes.clone(),
            http,
        })
    }

    pub fn oidc_web_configurations(cfg: &mut web::ServiceConfig) {
        route::configure::<OidcGatewayClient>(cfg);
    }
}

/// Bearer tokens are not bound to a login request, there is no nonce to compare.
fn skip_nonce(_: Option<&Nonce>) -> Result<(), String> {
    Ok(())
}

fn describe(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message = format!("{}: {}", message, inner);
        source = inner.source();
    }
    message
}

fn describe_token_error<RE, T>(err: &RequestTokenError<RE, T>) -> String
where
    RE: Error + 'static,
    T: ErrorResponse + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => format!(
            "{}: {}",
            err,
            serde_json::to_string(response).unwrap_or_default()
        ),
        other => describe(other),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("Not able to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Provider discovery failed: {0}")]
    Discovery(String),
    #[error("Provider has no token endpoint and TOKEN_ENDPOINT is not set.")]
    MissingTokenEndpoint,
}

#[derive(thiserror::Error, Debug)]
pub enum OidcError {
    #[error("Not able to exchange code for token: {0}.")]
    ExchangeCode(String),
    #[error("Malformed token: {0}")]
    MalformedToken(#[source] serde_json::Error),
    #[error("{0}")]
    Verification(#[from] ClaimsVerificationError),
    #[error("Not able to check signing algorithm: {0}")]
    SigningAlgorithm(String),
    #[error("Invalid access token")]
    AccessTokenHash,
}
