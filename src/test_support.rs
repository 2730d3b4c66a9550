use crate::{
    config::GatewaySettings,
    identity::Identity,
    oidc::{OidcClientGeneric, OidcGatewayClientTrait, ProviderEndpoints},
};
use actix_web::web;
use chrono::{Duration, Utc};
use oauth2::{AccessToken, AuthUrl, TokenUrl};
use openidconnect::{
    core::{
        CoreIdToken, CoreIdTokenClaims, CoreJsonWebKeySet, CoreJwsSigningAlgorithm,
        CoreRsaPrivateSigningKey,
    },
    Audience, EmptyAdditionalClaims, EndUserEmail, IssuerUrl, JsonWebKeyId, Nonce,
    PrivateSigningKey, StandardClaims, SubjectIdentifier,
};
use std::{collections::HashMap, env::VarError};

pub(crate) const ISSUER: &str = "http://localhost:8080";
pub(crate) const CLIENT_ID: &str = "zixel";
pub(crate) const REDIRECT_URL: &str = "http://localhost:3000/auth/callback";

const KEY_ID: &str = "gateway-test-key";
const SIGNING_KEY_PEM: &str = include_str!("../tests/fixtures/test_rsa_key.pem");
const FOREIGN_KEY_PEM: &str = include_str!("../tests/fixtures/other_rsa_key.pem");

pub(crate) fn settings(audience: Option<&'static str>) -> GatewaySettings {
    let mut values: HashMap<&str, &str> = HashMap::from([
        ("AUTHORITY", ISSUER),
        ("CLIENT_ID", CLIENT_ID),
        ("CLIENT_SECRET", "zixel-secret"),
        ("REDIRECT_URL", REDIRECT_URL),
        ("OIDC_SCOPES", "profile,email"),
        ("COOKIE_DOMAIN", "localhost"),
        ("COOKIE_SECURE", "false"),
    ]);
    if let Some(audience) = audience {
        values.insert("OIDC_AUDIENCE", audience);
    }
    GatewaySettings::from_lookup(|name| {
        values
            .get(name)
            .map(|value| value.to_string())
            .ok_or(VarError::NotPresent)
    })
    .expect("test settings are valid")
}

fn signing_key(pem: &str) -> CoreRsaPrivateSigningKey {
    CoreRsaPrivateSigningKey::from_pem(pem, Some(JsonWebKeyId::new(KEY_ID.to_string())))
        .expect("fixture key is a PKCS#1 RSA key")
}

pub(crate) fn jwks() -> CoreJsonWebKeySet {
    CoreJsonWebKeySet::new(vec![signing_key(SIGNING_KEY_PEM).as_verification_key()])
}

pub(crate) fn endpoints() -> ProviderEndpoints {
    ProviderEndpoints {
        issuer: IssuerUrl::new(ISSUER.to_string()).unwrap(),
        authorization_endpoint: AuthUrl::new(format!("{}/authorize", ISSUER)).unwrap(),
        token_endpoint: Some(TokenUrl::new(format!("{}/token", ISSUER)).unwrap()),
        jwks: jwks(),
    }
}

pub(crate) struct TokenSpec {
    pub(crate) subject: &'static str,
    pub(crate) issuer: &'static str,
    pub(crate) audience: &'static str,
    pub(crate) expires_in: Duration,
    pub(crate) nonce: Option<&'static str>,
    pub(crate) access_token: Option<&'static str>,
    pub(crate) foreign_key: bool,
}

impl Default for TokenSpec {
    fn default() -> Self {
        Self {
            subject: "alice",
            issuer: ISSUER,
            audience: CLIENT_ID,
            expires_in: Duration::minutes(5),
            nonce: None,
            access_token: None,
            foreign_key: false,
        }
    }
}

/// RS256 JWT signed with the fixture key, or with an unrelated key carrying the same key id.
pub(crate) fn mint_token(spec: &TokenSpec) -> String {
    let now = Utc::now();
    let claims = CoreIdTokenClaims::new(
        IssuerUrl::new(spec.issuer.to_string()).unwrap(),
        vec![Audience::new(spec.audience.to_string())],
        now + spec.expires_in,
        now - Duration::minutes(10),
        StandardClaims::new(SubjectIdentifier::new(spec.subject.to_string()))
            .set_email(Some(EndUserEmail::new(format!("{}@example.com", spec.subject)))),
        EmptyAdditionalClaims {},
    )
    .set_nonce(spec.nonce.map(|nonce| Nonce::new(nonce.to_string())));

    let key = if spec.foreign_key {
        signing_key(FOREIGN_KEY_PEM)
    } else {
        signing_key(SIGNING_KEY_PEM)
    };
    let access_token = spec
        .access_token
        .map(|token| AccessToken::new(token.to_string()));

    CoreIdToken::new(
        claims,
        &key,
        CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256,
        access_token.as_ref(),
        None,
    )
    .unwrap()
    .to_string()
}

pub(crate) fn identity(subject: &str) -> Identity {
    let now = Utc::now();
    Identity {
        subject: subject.to_string(),
        issuer: ISSUER.to_string(),
        audiences: vec![CLIENT_ID.to_string()],
        expires_at: now + Duration::minutes(5),
        issued_at: now,
        email: None,
        preferred_username: None,
    }
}

pub(crate) fn mock_data<C: OidcGatewayClientTrait>(
    client: C,
) -> web::Data<OidcClientGeneric<C>> {
    web::Data::new(OidcClientGeneric::new(client, settings(None)))
}
