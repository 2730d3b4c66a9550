use crate::{
    oidc::{OidcClientGeneric, OidcError, OidcGatewayClient, OidcGatewayClientTrait},
    route::plain_text_response,
    types::AccessTokenParams,
    ACCESS_TOKEN_COOKIE,
};
use actix_web::{
    http::{header, StatusCode},
    web, FromRequest, HttpRequest, HttpResponse, ResponseError,
};
use actix_web::HttpMessage;
use chrono::{DateTime, Utc};
use openidconnect::core::CoreIdTokenClaims;
use serde::{Deserialize, Serialize};
use std::{
    future::{ready, Ready},
    marker::PhantomData,
    rc::Rc,
};
use thiserror::Error;

/// Identity of the subject of a verified token.
///
/// Only produced by [`OidcGatewayClientTrait::verify_bearer_token`] and
/// [`OidcGatewayClientTrait::verify_id_token`], never from unverified input.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Identity {
    pub subject: String,
    pub issuer: String,
    pub audiences: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
}

impl From<&CoreIdTokenClaims> for Identity {
    fn from(claims: &CoreIdTokenClaims) -> Self {
        Self {
            subject: claims.subject().as_str().to_owned(),
            issuer: claims.issuer().as_str().to_owned(),
            audiences: claims
                .audiences()
                .iter()
                .map(|audience| audience.as_str().to_owned())
                .collect(),
            expires_at: claims.expiration(),
            issued_at: claims.issue_time(),
            email: claims.email().map(|email| email.as_str().to_owned()),
            preferred_username: claims
                .preferred_username()
                .map(|username| username.as_str().to_owned()),
        }
    }
}

pub type VerifiedIdentity = UserIdentity<OidcGatewayClient>;

/// Extractor for the verified identity of the caller.
///
/// Reuses the identity placed in the request extensions by
/// [`RequireIdentity`](crate::middleware::RequireIdentity), otherwise verifies
/// the bearer token of the request.
#[derive(Debug)]
pub struct UserIdentity<C: OidcGatewayClientTrait> {
    pub identity: Rc<Identity>,
    _c: PhantomData<C>,
}

impl<C: OidcGatewayClientTrait> Clone for UserIdentity<C> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            _c: PhantomData,
        }
    }
}

impl<C: OidcGatewayClientTrait> From<Rc<Identity>> for UserIdentity<C> {
    fn from(value: Rc<Identity>) -> Self {
        Self {
            identity: value,
            _c: PhantomData,
        }
    }
}

impl<C: OidcGatewayClientTrait> std::ops::Deref for UserIdentity<C> {
    type Target = Identity;

    fn deref(&self) -> &Self::Target {
        &self.identity
    }
}

impl<C> FromRequest for UserIdentity<C>
where
    C: OidcGatewayClientTrait + 'static,
{
    type Error = IdentityError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(identity_from_request::<C>(req).map(UserIdentity::from))
    }
}

pub(crate) fn identity_from_request<C>(req: &HttpRequest) -> Result<Rc<Identity>, IdentityError>
where
    C: OidcGatewayClientTrait + 'static,
{
    if let Some(identity) = req.extensions().get::<Rc<Identity>>() {
        return Ok(identity.clone());
    }

    let client = req
        .app_data::<web::Data<OidcClientGeneric<C>>>()
        .ok_or(IdentityError::ClientMissing)?;
    let token = bearer_token(req).ok_or(IdentityError::MissingToken)?;

    match client.client.verify_bearer_token(&token) {
        Ok(identity) => {
            log::debug!("token verified for subject {}.", identity.subject);
            Ok(Rc::new(identity))
        }
        Err(err) => {
            log::warn!("Rejected token: {}.", err);
            Err(IdentityError::Verification(err))
        }
    }
}

/// Token presented by the caller: the `access_token` query parameter, an
/// `Authorization: Bearer` header or the `access_token` cookie, in that order.
pub(crate) fn bearer_token(req: &HttpRequest) -> Option<String> {
    let non_empty = |token: &str| {
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_owned())
    };

    web::Query::<AccessTokenParams>::from_query(req.query_string())
        .ok()
        .and_then(|params| params.into_inner().access_token)
        .and_then(|token| non_empty(&token))
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim_start().split_once(' '))
                .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
                .and_then(|(_, token)| non_empty(token))
        })
        .or_else(|| {
            req.cookie(ACCESS_TOKEN_COOKIE)
                .and_then(|cookie| non_empty(cookie.value()))
        })
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Oidc client missing in adapter. Make sure it is registrered.")]
    ClientMissing,
    #[error("Missing access token")]
    MissingToken,
    #[error("{0}")]
    Verification(#[source] OidcError),
}

impl ResponseError for IdentityError {
    fn status_code(&self) -> StatusCode {
        match self {
            IdentityError::ClientMissing => StatusCode::INTERNAL_SERVER_ERROR,
            IdentityError::MissingToken | IdentityError::Verification(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        plain_text_response(self.status_code(), self.to_string())
    }
}
