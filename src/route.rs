use actix_web::{
    http::{
        header::{self, ContentType},
        StatusCode,
    },
    web, HttpRequest, HttpResponse, Responder,
};
use oauth2::PkceCodeChallenge;
use openidconnect::{Nonce, OAuth2TokenResponse};

use crate::{
    cookie::CookieHelper,
    identity::UserIdentity,
    oidc::{OidcClientGeneric, OidcGatewayClientTrait},
    types::{AuthCallbackParams, AuthLoginParams, ChallengeState},
};

pub(crate) const AUTH_SCOPE: &str = "/auth";
pub(crate) const AUTH_LOGIN_PATH: &str = "/auth/login";
pub(crate) const AUTH_CALLBACK_PATH: &str = "/auth/callback";
pub(crate) const USER_SCOPE: &str = "/user";
const ROOT_PATH: &str = "/";

pub(crate) fn configure<C: OidcGatewayClientTrait + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(AUTH_SCOPE)
            .route("/login", web::get().to(auth_login::<C>))
            .route("/callback", web::get().to(auth_callback::<C>)),
    )
    .service(
        web::scope(USER_SCOPE)
            .route("", web::get().to(user_greeting::<C>))
            .route("/claims", web::get().to(user_claims::<C>)),
    );
}

pub(crate) async fn auth_callback<C: OidcGatewayClientTrait + 'static>(
    req: HttpRequest,
    params: web::Query<AuthCallbackParams>,
    client: web::Data<OidcClientGeneric<C>>,
) -> impl Responder {
    if let Some(error) = &params.error {
        log::warn!("authorization server returned error {}.", error);
        if let Some(description) = &params.error_description {
            return bad_request(description.clone());
        }
        return bad_request(error.to_owned());
    }

    let code = match params.code.as_deref().filter(|code| !code.is_empty()) {
        Some(code) => code,
        None => return bad_request("Missing authorization code"),
    };

    let challenge_state =
        match CookieHelper::challenge_from_request(&req, &client.settings.challenge_cipher) {
            Ok(challenge_state) => challenge_state,
            Err(err) => {
                log::warn!("Not able to read challenge: {}.", err);
                return bad_request(err.to_string());
            }
        };

    if params.state.as_deref() != Some(challenge_state.csrf_token.as_str()) {
        return bad_request("CSRF token doesn't match.");
    }

    let token_response = match client
        .client
        .exchange_code(code.to_owned(), challenge_state.pkce_verifier)
        .await
    {
        Ok(token_response) => token_response,
        Err(err) => {
            log::warn!("{}", err);
            return bad_request(err.to_string());
        }
    };

    match client
        .client
        .verify_id_token(&token_response, &Nonce::new(challenge_state.nonce))
    {
        Ok(Some(identity)) => log::info!("user {} signed in.", identity.subject),
        Ok(None) => log::debug!("token response carried no id token."),
        Err(err) => {
            log::warn!("Rejected id token: {}.", err);
            return bad_request(err.to_string());
        }
    }

    let mut response = HttpResponse::Found();
    response.cookie(CookieHelper::access_token_cookie(
        &client.settings.cookie,
        token_response.access_token().secret(),
    ));
    CookieHelper::remove_challenge_cookie(&req, &mut response);

    response
        .append_header((header::LOCATION, challenge_state.path))
        .finish()
}

pub(crate) async fn auth_login<C: OidcGatewayClientTrait + 'static>(
    req: HttpRequest,
    params: web::Query<AuthLoginParams>,
    client: web::Data<OidcClientGeneric<C>>,
) -> impl Responder {
    let path = params
        .path
        .as_deref()
        .filter(|path| is_local_path(path))
        .unwrap_or(ROOT_PATH)
        .to_string();

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, csrf_token, nonce) = client.client.authorize_url(pkce_challenge);

    let challenge_state = ChallengeState::new(pkce_verifier, csrf_token, nonce, path);
    let challenge_cookie = match CookieHelper::challenge_cookie(
        &client.settings.cookie,
        &client.settings.challenge_cipher,
        &challenge_state,
    ) {
        Ok(challenge_cookie) => challenge_cookie,
        Err(err) => return plain_text_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };

    let mut response = HttpResponse::Found();
    response.cookie(challenge_cookie);
    CookieHelper::remove_access_token_cookie(&req, &client.settings.cookie, &mut response);

    response
        .append_header((header::LOCATION, auth_url.to_string()))
        .finish()
}

pub(crate) async fn user_greeting<C: OidcGatewayClientTrait + 'static>(
    user: UserIdentity<C>,
) -> impl Responder {
    HttpResponse::Ok().body(format!("Hello, {}!", user.subject))
}

pub(crate) async fn user_claims<C: OidcGatewayClientTrait + 'static>(
    user: UserIdentity<C>,
) -> impl Responder {
    HttpResponse::Ok().json(user.identity.as_ref())
}

/// Error bodies may carry text chosen by the caller and must never be sniffed as markup.
pub(crate) fn plain_text_response(status: StatusCode, body: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status)
        .content_type(ContentType::plaintext())
        .insert_header((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .body(body.into())
}

fn bad_request(body: impl Into<String>) -> HttpResponse {
    plain_text_response(StatusCode::BAD_REQUEST, body)
}

/// Only same-origin paths are accepted as post-login targets.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}
