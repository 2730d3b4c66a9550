#![allow(rustdoc::invalid_rust_codeblocks)]
#![doc = r#"
# actix-oidc-gateway

A small OAuth2 authorization code and OpenID Connect gateway for the [Actix web framework](https://actix.rs).

The gateway sends browsers to the identity provider, exchanges the returned authorization code for tokens
and verifies the bearer tokens presented on later requests against the provider's published signing keys.
Verification checks signature, issuer, audience and expiry, and the verified claims are exposed to handlers
as an [`Identity`](identity::Identity).

Provider discovery, code exchange and token verification are powered by the [openidconnect](https://docs.rs/openidconnect) crate.

# Getting started

```rust,ignore
use actix_oidc_gateway::{
    config::GatewaySettings,
    identity::VerifiedIdentity,
    middleware::RequireIdentity,
    oidc::{OidcClient, OidcGatewayClient},
};
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use dotenv::dotenv;
use env_logger::Env;

#[get("/words")]
async fn words(user: VerifiedIdentity) -> impl Responder {
    HttpResponse::Ok().body(format!("Words for {}", user.subject))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let settings = GatewaySettings::from_env().map_err(std::io::Error::other)?;

    // Discover the provider once. The gateway cannot verify tokens without it.
    let oidc_client = OidcClient::setup(settings).await.map_err(std::io::Error::other)?;

    HttpServer::new(move || {
        App::new()
            // Register the OIDC client as app data such that it is available for handlers and middleware.
            .app_data(oidc_client.clone())
            // Register /auth/login, /auth/callback, /user and /user/claims
            .configure(OidcGatewayClient::oidc_web_configurations)
            .service(
                web::scope("/app")
                    // Require a verified identity for the whole scope
                    .wrap(RequireIdentity::new())
                    .service(words),
            )
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
```

## Routes

- `GET /auth/login?path=/somewhere` redirects to the provider's authorization endpoint with a
  state, nonce and PKCE challenge. The challenge is kept in an encrypted cookie scoped to the callback.
- `GET /auth/callback?code=..&state=..` validates the state, exchanges the code, verifies the ID token
  when one is returned and stores the access token in the `access_token` cookie.
- `GET /user` greets the subject of a verified token, `GET /user/claims` returns its claims as JSON.

A token is read from the `access_token` query parameter, the `Authorization: Bearer` header or the
`access_token` cookie, in that order.

## Protecting handlers

Add [`VerifiedIdentity`](identity::VerifiedIdentity) as a handler parameter to require a verified token
for a single service, or wrap a scope with [`RequireIdentity`](middleware::RequireIdentity). The middleware
redirects callers without a token to the login route and rejects invalid tokens with `400 Bad Request`.

## Configuration

All settings are read from the environment, see [`GatewaySettings`](config::GatewaySettings).
`AUTHORITY`, `CLIENT_ID`, `CLIENT_SECRET` and `REDIRECT_URL` are required.
"#]

pub mod config;
pub(crate) mod cookie;
pub(crate) mod env_var;
pub(crate) mod http_client;
pub mod identity;
pub mod middleware;
pub mod oidc;
pub(crate) mod route;
pub(crate) mod types;

#[cfg(test)]
mod test_support;

const ACCESS_TOKEN_COOKIE: &str = "access_token";
const COOKIE_AUTH_CHALLENGE_STATE: &str = "oidc_challenge";
