use crate::{
    identity::{identity_from_request, IdentityError},
    oidc::{OidcGatewayClient, OidcGatewayClientTrait},
    route::AUTH_LOGIN_PATH,
};
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpResponse, ResponseError,
};
use actix_web::HttpMessage;
use futures_util::future::LocalBoxFuture;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::{
    future::{ready, Ready},
    marker::PhantomData,
};

/// Guards a scope with a verified identity.
///
/// Callers without a token are sent to the login route and brought back to the
/// requested path afterwards. Callers with a token that fails verification get
/// a `400 Bad Request`. On success the [`Identity`](crate::identity::Identity)
/// is stored in the request extensions for
/// [`VerifiedIdentity`](crate::identity::VerifiedIdentity) to pick up.
pub type RequireIdentity = RequireIdentityGeneric<OidcGatewayClient>;

impl RequireIdentity {
    pub fn new() -> Self {
        Self { _c: PhantomData }
    }
}

pub struct RequireIdentityGeneric<C: OidcGatewayClientTrait> {
    _c: PhantomData<C>,
}

impl<C: OidcGatewayClientTrait> Default for RequireIdentityGeneric<C> {
    fn default() -> Self {
        Self { _c: PhantomData }
    }
}

impl<S, B, C> Transform<S, ServiceRequest> for RequireIdentityGeneric<C>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
    C: OidcGatewayClientTrait + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireIdentityMiddleware<S, C>;

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireIdentityMiddleware {
            service,
            _c: PhantomData,
        }))
    }
}

pub struct RequireIdentityMiddleware<S, C: OidcGatewayClientTrait> {
    service: S,
    _c: PhantomData<C>,
}

impl<S, B, C> Service<ServiceRequest> for RequireIdentityMiddleware<S, C>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
    C: OidcGatewayClientTrait + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;

    type Error = Error;

    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let identity = match identity_from_request::<C>(req.request()) {
            Ok(identity) => identity,
            Err(IdentityError::MissingToken) => {
                let response = login_redirect(&req);
                return Box::pin(ready(Ok(req.into_response(response).map_into_right_body())));
            }
            Err(err) => {
                let response = err.error_response();
                return Box::pin(ready(Ok(req.into_response(response).map_into_right_body())));
            }
        };

        req.extensions_mut().insert(identity);

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}

fn login_redirect(req: &ServiceRequest) -> HttpResponse {
    let path = match req.query_string() {
        "" => req.path().to_owned(),
        query => format!("{}?{}", req.path(), query),
    };
    log::debug!("no token presented for {}, redirecting to login.", path);

    let location = format!(
        "{}?path={}",
        AUTH_LOGIN_PATH,
        utf8_percent_encode(&path, NON_ALPHANUMERIC)
    );
    HttpResponse::Found()
        .append_header((header::LOCATION, location))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identity::VerifiedIdentity, oidc::test::MockOidcGatewayClientStruct, oidc::OidcError,
        test_support, ACCESS_TOKEN_COOKIE,
    };
    use actix_web::{
        cookie::Cookie, http::StatusCode, test, web, App, HttpResponse, Responder,
    };

    type MockRequireIdentity = RequireIdentityGeneric<MockOidcGatewayClientStruct>;
    type MockIdentity = crate::identity::UserIdentity<MockOidcGatewayClientStruct>;

    async fn protected(user: MockIdentity) -> impl Responder {
        HttpResponse::Ok().body(format!("Protected for {}", user.subject))
    }

    async fn unguarded() -> impl Responder {
        HttpResponse::Ok().body("Open")
    }

    #[actix_web::test]
    async fn test_given_no_token_when_call_then_redirect_to_login() {
        // Arrange
        let mut client = MockOidcGatewayClientStruct::default();
        client.expect_verify_bearer_token().never();
        let app = test::init_service(
            App::new()
                .app_data(test_support::mock_data(client))
                .service(
                    web::scope("/app")
                        .wrap(MockRequireIdentity::default())
                        .route("/words", web::get().to(protected)),
                ),
        )
        .await;
        let req = test::TestRequest::with_uri("/app/words?book=1").to_request();

        // Act
        let resp = test::call_service(&app, req).await;

        // Assert
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/auth/login?path=%2Fapp%2Fwords%3Fbook%3D1"
        );
    }

    #[actix_web::test]
    async fn test_given_invalid_token_when_call_then_bad_request() {
        // Arrange
        let mut client = MockOidcGatewayClientStruct::default();
        client
            .expect_verify_bearer_token()
            .times(1)
            .returning(|_| Err(OidcError::MalformedToken(serde_json::Error::io(
                std::io::Error::new(std::io::ErrorKind::InvalidData, "not a jwt"),
            ))));
        let app = test::init_service(
            App::new()
                .app_data(test_support::mock_data(client))
                .service(
                    web::scope("/app")
                        .wrap(MockRequireIdentity::default())
                        .route("/words", web::get().to(protected)),
                ),
        )
        .await;
        let req = test::TestRequest::with_uri("/app/words")
            .cookie(Cookie::new(ACCESS_TOKEN_COOKIE, "not-a-jwt"))
            .to_request();

        // Act
        let resp = test::call_service(&app, req).await;

        // Assert
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_given_valid_token_when_call_then_verified_once() {
        // Arrange
        let mut client = MockOidcGatewayClientStruct::default();
        client
            .expect_verify_bearer_token()
            .times(1)
            .returning(|_| Ok(test_support::identity("alice")));
        let app = test::init_service(
            App::new()
                .app_data(test_support::mock_data(client))
                .service(
                    web::scope("/app")
                        .wrap(MockRequireIdentity::default())
                        .route("/words", web::get().to(protected)),
                ),
        )
        .await;
        let req = test::TestRequest::with_uri("/app/words")
            .insert_header((header::AUTHORIZATION, "Bearer good"))
            .to_request();

        // Act
        let resp = test::call_and_read_body(&app, req).await;

        // Assert
        assert_eq!(resp, "Protected for alice");
    }

    #[actix_web::test]
    async fn test_given_unguarded_scope_when_call_then_passes_without_token() {
        // Arrange
        let client = MockOidcGatewayClientStruct::default();
        let app = test::init_service(
            App::new()
                .app_data(test_support::mock_data(client))
                .route("/open", web::get().to(unguarded))
                .service(
                    web::scope("/app")
                        .wrap(MockRequireIdentity::default())
                        .route("/words", web::get().to(protected)),
                ),
        )
        .await;
        let req = test::TestRequest::with_uri("/open").to_request();

        // Act
        let resp = test::call_service(&app, req).await;

        // Assert
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_given_no_client_when_call_then_internal_server_error() {
        // Arrange
        let app = test::init_service(
            App::new().service(
                web::scope("/app")
                    .wrap(MockRequireIdentity::default())
                    .route("/words", web::get().to(protected)),
            ),
        )
        .await;
        let req = test::TestRequest::with_uri("/app/words?access_token=abc").to_request();

        // Act
        let resp = test::call_service(&app, req).await;

        // Assert
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[::core::prelude::v1::test]
    fn test_verified_identity_alias_uses_gateway_client() {
        fn assert_from_request<T: actix_web::FromRequest>() {}
        assert_from_request::<VerifiedIdentity>();
    }
}
