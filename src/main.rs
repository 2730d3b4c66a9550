use actix_oidc_gateway::{
    config::GatewaySettings,
    identity::VerifiedIdentity,
    middleware::RequireIdentity,
    oidc::{OidcClient, OidcGatewayClient},
};
use actix_web::{get, middleware::Logger, web, App, HttpResponse, HttpServer, Responder};
use dotenv::dotenv;
use env_logger::Env;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().body("Sign in at /auth/login.")
}

#[get("/whoami")]
async fn whoami(user: VerifiedIdentity) -> impl Responder {
    HttpResponse::Ok().body(format!("Signed in as {}.", user.subject))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let settings = GatewaySettings::from_env().map_err(|err| {
        log::error!("{}", err);
        std::io::Error::other(err)
    })?;
    let bind_address = settings.bind_address.clone();

    let oidc_client = OidcClient::setup(settings).await.map_err(|err| {
        log::error!("provider discovery failed: {}", err);
        std::io::Error::other(err)
    })?;

    log::info!("listening on {}.", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(oidc_client.clone())
            .configure(OidcGatewayClient::oidc_web_configurations)
            .service(index)
            .service(
                web::scope("/app")
                    .wrap(RequireIdentity::new())
                    .service(whoami),
            )
    })
    .bind(bind_address)?
    .run()
    .await
}
