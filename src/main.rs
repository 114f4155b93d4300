use std::io;
use std::sync::Arc;

use actix_web::web;
use dotenvy::dotenv;
use secrecy::ExposeSecret;
use storefront_service::application::order_service::CheckoutSettings;
use storefront_service::config::Config;
use storefront_service::domain::ports::SessionRepository;
use storefront_service::infrastructure::order_repo::DieselOrderRepository;
use storefront_service::infrastructure::payment_client::HttpPaymentProcessor;
use storefront_service::infrastructure::product_repo::DieselProductCatalog;
use storefront_service::infrastructure::session_repo::DieselSessionRepository;
use storefront_service::{build_server, create_pool, run_migrations, AppState, Ports};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(io::Error::other)?;

    let pool = create_pool(config.database_url.expose_secret()).map_err(io::Error::other)?;
    run_migrations(&pool).map_err(io::Error::other)?;

    let sessions = Arc::new(DieselSessionRepository::new(pool.clone()));
    match sessions.delete_expired() {
        Ok(0) => {}
        Ok(n) => log::info!("Purged {} expired session(s)", n),
        Err(e) => log::warn!("Could not purge expired sessions: {}", e),
    }

    // The blocking HTTP client owns a runtime of its own and must be built
    // off the async executor.
    let payment_config = config.payment.clone();
    let payments = web::block(move || HttpPaymentProcessor::new(&payment_config))
        .await
        .map_err(io::Error::other)?
        .map_err(io::Error::other)?;

    let state = AppState::new(
        Ports {
            catalog: Arc::new(DieselProductCatalog::new(pool.clone())),
            orders: Arc::new(DieselOrderRepository::new(pool)),
            payments: Arc::new(payments),
            sessions,
        },
        CheckoutSettings {
            public_base_url: config.public_base_url.clone(),
            currency: config.payment.currency.clone(),
        },
        config.session_ttl,
        config.is_secure(),
    );

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(state, &config.host, config.port)?.await
}
