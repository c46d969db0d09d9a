use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use chrono::Utc;
use std::io;
use std::sync::Arc;

use rapport::api::{self, AppState};
use rapport::auth::AuthService;
use rapport::config::{Config, OwnerAccount};
use rapport::models::User;
use rapport::store::Store;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(io::Error::other)?;

    let store = Arc::new(Store::new(&config.database_path).map_err(io::Error::other)?);
    let auth_service = Arc::new(AuthService::new(config.jwt_secret.clone()));

    if let Some(ref owner) = config.owner {
        bootstrap_owner(&store, &auth_service, owner);
    }

    log::info!("Database: {}", config.database_path);

    let state = web::Data::new(AppState {
        store: store.clone(),
        auth_service: auth_service.clone(),
    });

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(api::configure_routes)
    });

    log::info!("Starting rapport server on port {}", config.port);
    server.bind(("0.0.0.0", config.port))?.run().await
}

/// Create the owner account from the environment if no users exist yet
fn bootstrap_owner(store: &Store, auth_service: &AuthService, owner: &OwnerAccount) {
    match store.count_users() {
        Ok(0) => {}
        Ok(_) => return,
        Err(e) => {
            log::error!("Failed to count users: {}", e);
            return;
        }
    }

    log::info!("Creating owner user from environment: {}", owner.username);
    let password_hash = match auth_service.hash_password(&owner.password) {
        Ok(hash) => hash,
        Err(e) => {
            log::error!("Failed to hash owner password: {}", e);
            return;
        }
    };

    let mut owner_user = User {
        id: String::new(),
        username: owner.username.clone(),
        email: format!("{}@localhost", owner.username),
        password_hash,
        display_name: owner.username.clone(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    match store.create_user(&mut owner_user) {
        Ok(()) => log::info!("Owner user created successfully"),
        Err(e) => log::error!("Failed to create owner user: {}", e),
    }
}
