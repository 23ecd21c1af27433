#[macro_use]
extern crate lazy_static;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub mod schema;
mod api;
mod config;
mod error;
mod models;
mod summary;

use crate::config::Config;

pub type DbConnection = PgConnection;
pub type DbPool = Pool<ConnectionManager<DbConnection>>;

pub struct AppState {
    pub db_pool: DbPool,
    pub config: Config,
}

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let config = Config::from_env();
    let manager = ConnectionManager::<DbConnection>::new(&config.database_url);
    let db_pool = Pool::new(manager).expect("Failed to create pool.");

    {
        let mut connection = db_pool.get().expect("Failed to check out a connection.");
        connection
            .run_pending_migrations(MIGRATIONS)
            .expect("Failed to run migrations.");
    }

    log::info!("listening on {}", config.bind_addr);
    let bind_addr = config.bind_addr.clone();
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(3600);
        for origin in &config.allowed_origins {
            cors = cors.allowed_origin(origin);
        }
        App::new()
            .app_data(web::Data::new(AppState {
                db_pool: db_pool.clone(),
                config: config.clone(),
            }))
            .app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
            .wrap(Logger::default())
            .wrap(cors)
            .service(
                web::scope("/api")
                    .service(api::auth::get_service())
                    .service(api::subject::get_service())
                    .service(api::lecture::get_service())
                    .service(api::record::get_service())
                    .service(api::settings::get_service())
                    .service(api::dashboard::get_service()),
            )
    })
    .bind(&bind_addr)?
    .run()
    .await
}
