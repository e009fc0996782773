mod auth;
mod catalog;
mod config;
mod database;
mod error;
mod model;
mod movies;
mod routes;
mod seed;
mod users;
mod validation;

use actix_web::{middleware::Logger, HttpServer};
use auth::{Hasher, TokenKeys};
use config::Config;
use log::{error, info};
use std::io;

#[actix_rt::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("ymdb=debug,actix_web=info"),
    )
    .init();

    let config = Config::from_env().map_err(|err| {
        error!("{}", err);
        io::Error::new(io::ErrorKind::InvalidInput, err)
    })?;
    let db = config.open_db().map_err(|err| {
        error!("cannot open database: {}", err);
        io::Error::new(io::ErrorKind::Other, err)
    })?;
    if let Some(path) = &config.seed_file {
        seed::load(&db, path).map_err(|err| {
            error!("{}", err);
            io::Error::new(io::ErrorKind::InvalidData, err)
        })?;
    }

    let keys = TokenKeys::new(config.jwt_secret.as_bytes());
    let hasher = Hasher::new(config.bcrypt_cost);

    info!("listening on 0.0.0.0:{}", config.port);
    HttpServer::new(move || {
        routes::app(db.clone(), keys.clone(), hasher).wrap(Logger::default())
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}
