use crate::auth::{self, Hasher, TokenKeys};
use crate::error::{json_error, ApiError};
use crate::{catalog, movies, users};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{web, App, HttpResponse};

pub type Db = web::Data<sled::Db>;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .route("/", web::get().to(catalog::welcome))
        .route("/login", web::post().to(auth::login))
        .route("/movies", web::get().to(movies::list_movies))
        .route("/movies", web::post().to(movies::create_movie))
        .route("/movies/{title}", web::get().to(movies::get_movie))
        .route("/movies/{title}", web::put().to(movies::update_movie))
        .route("/movies/{title}", web::delete().to(movies::delete_movie))
        .route("/genres", web::get().to(catalog::list_genres))
        .route("/genres/{name}", web::get().to(catalog::get_genre))
        .route("/directors", web::get().to(catalog::list_directors))
        .route("/directors/{name}", web::get().to(catalog::get_director))
        .route("/users", web::get().to(users::list_users))
        .route("/users", web::post().to(users::create_user))
        .route("/users/{username}", web::get().to(users::get_user))
        .route("/users/{username}", web::put().to(users::update_user))
        .route("/users/{username}", web::delete().to(users::delete_user))
        .route(
            "/users/{username}/favorites/{title}",
            web::put().to(users::add_favorite),
        )
        .route(
            "/users/{username}/favorites/{title}",
            web::delete().to(users::remove_favorite),
        );
}

async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("Not found".to_owned()))
}

pub fn app(
    db: sled::Db,
    keys: TokenKeys,
    hasher: Hasher,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(db))
        .app_data(web::Data::new(keys))
        .app_data(web::Data::new(hasher))
        .configure(configure)
        .default_service(web::to(not_found))
}
