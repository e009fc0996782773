//! Read-only genre and director lookups, plus the landing page.

use crate::auth::Authenticated;
use crate::database::CatalogDb;
use crate::error::ApiError;
use crate::routes::Db;
use actix_web::{web, HttpResponse};

pub async fn welcome() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Welcome to Your Movie DataBase!")
}

pub async fn list_genres(_auth: Authenticated, db: Db) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(db.list_genres()?))
}

pub async fn get_genre(
    _auth: Authenticated,
    name: web::Path<String>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let genre = db
        .get_genre_by_name(&name)?
        .ok_or_else(|| ApiError::missing(&name))?;
    Ok(HttpResponse::Ok().json(genre))
}

pub async fn list_directors(_auth: Authenticated, db: Db) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(db.list_directors()?))
}

pub async fn get_director(
    _auth: Authenticated,
    name: web::Path<String>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let director = db
        .get_director_by_name(&name)?
        .ok_or_else(|| ApiError::missing(&name))?;
    Ok(HttpResponse::Ok().json(director))
}
