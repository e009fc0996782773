use crate::auth::Authenticated;
use crate::database::{populate, MovieDb, Updated};
use crate::error::ApiError;
use crate::model::{MovieChanges, NewMovie};
use crate::routes::Db;
use crate::validation::validate;
use actix_web::{web, HttpResponse};
use log::info;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

/// A single reference id is accepted where a list is expected.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum References {
    One(u64),
    Many(Vec<u64>),
}

impl From<References> for Vec<u64> {
    fn from(references: References) -> Self {
        match references {
            References::One(id) => vec![id],
            References::Many(ids) => ids,
        }
    }
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct MovieInput {
    #[serde(default)]
    #[validate(length(min = 1, message = "Title is required."))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Description is required."))]
    pub description: String,
    #[serde(rename = "ImageURL")]
    pub image_url: Option<String>,
    pub genre: Option<References>,
    pub director: Option<References>,
    #[serde(default)]
    pub actors: Vec<String>,
    pub image_path: Option<String>,
    pub featured: Option<bool>,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct MovieUpdate {
    #[validate(length(min = 1, message = "Title is required."))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Description is required."))]
    pub description: Option<String>,
    #[serde(rename = "ImageURL")]
    pub image_url: Option<String>,
    pub genre: Option<References>,
    pub director: Option<References>,
    pub actors: Option<Vec<String>>,
    pub image_path: Option<String>,
    pub featured: Option<bool>,
}

pub async fn list_movies(_auth: Authenticated, db: Db) -> Result<HttpResponse, ApiError> {
    let movies = populate(&db, db.list_movies()?)?;
    Ok(HttpResponse::Ok().json(movies))
}

pub async fn get_movie(
    _auth: Authenticated,
    title: web::Path<String>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let movie = db
        .get_movie_by_title(&title)?
        .ok_or_else(|| ApiError::missing(&title))?;
    let populated = populate(&db, vec![movie])?;
    Ok(HttpResponse::Ok().json(&populated[0]))
}

pub async fn create_movie(
    auth: Authenticated,
    body: web::Json<MovieInput>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let input = body.into_inner();
    validate(&input)?;
    let title = input.title.clone();
    let movie = db
        .add_movie(NewMovie {
            title: input.title,
            description: input.description,
            image_url: input.image_url,
            genre: input.genre.map(Vec::from).unwrap_or_default(),
            director: input.director.map(Vec::from).unwrap_or_default(),
            actors: input.actors,
            image_path: input.image_path,
            featured: input.featured,
        })?
        .ok_or(ApiError::Conflict(title))?;
    info!("{} created movie {}", auth.username(), movie.title);
    Ok(HttpResponse::Created().json(movie))
}

pub async fn update_movie(
    auth: Authenticated,
    title: web::Path<String>,
    body: web::Json<MovieUpdate>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let update = body.into_inner();
    validate(&update)?;
    let changes = MovieChanges {
        title: update.title,
        description: update.description,
        image_url: update.image_url,
        genre: update.genre.map(Vec::from),
        director: update.director.map(Vec::from),
        actors: update.actors,
        image_path: update.image_path,
        featured: update.featured,
    };
    match db.update_movie(&title, &changes)? {
        Updated::Done(movie) => {
            info!("{} updated movie {} -> {}", auth.username(), title, movie.title);
            Ok(HttpResponse::Ok().json(json!({
                "message": format!("Successfully updated info for {}", movie.title)
            })))
        }
        Updated::NotFound => Err(ApiError::missing(&title)),
        Updated::Conflict => Err(ApiError::Conflict(changes.title.unwrap_or_default())),
    }
}

pub async fn delete_movie(
    auth: Authenticated,
    title: web::Path<String>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    match db.remove_movie(&title)? {
        Some(movie) => {
            info!("{} deleted movie {}", auth.username(), movie.title);
            Ok(HttpResponse::Ok().body(format!("{} was deleted!", title)))
        }
        None => Err(ApiError::missing(&title)),
    }
}
