use crate::auth::{Authenticated, Hasher};
use crate::database::{MovieDb, UserDb, Updated};
use crate::error::ApiError;
use crate::model::{NewUser, User, UserChanges, UserView};
use crate::routes::Db;
use crate::validation::{alphanumeric, validate};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveDate};
use log::info;
use serde::{de, Deserialize, Deserializer};
use serde_json::json;
use validator::Validate;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct Registration {
    #[serde(default)]
    #[validate(
        length(min = 1, message = "Username is required."),
        custom(
            function = "alphanumeric",
            message = "Username can only contain numbers or letters."
        )
    )]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub password: String,
    #[serde(default)]
    #[validate(email(message = "Email doesn't appear to be valid."))]
    pub email: String,
    #[serde(rename = "Birth_Date", default, deserialize_with = "birth_date")]
    pub birth_date: Option<NaiveDate>,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileUpdate {
    #[validate(custom(
        function = "alphanumeric",
        message = "Username can only contain numbers or letters."
    ))]
    pub username: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub password: Option<String>,
    #[validate(email(message = "Email doesn't appear to be valid."))]
    pub email: Option<String>,
    #[serde(rename = "Birth_Date", default, deserialize_with = "birth_date")]
    pub birth_date: Option<NaiveDate>,
}

/// Plain `YYYY-MM-DD`, or an RFC 3339 timestamp truncated to its date.
fn parse_birth_date(text: &str) -> Result<NaiveDate, chrono::ParseError> {
    text.parse::<NaiveDate>()
        .or_else(|_| DateTime::parse_from_rfc3339(text).map(|moment| moment.date_naive()))
}

fn birth_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|text| {
            parse_birth_date(&text)
                .map_err(|_| de::Error::custom(format!("invalid date `{}`", text)))
        })
        .transpose()
}

fn message(text: String) -> serde_json::Value {
    json!({ "message": text })
}

pub async fn list_users(_auth: Authenticated, db: Db) -> Result<HttpResponse, ApiError> {
    let users: Vec<UserView> = db.list_users()?.into_iter().map(UserView::from).collect();
    Ok(HttpResponse::Ok().json(users))
}

pub async fn get_user(
    _auth: Authenticated,
    username: web::Path<String>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let user = db
        .get_user_by_username(&username)?
        .ok_or_else(|| ApiError::missing(&username))?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

pub async fn create_user(
    body: web::Json<Registration>,
    db: Db,
    hasher: web::Data<Hasher>,
) -> Result<HttpResponse, ApiError> {
    let registration = body.into_inner();
    validate(&registration)?;
    if db.get_user_by_username(&registration.username)?.is_some() {
        return Err(ApiError::Conflict(registration.username));
    }
    let password_hash = hasher.hash(registration.password).await?;
    // The index insert is the authoritative uniqueness check.
    let user = db
        .add_user(NewUser {
            username: registration.username.clone(),
            password_hash,
            email: registration.email,
            birth_date: registration.birth_date,
        })?
        .ok_or(ApiError::Conflict(registration.username))?;
    info!("created account {}", user.username);
    Ok(HttpResponse::Created().json(message(format!(
        "Successfully created account for {}",
        user.username
    ))))
}

pub async fn update_user(
    auth: Authenticated,
    username: web::Path<String>,
    body: web::Json<ProfileUpdate>,
    db: Db,
    hasher: web::Data<Hasher>,
) -> Result<HttpResponse, ApiError> {
    let update = body.into_inner();
    validate(&update)?;
    let password_hash = match update.password {
        Some(password) => Some(hasher.hash(password).await?),
        None => None,
    };
    let changes = UserChanges {
        username: update.username,
        password_hash,
        email: update.email,
        birth_date: update.birth_date,
    };
    match db.update_user(&username, &changes)? {
        Updated::Done(user) => {
            info!("{} updated account {} -> {}", auth.username(), username, user.username);
            Ok(HttpResponse::Ok().json(message(format!(
                "Successfully updated info for {}",
                user.username
            ))))
        }
        Updated::NotFound => Err(ApiError::missing(&username)),
        Updated::Conflict => Err(ApiError::Conflict(changes.username.unwrap_or_default())),
    }
}

pub async fn delete_user(
    auth: Authenticated,
    username: web::Path<String>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    match db.remove_user(&username)? {
        Some(user) => {
            info!("{} deleted account {}", auth.username(), user.username);
            Ok(HttpResponse::Ok().body(format!("{} was deleted!", username)))
        }
        None => Err(ApiError::missing(&username)),
    }
}

enum Favorite {
    Add,
    Remove,
}

async fn change_favorite(
    path: web::Path<(String, String)>,
    db: Db,
    favorite: Favorite,
) -> Result<HttpResponse, ApiError> {
    let (username, title) = path.into_inner();
    let movie = db
        .get_movie_by_title(&title)?
        .ok_or_else(|| ApiError::NotFound("Movie not found".to_owned()))?;
    let outcome = match favorite {
        Favorite::Add => db.add_favorite(&username, movie.id)?,
        Favorite::Remove => db.remove_favorite(&username, movie.id)?,
    };
    let user: User = match outcome {
        Updated::Done(user) => user,
        Updated::NotFound | Updated::Conflict => return Err(ApiError::missing(&username)),
    };
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

pub async fn add_favorite(
    _auth: Authenticated,
    path: web::Path<(String, String)>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    change_favorite(path, db, Favorite::Add).await
}

pub async fn remove_favorite(
    _auth: Authenticated,
    path: web::Path<(String, String)>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    change_favorite(path, db, Favorite::Remove).await
}
