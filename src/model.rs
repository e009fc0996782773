use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Director {
    #[serde(rename = "_id")]
    pub id: u64,
    pub name: String,
    pub bio: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Genre {
    #[serde(rename = "_id")]
    pub id: u64,
    pub name: String,
    pub description: String,
}

/// A stored movie. `genre` and `director` hold ids of records in the
/// `genres` and `directors` collections.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Movie {
    #[serde(rename = "_id")]
    pub id: u64,
    pub title: String,
    pub description: String,
    #[serde(rename = "ImageURL")]
    pub image_url: Option<String>,
    pub genre: Vec<u64>,
    pub director: Vec<u64>,
    pub actors: Vec<String>,
    pub image_path: Option<String>,
    pub featured: Option<bool>,
}

/// A movie with its genre and director references resolved.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PopulatedMovie {
    #[serde(rename = "_id")]
    pub id: u64,
    pub title: String,
    pub description: String,
    #[serde(rename = "ImageURL")]
    pub image_url: Option<String>,
    pub genre: Vec<Genre>,
    pub director: Vec<Director>,
    pub actors: Vec<String>,
    pub image_path: Option<String>,
    pub featured: Option<bool>,
}

impl PopulatedMovie {
    pub fn new(movie: Movie, genre: Vec<Genre>, director: Vec<Director>) -> Self {
        PopulatedMovie {
            id: movie.id,
            title: movie.title,
            description: movie.description,
            image_url: movie.image_url,
            genre,
            director,
            actors: movie.actors,
            image_path: movie.image_path,
            featured: movie.featured,
        }
    }
}

/// A stored user. `password` is always a bcrypt hash; use [`UserView`] for
/// anything that leaves the process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub email: String,
    pub birth_date: Option<NaiveDate>,
    pub favorite_movies: BTreeSet<u64>,
}

impl User {
    pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, cost)
    }

    pub fn validate_password(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        bcrypt::verify(password, &self.password)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: u64,
    pub username: String,
    pub email: String,
    #[serde(rename = "Birth_Date")]
    pub birth_date: Option<NaiveDate>,
    pub favorite_movies: Vec<u64>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView {
            id: user.id,
            username: user.username,
            email: user.email,
            birth_date: user.birth_date,
            favorite_movies: user.favorite_movies.into_iter().collect(),
        }
    }
}

pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub birth_date: Option<NaiveDate>,
}

pub struct NewMovie {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub genre: Vec<u64>,
    pub director: Vec<u64>,
    pub actors: Vec<String>,
    pub image_path: Option<String>,
    pub featured: Option<bool>,
}

/// Partial replacement for a user; `None` leaves the field untouched.
#[derive(Default, Debug, Clone)]
pub struct UserChanges {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl UserChanges {
    pub fn apply(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(hash) = &self.password_hash {
            user.password = hash.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(birth_date) = self.birth_date {
            user.birth_date = Some(birth_date);
        }
    }
}

/// Partial replacement for a movie; `None` leaves the field untouched.
#[derive(Default, Debug, Clone)]
pub struct MovieChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub genre: Option<Vec<u64>>,
    pub director: Option<Vec<u64>>,
    pub actors: Option<Vec<String>>,
    pub image_path: Option<String>,
    pub featured: Option<bool>,
}

impl MovieChanges {
    pub fn apply(&self, movie: &mut Movie) {
        if let Some(title) = &self.title {
            movie.title = title.clone();
        }
        if let Some(description) = &self.description {
            movie.description = description.clone();
        }
        if let Some(image_url) = &self.image_url {
            movie.image_url = Some(image_url.clone());
        }
        if let Some(genre) = &self.genre {
            movie.genre = genre.clone();
        }
        if let Some(director) = &self.director {
            movie.director = director.clone();
        }
        if let Some(actors) = &self.actors {
            movie.actors = actors.clone();
        }
        if let Some(image_path) = &self.image_path {
            movie.image_path = Some(image_path.clone());
        }
        if let Some(featured) = self.featured {
            movie.featured = Some(featured);
        }
    }
}
