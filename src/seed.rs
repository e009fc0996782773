//! Startup loading of directors, genres and movies from a JSON file.
//!
//! Entries whose name or title already exists are left alone, so the same
//! file can be applied on every start.

use crate::database::{CatalogDb, DbError, MovieDb};
use crate::model::NewMovie;
use log::{info, warn};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("cannot read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid seed file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct SeedDirector {
    pub name: String,
    #[serde(default)]
    pub bio: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct SeedGenre {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Genres and directors are referenced by name.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct SeedMovie {
    pub title: String,
    pub description: String,
    #[serde(rename = "ImageURL")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub genre: Vec<String>,
    #[serde(default)]
    pub director: Vec<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    pub image_path: Option<String>,
    pub featured: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Seed {
    #[serde(default)]
    pub directors: Vec<SeedDirector>,
    #[serde(default)]
    pub genres: Vec<SeedGenre>,
    #[serde(default)]
    pub movies: Vec<SeedMovie>,
}

#[derive(Debug, Default, PartialEq)]
pub struct SeedReport {
    pub directors: usize,
    pub genres: usize,
    pub movies: usize,
}

pub fn load(db: &sled::Db, path: &Path) -> Result<SeedReport, SeedError> {
    let seed: Seed = serde_json::from_slice(&std::fs::read(path)?)?;
    let report = apply(db, seed)?;
    info!(
        "seeded {} directors, {} genres, {} movies from {}",
        report.directors,
        report.genres,
        report.movies,
        path.display()
    );
    Ok(report)
}

pub fn apply(db: &sled::Db, seed: Seed) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();
    for director in &seed.directors {
        if db.add_director(&director.name, &director.bio)?.is_some() {
            report.directors += 1;
        }
    }
    for genre in &seed.genres {
        if db.add_genre(&genre.name, &genre.description)?.is_some() {
            report.genres += 1;
        }
    }
    for movie in seed.movies {
        let mut genre = Vec::new();
        for name in &movie.genre {
            match db.get_genre_by_name(name)? {
                Some(found) => genre.push(found.id),
                None => warn!("{}: unknown genre {}", movie.title, name),
            }
        }
        let mut director = Vec::new();
        for name in &movie.director {
            match db.get_director_by_name(name)? {
                Some(found) => director.push(found.id),
                None => warn!("{}: unknown director {}", movie.title, name),
            }
        }
        let added = db.add_movie(NewMovie {
            title: movie.title,
            description: movie.description,
            image_url: movie.image_url,
            genre,
            director,
            actors: movie.actors,
            image_path: movie.image_path,
            featured: movie.featured,
        })?;
        if added.is_some() {
            report.movies += 1;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"{
        "directors": [{ "Name": "Ridley Scott", "Bio": "English director." }],
        "genres": [{ "Name": "Science Fiction", "Description": "Speculative." }],
        "movies": [{
            "Title": "Alien",
            "Description": "In space no one can hear you scream.",
            "Genre": ["Science Fiction", "Western"],
            "Director": ["Ridley Scott"],
            "Featured": true
        }]
    }"#;

    #[test]
    fn resolves_names_and_is_idempotent() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let report = apply(&db, serde_json::from_str(SEED).unwrap()).unwrap();
        assert_eq!(
            report,
            SeedReport {
                directors: 1,
                genres: 1,
                movies: 1
            }
        );

        let alien = db.get_movie_by_title("Alien").unwrap().unwrap();
        let scott = db.get_director_by_name("Ridley Scott").unwrap().unwrap();
        let scifi = db.get_genre_by_name("Science Fiction").unwrap().unwrap();
        assert_eq!(alien.director, vec![scott.id]);
        assert_eq!(alien.genre, vec![scifi.id]);
        assert_eq!(alien.featured, Some(true));

        let again = apply(&db, serde_json::from_str(SEED).unwrap()).unwrap();
        assert_eq!(again, SeedReport::default());
        assert_eq!(db.list_movies().unwrap().len(), 1);
    }

    #[test]
    fn sample_file_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/seed.json");
        let db = sled::Config::new().temporary(true).open().unwrap();
        let report = load(&db, &path).unwrap();
        assert!(report.movies > 0);
        assert_eq!(db.list_genres().unwrap().len(), report.genres);
    }
}
