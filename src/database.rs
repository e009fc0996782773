use crate::model::*;
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{
    abort, ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    Transactional, TransactionalTree,
};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("bad index {index}: {key}")]
    BadIndex { index: &'static str, key: String },
}

/// Result of a keyed update.
#[derive(Debug, PartialEq)]
pub enum Updated<T> {
    Done(T),
    NotFound,
    /// The new natural key is already taken by another record.
    Conflict,
}

enum Abort {
    Duplicate,
    Missing,
    BadIndex(String),
    Codec(bincode::Error),
}

type TxResult<T> = ConflictableTransactionResult<T, Abort>;

fn abort_error(abort: Abort, index: &'static str) -> DbError {
    match abort {
        Abort::Codec(e) => DbError::Codec(e),
        Abort::BadIndex(key) => DbError::BadIndex { index, key },
        Abort::Duplicate | Abort::Missing => DbError::BadIndex {
            index,
            key: "unexpected abort".to_owned(),
        },
    }
}

// Big-endian so tree iteration follows id (creation) order.
fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn decode<R: DeserializeOwned>(bytes: &[u8]) -> TxResult<R> {
    bincode::deserialize(bytes).map_err(|e| ConflictableTransactionError::Abort(Abort::Codec(e)))
}

fn encode<R: Serialize>(record: &R) -> TxResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| ConflictableTransactionError::Abort(Abort::Codec(e)))
}

/// A document stored in a primary tree keyed by id, with a unique index
/// tree mapping its natural key to that id.
pub trait Record: Serialize + DeserializeOwned {
    const RECORDS: &'static str;
    const INDEX: &'static str;
    fn natural_key(&self) -> &str;
}

impl Record for Director {
    const RECORDS: &'static str = "directors";
    const INDEX: &'static str = "directors_name";
    fn natural_key(&self) -> &str {
        &self.name
    }
}

impl Record for Genre {
    const RECORDS: &'static str = "genres";
    const INDEX: &'static str = "genres_name";
    fn natural_key(&self) -> &str {
        &self.name
    }
}

impl Record for Movie {
    const RECORDS: &'static str = "movies";
    const INDEX: &'static str = "movies_title";
    fn natural_key(&self) -> &str {
        &self.title
    }
}

impl Record for User {
    const RECORDS: &'static str = "users";
    const INDEX: &'static str = "users_username";
    fn natural_key(&self) -> &str {
        &self.username
    }
}

fn open<R: Record>(db: &sled::Db) -> sled::Result<(sled::Tree, sled::Tree)> {
    Ok((db.open_tree(R::RECORDS)?, db.open_tree(R::INDEX)?))
}

/// Inserts the record built from a fresh id, or returns `None` if its
/// natural key is already taken.
fn insert_unique<R: Record>(
    db: &sled::Db,
    build: impl FnOnce(u64) -> R,
) -> Result<Option<R>, DbError> {
    let (records, index) = open::<R>(db)?;
    let id = db.generate_id()?;
    let record = build(id);
    let bytes = bincode::serialize(&record)?;
    let key = serialize_id(id);
    let result = (&records, &index).transaction(|(records, index)| -> TxResult<()> {
        records.insert(&key[..], bytes.clone())?;
        if index.insert(record.natural_key().as_bytes(), &key[..])?.is_some() {
            return abort(Abort::Duplicate);
        }
        Ok(())
    });
    match result {
        Ok(()) => Ok(Some(record)),
        Err(TransactionError::Abort(Abort::Duplicate)) => Ok(None),
        Err(TransactionError::Abort(other)) => Err(abort_error(other, R::INDEX)),
        Err(TransactionError::Storage(e)) => Err(e.into()),
    }
}

fn get<R: Record>(db: &sled::Db, id: u64) -> Result<Option<R>, DbError> {
    let records = db.open_tree(R::RECORDS)?;
    match records.get(serialize_id(id))? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}

fn get_by_key<R: Record>(db: &sled::Db, key: &str) -> Result<Option<R>, DbError> {
    let (records, index) = open::<R>(db)?;
    let id = match index.get(key)? {
        Some(id) => id,
        None => return Ok(None),
    };
    let bytes = records.get(&id)?.ok_or_else(|| DbError::BadIndex {
        index: R::INDEX,
        key: key.to_owned(),
    })?;
    Ok(Some(bincode::deserialize(&bytes)?))
}

fn list<R: Record>(db: &sled::Db) -> Result<Vec<R>, DbError> {
    let records = db.open_tree(R::RECORDS)?;
    records
        .iter()
        .values()
        .map(|bytes| -> Result<R, DbError> { Ok(bincode::deserialize(&bytes?)?) })
        .collect()
}

/// Loads the record for `key`, applies `change` and writes it back in one
/// transaction, moving the index entry when the natural key changes.
fn update_by_key<R: Record>(
    db: &sled::Db,
    key: &str,
    change: impl Fn(&mut R),
) -> Result<Updated<R>, DbError> {
    let (records, index) = open::<R>(db)?;
    let result = (&records, &index).transaction(|(records, index)| -> TxResult<R> {
        let id = match index.get(key)? {
            Some(id) => id,
            None => return abort(Abort::Missing),
        };
        let mut record: R = load(records, &id, key)?;
        change(&mut record);
        if record.natural_key() != key {
            if index.insert(record.natural_key().as_bytes(), id.clone())?.is_some() {
                return abort(Abort::Duplicate);
            }
            index.remove(key.as_bytes())?;
        }
        records.insert(id, encode(&record)?)?;
        Ok(record)
    });
    match result {
        Ok(record) => Ok(Updated::Done(record)),
        Err(TransactionError::Abort(Abort::Missing)) => Ok(Updated::NotFound),
        Err(TransactionError::Abort(Abort::Duplicate)) => Ok(Updated::Conflict),
        Err(TransactionError::Abort(other)) => Err(abort_error(other, R::INDEX)),
        Err(TransactionError::Storage(e)) => Err(e.into()),
    }
}

fn load<R: Record>(
    records: &TransactionalTree,
    id: &sled::IVec,
    key: &str,
) -> TxResult<R> {
    match records.get(id)? {
        Some(bytes) => decode(&bytes),
        None => abort(Abort::BadIndex(key.to_owned())),
    }
}

fn remove_by_key<R: Record>(db: &sled::Db, key: &str) -> Result<Option<R>, DbError> {
    let (records, index) = open::<R>(db)?;
    let result = (&records, &index).transaction(|(records, index)| -> TxResult<Option<R>> {
        let id = match index.remove(key.as_bytes())? {
            Some(id) => id,
            None => return Ok(None),
        };
        let record: R = load(records, &id, key)?;
        records.remove(id)?;
        Ok(Some(record))
    });
    match result {
        Ok(record) => Ok(record),
        Err(TransactionError::Abort(other)) => Err(abort_error(other, R::INDEX)),
        Err(TransactionError::Storage(e)) => Err(e.into()),
    }
}

pub trait UserDb {
    type Error;
    fn add_user(&self, user: NewUser) -> Result<Option<User>, Self::Error>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Self::Error>;
    fn list_users(&self) -> Result<Vec<User>, Self::Error>;
    fn update_user(
        &self,
        username: &str,
        changes: &UserChanges,
    ) -> Result<Updated<User>, Self::Error>;
    fn remove_user(&self, username: &str) -> Result<Option<User>, Self::Error>;
    fn add_favorite(&self, username: &str, movie_id: u64) -> Result<Updated<User>, Self::Error>;
    fn remove_favorite(&self, username: &str, movie_id: u64)
        -> Result<Updated<User>, Self::Error>;
}

impl UserDb for sled::Db {
    type Error = DbError;

    fn add_user(&self, user: NewUser) -> Result<Option<User>, DbError> {
        insert_unique(self, |id| User {
            id,
            username: user.username,
            password: user.password_hash,
            email: user.email,
            birth_date: user.birth_date,
            favorite_movies: Default::default(),
        })
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        get_by_key(self, username)
    }

    fn list_users(&self) -> Result<Vec<User>, DbError> {
        list(self)
    }

    fn update_user(&self, username: &str, changes: &UserChanges) -> Result<Updated<User>, DbError> {
        update_by_key(self, username, |user: &mut User| changes.apply(user))
    }

    fn remove_user(&self, username: &str) -> Result<Option<User>, DbError> {
        remove_by_key(self, username)
    }

    fn add_favorite(&self, username: &str, movie_id: u64) -> Result<Updated<User>, DbError> {
        update_by_key(self, username, |user: &mut User| {
            user.favorite_movies.insert(movie_id);
        })
    }

    fn remove_favorite(&self, username: &str, movie_id: u64) -> Result<Updated<User>, DbError> {
        update_by_key(self, username, |user: &mut User| {
            user.favorite_movies.remove(&movie_id);
        })
    }
}

pub trait MovieDb {
    type Error;
    fn add_movie(&self, movie: NewMovie) -> Result<Option<Movie>, Self::Error>;
    fn get_movie_by_title(&self, title: &str) -> Result<Option<Movie>, Self::Error>;
    fn list_movies(&self) -> Result<Vec<Movie>, Self::Error>;
    fn update_movie(
        &self,
        title: &str,
        changes: &MovieChanges,
    ) -> Result<Updated<Movie>, Self::Error>;
    fn remove_movie(&self, title: &str) -> Result<Option<Movie>, Self::Error>;
}

impl MovieDb for sled::Db {
    type Error = DbError;

    fn add_movie(&self, movie: NewMovie) -> Result<Option<Movie>, DbError> {
        insert_unique(self, |id| Movie {
            id,
            title: movie.title,
            description: movie.description,
            image_url: movie.image_url,
            genre: movie.genre,
            director: movie.director,
            actors: movie.actors,
            image_path: movie.image_path,
            featured: movie.featured,
        })
    }

    fn get_movie_by_title(&self, title: &str) -> Result<Option<Movie>, DbError> {
        get_by_key(self, title)
    }

    fn list_movies(&self) -> Result<Vec<Movie>, DbError> {
        list(self)
    }

    fn update_movie(&self, title: &str, changes: &MovieChanges) -> Result<Updated<Movie>, DbError> {
        update_by_key(self, title, |movie: &mut Movie| changes.apply(movie))
    }

    fn remove_movie(&self, title: &str) -> Result<Option<Movie>, DbError> {
        remove_by_key(self, title)
    }
}

/// Genres and directors: written only by the seeder.
pub trait CatalogDb {
    type Error;
    fn add_genre(&self, name: &str, description: &str) -> Result<Option<Genre>, Self::Error>;
    fn get_genre(&self, id: u64) -> Result<Option<Genre>, Self::Error>;
    fn get_genre_by_name(&self, name: &str) -> Result<Option<Genre>, Self::Error>;
    fn list_genres(&self) -> Result<Vec<Genre>, Self::Error>;
    fn add_director(&self, name: &str, bio: &str) -> Result<Option<Director>, Self::Error>;
    fn get_director(&self, id: u64) -> Result<Option<Director>, Self::Error>;
    fn get_director_by_name(&self, name: &str) -> Result<Option<Director>, Self::Error>;
    fn list_directors(&self) -> Result<Vec<Director>, Self::Error>;
}

impl CatalogDb for sled::Db {
    type Error = DbError;

    fn add_genre(&self, name: &str, description: &str) -> Result<Option<Genre>, DbError> {
        insert_unique(self, |id| Genre {
            id,
            name: name.to_owned(),
            description: description.to_owned(),
        })
    }

    fn get_genre(&self, id: u64) -> Result<Option<Genre>, DbError> {
        get(self, id)
    }

    fn get_genre_by_name(&self, name: &str) -> Result<Option<Genre>, DbError> {
        get_by_key(self, name)
    }

    fn list_genres(&self) -> Result<Vec<Genre>, DbError> {
        list(self)
    }

    fn add_director(&self, name: &str, bio: &str) -> Result<Option<Director>, DbError> {
        insert_unique(self, |id| Director {
            id,
            name: name.to_owned(),
            bio: bio.to_owned(),
        })
    }

    fn get_director(&self, id: u64) -> Result<Option<Director>, DbError> {
        get(self, id)
    }

    fn get_director_by_name(&self, name: &str) -> Result<Option<Director>, DbError> {
        get_by_key(self, name)
    }

    fn list_directors(&self) -> Result<Vec<Director>, DbError> {
        list(self)
    }
}

/// Resolves each movie's genre and director ids. Ids without a matching
/// record are dropped.
pub fn populate(db: &sled::Db, movies: Vec<Movie>) -> Result<Vec<PopulatedMovie>, DbError> {
    use std::collections::HashMap;
    let mut genres: HashMap<u64, Option<Genre>> = HashMap::new();
    let mut directors: HashMap<u64, Option<Director>> = HashMap::new();
    movies
        .into_iter()
        .map(|movie| -> Result<PopulatedMovie, DbError> {
            let mut genre = Vec::with_capacity(movie.genre.len());
            for id in &movie.genre {
                if !genres.contains_key(id) {
                    genres.insert(*id, db.get_genre(*id)?);
                }
                genre.extend(genres[id].clone());
            }
            let mut director = Vec::with_capacity(movie.director.len());
            for id in &movie.director {
                if !directors.contains_key(id) {
                    directors.insert(*id, db.get_director(*id)?);
                }
                director.extend(directors[id].clone());
            }
            Ok(PopulatedMovie::new(movie, genre, director))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_owned(),
            password_hash: "hash".to_owned(),
            email: format!("{}@x.com", username),
            birth_date: None,
        }
    }

    fn new_movie(title: &str, genre: Vec<u64>, director: Vec<u64>) -> NewMovie {
        NewMovie {
            title: title.to_owned(),
            description: "description".to_owned(),
            image_url: None,
            genre,
            director,
            actors: vec![],
            image_path: None,
            featured: None,
        }
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = db();
        let fred = db.add_user(new_user("fred1")).unwrap().unwrap();
        assert_eq!(db.add_user(new_user("fred1")).unwrap(), None);
        let users = db.list_users().unwrap();
        assert_eq!(users, vec![fred]);
    }

    #[test]
    fn list_follows_creation_order() {
        let db = db();
        for title in ["Zodiac", "Alien", "Memento"] {
            db.add_movie(new_movie(title, vec![], vec![])).unwrap().unwrap();
        }
        let titles: Vec<_> = db
            .list_movies()
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(titles, vec!["Zodiac", "Alien", "Memento"]);
    }

    #[test]
    fn update_renames_and_moves_index() {
        let db = db();
        db.add_movie(new_movie("Alien", vec![], vec![])).unwrap();
        let changes = MovieChanges {
            title: Some("Aliens".to_owned()),
            featured: Some(true),
            ..Default::default()
        };
        match db.update_movie("Alien", &changes).unwrap() {
            Updated::Done(movie) => {
                assert_eq!(movie.title, "Aliens");
                assert_eq!(movie.description, "description");
                assert_eq!(movie.featured, Some(true));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(db.get_movie_by_title("Alien").unwrap(), None);
        assert!(db.get_movie_by_title("Aliens").unwrap().is_some());
    }

    #[test]
    fn update_reports_missing_and_conflicting_keys() {
        let db = db();
        db.add_user(new_user("fred1")).unwrap();
        db.add_user(new_user("wilma")).unwrap();
        let rename = UserChanges {
            username: Some("wilma".to_owned()),
            ..Default::default()
        };
        assert_eq!(db.update_user("fred1", &rename).unwrap(), Updated::Conflict);
        assert!(db.get_user_by_username("fred1").unwrap().is_some());
        assert_eq!(db.update_user("barney", &rename).unwrap(), Updated::NotFound);
        assert_eq!(db.list_users().unwrap().len(), 2);
    }

    #[test]
    fn favorites_round_trip() {
        let db = db();
        db.add_user(new_user("fred1")).unwrap();
        let alien = db.add_movie(new_movie("Alien", vec![], vec![])).unwrap().unwrap();
        let before = db.get_user_by_username("fred1").unwrap().unwrap();

        let added = match db.add_favorite("fred1", alien.id).unwrap() {
            Updated::Done(user) => user,
            other => panic!("unexpected {:?}", other),
        };
        assert!(added.favorite_movies.contains(&alien.id));

        db.remove_favorite("fred1", alien.id).unwrap();
        let after = db.get_user_by_username("fred1").unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(db.add_favorite("barney", alien.id).unwrap(), Updated::NotFound);
    }

    #[test]
    fn remove_frees_the_natural_key() {
        let db = db();
        db.add_movie(new_movie("Alien", vec![], vec![])).unwrap();
        assert!(db.remove_movie("Alien").unwrap().is_some());
        assert_eq!(db.remove_movie("Alien").unwrap(), None);
        assert!(db.list_movies().unwrap().is_empty());
        assert!(db.add_movie(new_movie("Alien", vec![], vec![])).unwrap().is_some());
    }

    #[test]
    fn populate_resolves_references() {
        let db = db();
        let horror = db.add_genre("Horror", "Scary").unwrap().unwrap();
        let scott = db.add_director("Ridley Scott", "British").unwrap().unwrap();
        assert_eq!(db.add_genre("Horror", "again").unwrap(), None);
        db.add_movie(new_movie("Alien", vec![horror.id, 999], vec![scott.id]))
            .unwrap();

        let populated = populate(&db, db.list_movies().unwrap()).unwrap();
        assert_eq!(populated.len(), 1);
        assert_eq!(populated[0].genre, vec![horror]);
        assert_eq!(populated[0].director, vec![scott.clone()]);
        assert_eq!(db.get_director_by_name("Ridley Scott").unwrap(), Some(scott));
    }
}
