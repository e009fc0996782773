//! Bearer tokens, the request gate that checks them, and password login.

use crate::database::{DbError, UserDb};
use crate::error::{log_error, ApiError};
use crate::model::{User, UserView};
use actix_web::{
    dev::Payload, http::header, web, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

const TOKEN_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;
const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    #[serde(rename = "_id")]
    pub id: u64,
    /// Username at the time of login.
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &[u8]) -> Self {
        TokenKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, user: &User) -> jsonwebtoken::errors::Result<String> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            id: user.id,
            sub: user.username.clone(),
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> jsonwebtoken::errors::Result<String> {
        jsonwebtoken::encode(&Header::new(ALGORITHM), claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<Claims> {
        let mut validation = Validation::new(ALGORITHM);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Ok(jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }
}

/// Identity of a caller that presented a valid bearer token. Taking this as
/// a handler argument puts the handler behind the gate.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Claims);

impl Authenticated {
    pub fn username(&self) -> &str {
        &self.0.sub
    }
}

fn unauthorized() -> ApiError {
    ApiError::Unauthorized("Unauthorized".to_owned())
}

/// Token from an `Authorization` value, with the scheme matched case-insensitively.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token)
    } else {
        None
    }
}

fn check_bearer(req: &HttpRequest) -> Result<Authenticated, ApiError> {
    let keys = req
        .app_data::<web::Data<TokenKeys>>()
        .ok_or_else(|| log_error("no TokenKeys registered", "Authentication error"))?;
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| {
            debug!("missing bearer token for {}", req.path());
            unauthorized()
        })?;
    let claims = keys.verify(token.trim()).map_err(|err| {
        debug!("rejected bearer token for {}: {}", req.path(), err);
        unauthorized()
    })?;
    req.extensions_mut().insert(claims.clone());
    Ok(Authenticated(claims))
}

impl FromRequest for Authenticated {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(check_bearer(req))
    }
}

/// bcrypt work factor, shared by registration and profile updates.
#[derive(Clone, Copy, Debug)]
pub struct Hasher {
    cost: u32,
}

impl Hasher {
    pub fn new(cost: u32) -> Self {
        Hasher { cost }
    }

    /// Hashes on the blocking pool so the worker keeps serving requests.
    pub async fn hash(&self, password: String) -> Result<String, ApiError> {
        let cost = self.cost;
        web::block(move || User::hash_password(&password, cost))
            .await
            .map_err(|err| log_error(err, "Hashing error"))?
            .map_err(|err| log_error(err, "Hashing error"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,
    #[error("bad credentials")]
    BadCredentials,
    #[error(transparent)]
    Store(#[from] DbError),
    #[error(transparent)]
    Hash(#[from] bcrypt::BcryptError),
}

/// Checks a username/password pair against the stored hash.
pub fn authenticate(db: &sled::Db, username: &str, password: &str) -> Result<User, AuthError> {
    let user = db
        .get_user_by_username(username)?
        .ok_or(AuthError::UserNotFound)?;
    if user.validate_password(password)? {
        Ok(user)
    } else {
        Err(AuthError::BadCredentials)
    }
}

#[derive(Serialize, Deserialize)]
pub struct LoginParams {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserView,
    pub token: String,
}

/// Credentials arrive either as JSON or as a urlencoded form.
pub async fn login(
    params: web::Either<web::Json<LoginParams>, web::Form<LoginParams>>,
    db: web::Data<sled::Db>,
    keys: web::Data<TokenKeys>,
) -> Result<HttpResponse, ApiError> {
    let LoginParams { username, password } = match params {
        web::Either::Left(json) => json.into_inner(),
        web::Either::Right(form) => form.into_inner(),
    };
    let name = username.clone();
    let outcome = web::block(move || authenticate(&db, &username, &password))
        .await
        .map_err(|err| log_error(err, "Authentication error"))?;
    let user = match outcome {
        Ok(user) => user,
        Err(err @ AuthError::UserNotFound) | Err(err @ AuthError::BadCredentials) => {
            debug!("login failed for {}: {}", name, err);
            return Err(ApiError::NotFound(
                "Make sure you've included a valid username and password to sign in.".to_owned(),
            ));
        }
        Err(err) => {
            debug!("login error for {}: {:?}", name, err);
            return Err(ApiError::BadRequest("Something isn't right.".to_owned()));
        }
    };
    let token = keys
        .issue(&user)
        .map_err(|err| log_error(err, "Token error"))?;
    info!("{} logged in", user.username);
    Ok(HttpResponse::Ok().json(LoginResponse {
        user: user.into(),
        token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewUser;
    use actix_web::test::TestRequest;

    fn keys() -> TokenKeys {
        TokenKeys::new(b"test secret")
    }

    fn fred() -> User {
        User {
            id: 42,
            username: "fred1".to_owned(),
            password: "hash".to_owned(),
            email: "f@x.com".to_owned(),
            birth_date: None,
            favorite_movies: Default::default(),
        }
    }

    #[test]
    fn issued_token_round_trips() {
        let keys = keys();
        let token = keys.issue(&fred()).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.id, 42);
        assert_eq!(claims.sub, "fred1");
        assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_SECS);
    }

    #[test]
    fn foreign_and_expired_tokens_are_rejected() {
        let keys = keys();
        let foreign = TokenKeys::new(b"other secret").issue(&fred()).unwrap();
        assert!(keys.verify(&foreign).is_err());

        let now = jsonwebtoken::get_current_timestamp();
        let expired = keys
            .sign(&Claims {
                id: 42,
                sub: "fred1".to_owned(),
                iat: now - 2 * TOKEN_LIFETIME_SECS,
                exp: now - TOKEN_LIFETIME_SECS,
            })
            .unwrap();
        assert!(keys.verify(&expired).is_err());
        assert!(keys.verify("not.a.token").is_err());
    }

    #[test]
    fn gate_requires_bearer_scheme() {
        let keys = keys();
        let token = keys.issue(&fred()).unwrap();
        let data = web::Data::new(keys);

        let req = TestRequest::default()
            .app_data(data.clone())
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .to_http_request();
        let Authenticated(claims) = check_bearer(&req).unwrap();
        assert_eq!(claims.sub, "fred1");
        assert_eq!(req.extensions().get::<Claims>(), Some(&claims));

        let req = TestRequest::default()
            .app_data(data.clone())
            .insert_header((header::AUTHORIZATION, token))
            .to_http_request();
        assert!(matches!(check_bearer(&req), Err(ApiError::Unauthorized(_))));

        let req = TestRequest::default().app_data(data).to_http_request();
        assert!(matches!(check_bearer(&req), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn bearer_scheme_ignores_case() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("BEARER abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Basic abc.def"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc.def"), None);

        let keys = keys();
        let token = keys.issue(&fred()).unwrap();
        let req = TestRequest::default()
            .app_data(web::Data::new(keys))
            .insert_header((header::AUTHORIZATION, format!("bearer {}", token)))
            .to_http_request();
        assert_eq!(check_bearer(&req).unwrap().username(), "fred1");
    }

    #[test]
    fn authenticate_distinguishes_failures() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        db.add_user(NewUser {
            username: "fred1".to_owned(),
            password_hash: User::hash_password("secretpw", 4).unwrap(),
            email: "f@x.com".to_owned(),
            birth_date: None,
        })
        .unwrap();

        assert_eq!(authenticate(&db, "fred1", "secretpw").unwrap().username, "fred1");
        assert!(matches!(
            authenticate(&db, "fred1", "wrongpass"),
            Err(AuthError::BadCredentials)
        ));
        assert!(matches!(
            authenticate(&db, "barney", "secretpw"),
            Err(AuthError::UserNotFound)
        ));
    }
}
