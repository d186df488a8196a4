use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use log::{error, info};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Deserialize)]
pub struct SignupInfo {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginInfo {
    pub username: String,
    pub password: String,
}

pub fn create_jwt(user_id: &str, secret: &str) -> String {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .expect("HS256 signing cannot fail with an in-memory secret")
}

/// Identity resolved by the `Authentication` middleware. Mutating and
/// owner-scoped endpoints call this first.
pub fn current_user(req: &HttpRequest) -> Result<String, ApiError> {
    req.extensions()
        .get::<String>()
        .cloned()
        .ok_or(ApiError::AuthenticationRequired)
}

fn validate_signup(info: &SignupInfo) -> Result<(), ApiError> {
    if info.username.trim().is_empty() {
        return Err(ApiError::validation("username", "Заполните все поля"));
    }
    if info.password.len() < 6 {
        return Err(ApiError::validation(
            "password",
            "Пароль должен содержать минимум 6 символов",
        ));
    }
    Ok(())
}

pub async fn signup(
    data: web::Data<AppState>,
    signup_info: web::Json<SignupInfo>,
) -> Result<HttpResponse, ApiError> {
    validate_signup(&signup_info)?;
    let username = signup_info.username.trim().to_string();

    let users = data.mongodb.db.collection::<User>("users");
    if users.find_one(doc! { "username": &username }).await?.is_some() {
        return Err(ApiError::validation(
            "username",
            "Пользователь с таким именем уже существует",
        ));
    }

    let hashed_password = match hash(&signup_info.password, DEFAULT_COST) {
        Ok(h) => h,
        Err(e) => {
            error!("Error hashing password: {}", e);
            return Ok(HttpResponse::InternalServerError().body("Error hashing password"));
        }
    };

    let new_user = User {
        user_id: Uuid::new_v4().to_string(),
        username,
        email: signup_info.email.clone(),
        password: hashed_password,
        is_admin: false,
    };

    users.insert_one(&new_user).await?;
    info!("User registered: {}", new_user.username);

    let token = create_jwt(&new_user.user_id, &data.config.jwt_secret);
    Ok(HttpResponse::Created().json(serde_json::json!({
        "username": new_user.username,
        "user_id": new_user.user_id,
        "token": token,
    })))
}

pub async fn login(
    data: web::Data<AppState>,
    login_info: web::Json<LoginInfo>,
) -> Result<HttpResponse, ApiError> {
    let users = data.mongodb.db.collection::<User>("users");
    let user = users
        .find_one(doc! { "username": &login_info.username })
        .await?;

    match user {
        Some(user) if verify(&login_info.password, &user.password).unwrap_or(false) => {
            let token = create_jwt(&user.user_id, &data.config.jwt_secret);
            Ok(HttpResponse::Ok()
                .json(serde_json::json!({ "token": token, "user_id": user.user_id })))
        }
        _ => Ok(HttpResponse::Unauthorized()
            .json(serde_json::json!({ "detail": "Неверный логин или пароль" }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(username: &str, password: &str) -> SignupInfo {
        SignupInfo {
            username: username.to_string(),
            password: password.to_string(),
            email: None,
        }
    }

    #[test]
    fn signup_rejects_blank_username() {
        assert!(validate_signup(&info("   ", "secret1")).is_err());
    }

    #[test]
    fn signup_rejects_short_password() {
        assert!(validate_signup(&info("alice", "12345")).is_err());
        assert!(validate_signup(&info("alice", "123456")).is_ok());
    }
}
