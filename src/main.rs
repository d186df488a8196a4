// src/main.rs

mod admin;
mod app_state;
mod auth;
mod category;
mod comment;
mod config;
mod db;
mod error;
mod export;
mod history;
mod task;

use std::env;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpResponse, HttpServer,
};
use env_logger::Env;
use futures::future::{ok, Ready};
use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::admin::{entity_history, overdue_report, task_stats};
use crate::app_state::AppState;
use crate::auth::{login, signup, Claims};
use crate::category::{
    create_category, delete_category, get_category, list_categories, update_category,
};
use crate::comment::{create_comment, list_comments};
use crate::export::export_tasks;
use crate::task::{
    create_task, delete_task, filtered_tasks, get_task, list_tasks, mark_complete,
    overdue_tasks, update_task,
};

#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware { service })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract "Bearer <token>" from the Authorization header if present
        if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
            if let Ok(auth_str) = auth_header.to_str() {
                if auth_str.starts_with("Bearer ") {
                    let token = auth_str.trim_start_matches("Bearer ").trim().to_string();
                    match verify_token(&token) {
                        Ok(user_id) => {
                            // Insert user_id as a string extension
                            req.extensions_mut().insert(user_id);
                        }
                        Err(e) => {
                            let (req_parts, _payload) = req.into_parts();
                            let resp = HttpResponse::Unauthorized()
                                .json(serde_json::json!({
                                    "detail": format!("Недействительный токен: {}", e)
                                }))
                                .map_into_boxed_body();
                            let srv_resp = ServiceResponse::new(req_parts, resp);
                            return Box::pin(async move { Ok(srv_resp) });
                        }
                    }
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

fn verify_token(token: &str) -> Result<String, String> {
    let secret = env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string());
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    ) {
        Ok(token_data) => Ok(token_data.claims.sub),
        Err(e) => Err(format!("Token decode error: {}", e)),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let mongodb = Arc::new(db::MongoDB::init(&config).await);

    let frontend_origin = config.frontend_origin.clone();

    println!("Server running at http://0.0.0.0:8080");
    println!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication)
            .app_data(web::Data::new(AppState {
                mongodb: mongodb.clone(),
                config: config.clone(),
            }))
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login)),
            )
            // CATEGORIES (read-only outside the back office)
            .service(
                web::scope("/categories")
                    .route("", web::get().to(list_categories))
                    .route("/{category_id}", web::get().to(get_category)),
            )
            // TASKS
            .service(
                web::scope("/tasks")
                    .route("", web::get().to(list_tasks))
                    .route("", web::post().to(create_task))
                    .route("/filtered", web::get().to(filtered_tasks))
                    .route("/overdue", web::get().to(overdue_tasks))
                    .service(
                        web::scope("/{task_id}")
                            .route("", web::get().to(get_task))
                            .route("", web::put().to(update_task))
                            .route("", web::delete().to(delete_task))
                            .route("/complete", web::post().to(mark_complete))
                            .service(
                                web::scope("/comments")
                                    .route("", web::get().to(list_comments))
                                    .route("", web::post().to(create_comment)),
                            ),
                    ),
            )
            // BACK OFFICE
            .service(
                web::scope("/admin")
                    .service(
                        web::scope("/tasks")
                            .route("/stats", web::get().to(task_stats))
                            .route("/overdue", web::get().to(overdue_report))
                            .route("/export", web::get().to(export_tasks)),
                    )
                    .service(
                        web::scope("/categories")
                            .route("", web::post().to(create_category))
                            .route("/{category_id}", web::put().to(update_category))
                            .route("/{category_id}", web::delete().to(delete_category)),
                    )
                    .route(
                        "/history/{entity_type}/{entity_id}",
                        web::get().to(entity_history),
                    ),
            )
    })
    .bind("0.0.0.0:8080")?
    .run()
    .await
}
