use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::{doc, oid::ObjectId, Bson};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::admin::require_admin;
use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::history::{self, HistoryAction};
use crate::task::Task;

/// The ten colors a category may carry, hex value first, display name second.
pub const COLOR_CHOICES: [(&str, &str); 10] = [
    ("#FF0000", "Красный"),
    ("#00FF00", "Зеленый"),
    ("#FFFF00", "Желтый"),
    ("#0000FF", "Синий"),
    ("#FFA500", "Оранжевый"),
    ("#800080", "Фиолетовый"),
    ("#FFC0CB", "Розовый"),
    ("#A52A2A", "Коричневый"),
    ("#808080", "Серый"),
    ("#FFFFFF", "Белый"),
];

pub const DEFAULT_COLOR: &str = "#FFFFFF";

#[derive(Debug, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub category_id: String,
    pub title: String,
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub title: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub title: Option<String>,
    pub color: Option<String>,
}

pub fn validate_title(title: &str) -> Result<String, ApiError> {
    let trimmed = title.trim();
    if trimmed.chars().count() < 3 {
        return Err(ApiError::validation(
            "title",
            "Название категории должно содержать минимум 3 символа",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_color(color: &str) -> Result<(), ApiError> {
    if COLOR_CHOICES.iter().any(|(hex, _)| *hex == color) {
        return Ok(());
    }
    Err(ApiError::validation("color", "Недопустимый цвет категории"))
}

async fn ensure_unique_title(
    data: &AppState,
    title: &str,
    exclude_category_id: Option<&str>,
) -> Result<(), ApiError> {
    let categories = data.mongodb.db.collection::<Category>("categories");
    let mut filter = doc! { "title": title };
    if let Some(id) = exclude_category_id {
        filter.insert("category_id", doc! { "$ne": id });
    }
    if categories.find_one(filter).await?.is_some() {
        return Err(ApiError::validation(
            "title",
            "Категория с таким названием уже существует",
        ));
    }
    Ok(())
}

/// GET /categories
pub async fn list_categories(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    current_user(&req)?;

    let categories = data.mongodb.db.collection::<Category>("categories");
    let mut cursor = categories.find(doc! {}).await?;

    let mut result = vec![];
    while let Some(category) = cursor.next().await {
        match category {
            Ok(c) => result.push(c),
            Err(e) => {
                error!("Error reading categories cursor: {}", e);
                return Err(ApiError::Database(e));
            }
        }
    }
    Ok(HttpResponse::Ok().json(result))
}

/// GET /categories/{category_id}
pub async fn get_category(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    current_user(&req)?;
    let category_id = path.into_inner();

    let categories = data.mongodb.db.collection::<Category>("categories");
    match categories.find_one(doc! { "category_id": &category_id }).await? {
        Some(category) => Ok(HttpResponse::Ok().json(category)),
        None => Err(ApiError::NotFound("Категория не найдена".to_string())),
    }
}

/// POST /admin/categories
pub async fn create_category(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateCategoryRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    require_admin(&data, &user_id).await?;

    let title = validate_title(&payload.title)?;
    let color = payload.color.clone().unwrap_or_else(|| DEFAULT_COLOR.to_string());
    validate_color(&color)?;
    ensure_unique_title(&data, &title, None).await?;

    let new_category = Category {
        id: None,
        category_id: Uuid::new_v4().to_string(),
        title,
        color,
    };

    let categories = data.mongodb.db.collection::<Category>("categories");
    let mut session = data.mongodb.client.start_session().await?;
    session.start_transaction().await?;
    categories.insert_one(&new_category).session(&mut session).await?;
    history::record(
        &data.mongodb.db,
        &mut session,
        "category",
        &new_category.category_id,
        HistoryAction::Create,
        &new_category,
    )
    .await?;
    session.commit_transaction().await?;

    info!("Category created: {}", new_category.category_id);
    Ok(HttpResponse::Created().json(new_category))
}

/// PUT /admin/categories/{category_id}
pub async fn update_category(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateCategoryRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    require_admin(&data, &user_id).await?;
    let category_id = path.into_inner();

    let categories = data.mongodb.db.collection::<Category>("categories");
    let mut category = categories
        .find_one(doc! { "category_id": &category_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Категория не найдена".to_string()))?;

    if let Some(title) = &payload.title {
        let title = validate_title(title)?;
        ensure_unique_title(&data, &title, Some(category_id.as_str())).await?;
        category.title = title;
    }
    if let Some(color) = &payload.color {
        validate_color(color)?;
        category.color = color.clone();
    }

    let mut session = data.mongodb.client.start_session().await?;
    session.start_transaction().await?;
    categories
        .replace_one(doc! { "category_id": &category_id }, &category)
        .session(&mut session)
        .await?;
    history::record(
        &data.mongodb.db,
        &mut session,
        "category",
        &category_id,
        HistoryAction::Update,
        &category,
    )
    .await?;
    session.commit_transaction().await?;

    Ok(HttpResponse::Ok().json(category))
}

/// DELETE /admin/categories/{category_id}
///
/// Referencing tasks keep existing but lose their category.
pub async fn delete_category(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    require_admin(&data, &user_id).await?;
    let category_id = path.into_inner();

    let categories = data.mongodb.db.collection::<Category>("categories");
    let category = categories
        .find_one(doc! { "category_id": &category_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Категория не найдена".to_string()))?;

    let tasks = data.mongodb.db.collection::<Task>("tasks");
    let mut session = data.mongodb.client.start_session().await?;
    session.start_transaction().await?;
    categories
        .delete_one(doc! { "category_id": &category_id })
        .session(&mut session)
        .await?;
    tasks
        .update_many(
            doc! { "category_id": &category_id },
            doc! { "$set": { "category_id": Bson::Null } },
        )
        .session(&mut session)
        .await?;
    history::record(
        &data.mongodb.db,
        &mut session,
        "category",
        &category_id,
        HistoryAction::Delete,
        &category,
    )
    .await?;
    session.commit_transaction().await?;

    info!("Category deleted: {}", category_id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "detail": "Категория удалена" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_must_have_three_chars_after_trim() {
        assert!(validate_title("  ab  ").is_err());
        assert_eq!(validate_title("  abc  ").unwrap(), "abc");
        // Cyrillic titles count by characters, not bytes.
        assert_eq!(validate_title("Дом").unwrap(), "Дом");
    }

    #[test]
    fn color_must_come_from_the_fixed_set() {
        for (hex, _) in COLOR_CHOICES {
            assert!(validate_color(hex).is_ok());
        }
        assert!(validate_color("#123456").is_err());
        assert!(validate_color("red").is_err());
    }

    #[test]
    fn default_color_is_white() {
        assert_eq!(DEFAULT_COLOR, "#FFFFFF");
        assert!(validate_color(DEFAULT_COLOR).is_ok());
    }
}
