use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::{doc, Bson};
use serde::Serialize;

use crate::app_state::AppState;
use crate::auth::{current_user, User};
use crate::error::ApiError;
use crate::history::{self, HistoryAction, HistoryRecord};
use crate::task::{self, TaskStatus};

/// The back-office surface is invisible to everyone else: failing the check
/// reads the same as the route not existing.
pub async fn require_admin(data: &AppState, user_id: &str) -> Result<(), ApiError> {
    let users = data.mongodb.db.collection::<User>("users");
    match users.find_one(doc! { "user_id": user_id }).await? {
        Some(user) if user.is_admin => Ok(()),
        _ => Err(ApiError::NotFound("Не найдено".to_string())),
    }
}

#[derive(Debug, Serialize)]
pub struct TaskStats {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
}

/// GET /admin/tasks/stats
pub async fn task_stats(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    require_admin(&data, &user_id).await?;

    let tasks = data
        .mongodb
        .db
        .collection::<mongodb::bson::Document>("tasks");
    let stats = TaskStats {
        total: tasks.count_documents(doc! {}).await?,
        pending: tasks
            .count_documents(doc! { "status": TaskStatus::Pending.as_str() })
            .await?,
        in_progress: tasks
            .count_documents(doc! { "status": TaskStatus::InProgress.as_str() })
            .await?,
        completed: tasks
            .count_documents(doc! { "status": TaskStatus::Completed.as_str() })
            .await?,
    };
    Ok(HttpResponse::Ok().json(stats))
}

/// GET /admin/tasks/overdue
///
/// Overdue tasks across every owner, for the back office.
pub async fn overdue_report(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    require_admin(&data, &user_id).await?;

    let filter = task::overdue_filter(None, Utc::now());
    let tasks = task::collect_tasks(&data, filter, Some(doc! { "due_date": 1 })).await?;
    let responses = task::task_responses(&data.mongodb.db, tasks).await?;
    Ok(HttpResponse::Ok().json(responses))
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub recorded_at: DateTime<Utc>,
    pub snapshot: serde_json::Value,
}

/// GET /admin/history/{entity_type}/{entity_id}
///
/// The audit trail for one entity, oldest first.
pub async fn entity_history(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    require_admin(&data, &user_id).await?;
    let (entity_type, entity_id) = path.into_inner();

    let records = data
        .mongodb
        .db
        .collection::<HistoryRecord>(history::COLLECTION);
    let mut cursor = records
        .find(doc! { "entity_type": &entity_type, "entity_id": &entity_id })
        .sort(doc! { "recorded_at": 1 })
        .await?;

    let mut entries = vec![];
    while let Some(record) = cursor.next().await {
        match record {
            Ok(record) => entries.push(HistoryEntry {
                action: record.action,
                recorded_at: record.recorded_at,
                snapshot: Bson::Document(record.snapshot).into_relaxed_extjson(),
            }),
            Err(e) => {
                error!("Error reading history cursor: {}", e);
                return Err(ApiError::Database(e));
            }
        }
    }
    Ok(HttpResponse::Ok().json(entries))
}
