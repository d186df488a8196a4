use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::history::{self, HistoryAction};
use crate::task::Task;

pub const MAX_TEXT_CHARS: usize = 1000;
pub const MIN_TEXT_CHARS: usize = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub comment_id: String,
    pub task_id: String,
    pub user_id: String,
    pub text: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub comment_id: String,
    pub task_id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        CommentResponse {
            comment_id: comment.comment_id,
            task_id: comment.task_id,
            user_id: comment.user_id,
            text: comment.text,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

pub fn validate_text(text: &str) -> Result<String, ApiError> {
    let trimmed = text.trim();
    let chars = trimmed.chars().count();
    if chars < MIN_TEXT_CHARS {
        return Err(ApiError::validation(
            "text",
            "Комментарий должен содержать минимум 5 символов",
        ));
    }
    if chars > MAX_TEXT_CHARS {
        return Err(ApiError::validation(
            "text",
            "Максимальная длина комментария 1000 символов",
        ));
    }
    Ok(trimmed.to_string())
}

async fn find_visible_task(
    data: &AppState,
    task_id: &str,
    user_id: &str,
) -> Result<Task, ApiError> {
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    tasks_coll
        .find_one(doc! { "task_id": task_id, "users": user_id })
        .await?
        .ok_or_else(ApiError::task_not_found)
}

/// GET /tasks/{task_id}/comments
pub async fn list_comments(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let task_id = path.into_inner();
    find_visible_task(&data, &task_id, &user_id).await?;

    let comments_coll = data.mongodb.db.collection::<Comment>("comments");
    let mut cursor = comments_coll
        .find(doc! { "task_id": &task_id })
        .sort(doc! { "created_at": -1 })
        .await?;

    let mut comments: Vec<CommentResponse> = vec![];
    while let Some(comment) = cursor.next().await {
        match comment {
            Ok(c) => comments.push(c.into()),
            Err(e) => {
                error!("Error reading comments cursor: {}", e);
                return Err(ApiError::Database(e));
            }
        }
    }
    Ok(HttpResponse::Ok().json(comments))
}

/// POST /tasks/{task_id}/comments
///
/// The comment insert and the parent task's `update_date` refresh are one
/// unit of work: a reader never sees one without the other.
pub async fn create_comment(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let task_id = path.into_inner();
    let mut task = find_visible_task(&data, &task_id, &user_id).await?;

    let text = validate_text(&payload.text)?;
    let now = Utc::now();

    let new_comment = Comment {
        id: None,
        comment_id: Uuid::new_v4().to_string(),
        task_id: task_id.clone(),
        user_id,
        text,
        created_at: now,
        updated_at: now,
    };
    task.update_date = now;

    let comments_coll = data.mongodb.db.collection::<Comment>("comments");
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let mut session = data.mongodb.client.start_session().await?;
    session.start_transaction().await?;
    comments_coll
        .insert_one(&new_comment)
        .session(&mut session)
        .await?;
    tasks_coll
        .replace_one(doc! { "task_id": &task_id }, &task)
        .session(&mut session)
        .await?;
    history::record(
        &data.mongodb.db,
        &mut session,
        "comment",
        &new_comment.comment_id,
        HistoryAction::Create,
        &new_comment,
    )
    .await?;
    history::record(
        &data.mongodb.db,
        &mut session,
        "task",
        &task_id,
        HistoryAction::Update,
        &task,
    )
    .await?;
    session.commit_transaction().await?;

    info!("Comment created: {} on task {}", new_comment.comment_id, task_id);
    Ok(HttpResponse::Created().json(CommentResponse::from(new_comment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_rejected() {
        assert!(validate_text("ok").is_err());
        assert!(validate_text("  ok  ").is_err());
    }

    #[test]
    fn five_chars_after_trim_is_the_minimum() {
        assert_eq!(validate_text(" okay! ").unwrap(), "okay!");
        assert!(validate_text("спасибо").is_ok());
    }

    #[test]
    fn overlong_text_is_rejected() {
        let text = "а".repeat(MAX_TEXT_CHARS);
        assert!(validate_text(&text).is_ok());
        let text = "а".repeat(MAX_TEXT_CHARS + 1);
        assert!(validate_text(&text).is_err());
    }
}
