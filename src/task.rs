use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::Database;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{current_user, User};
use crate::category::Category;
use crate::comment::Comment;
use crate::error::ApiError;
use crate::history::{self, HistoryAction};

pub const DEFAULT_PRIORITY: i32 = 2;

/// Tasks in this category never show up in the low-priority backlog slice of
/// the filtered view.
pub const WORK_CATEGORY_TITLE: &str = "Работа";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "В ожидании",
            TaskStatus::InProgress => "В процессе",
            TaskStatus::Completed => "Выполнено",
        }
    }
}

/// Statuses counted as active: such tasks can still become overdue.
pub const ACTIVE_STATUSES: [&str; 2] = ["pending", "in_progress"];

pub fn priority_label(priority: i32) -> &'static str {
    match priority {
        1 => "Низкий",
        2 => "Средний",
        3 => "Высокий",
        4 => "Критический",
        _ => "",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: i32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub due_date: DateTime<Utc>,
    /// Set once at first persistence, never changed afterwards.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub creation_date: DateTime<Utc>,
    /// Refreshed on every mutation, including comment creation.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub update_date: DateTime<Utc>,
    pub category_id: Option<String>,
    /// Owners. Only listed users can read, edit or delete the task.
    pub users: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
    pub status: Option<TaskStatus>,
    pub priority: Option<i32>,
    pub due_date: DateTime<Utc>,
    pub category_id: Option<String>,
    pub user_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    /// Absent: keep the current category. Explicit null: detach it.
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<String>>,
    pub user_ids: Option<Vec<String>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct UserBrief {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub status_display: &'static str,
    pub priority: i32,
    pub priority_display: &'static str,
    pub due_date: DateTime<Utc>,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    pub category_id: Option<String>,
    pub users: Vec<UserBrief>,
}

impl TaskResponse {
    fn from_task(task: Task, usernames: &HashMap<String, String>) -> Self {
        let users = task
            .users
            .into_iter()
            .map(|user_id| {
                let username = usernames.get(&user_id).cloned().unwrap_or_default();
                UserBrief { user_id, username }
            })
            .collect();
        TaskResponse {
            task_id: task.task_id,
            title: task.title,
            description: task.description,
            status: task.status,
            status_display: task.status.display_label(),
            priority: task.priority,
            priority_display: priority_label(task.priority),
            due_date: task.due_date,
            creation_date: task.creation_date,
            update_date: task.update_date,
            category_id: task.category_id,
            users,
        }
    }
}

pub fn validate_title(title: &str) -> Result<String, ApiError> {
    let trimmed = title.trim();
    if trimmed.chars().count() < 3 {
        return Err(ApiError::validation(
            "title",
            "Название задачи должно содержать минимум 3 символа",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_priority(priority: i32) -> Result<(), ApiError> {
    if !(1..=4).contains(&priority) {
        return Err(ApiError::validation(
            "priority",
            "Приоритет должен быть в диапазоне от 1 до 4",
        ));
    }
    Ok(())
}

pub fn validate_due_date(due_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ApiError> {
    if due_date < now {
        return Err(ApiError::validation(
            "due_date",
            "Срок выполнения не может быть в прошлом",
        ));
    }
    Ok(())
}

/// Base predicate for everything an owner may see.
pub fn owner_filter(user_id: &str) -> Document {
    doc! { "users": user_id }
}

/// Tasks past their due date that are still active. Completed tasks are never
/// overdue, whatever their due date. `user_id` of `None` spans all users.
pub fn overdue_filter(user_id: Option<&str>, now: DateTime<Utc>) -> Document {
    let mut filter = doc! {
        "due_date": { "$lt": BsonDateTime::from_chrono(now) },
        "status": { "$in": ACTIVE_STATUSES.to_vec() },
    };
    if let Some(user_id) = user_id {
        filter.insert("users", user_id);
    }
    filter
}

/// Slice A of the filtered view: active high/critical-priority tasks that are
/// not overdue.
pub fn active_priority_filter(user_id: &str, now: DateTime<Utc>) -> Document {
    doc! {
        "users": user_id,
        "status": { "$in": ACTIVE_STATUSES.to_vec() },
        "priority": { "$gte": 3 },
        "due_date": { "$gte": BsonDateTime::from_chrono(now) },
    }
}

/// Slice B of the filtered view: low-priority pending tasks outside the work
/// category. Tasks with no category qualify.
pub fn pending_backlog_filter(user_id: &str, work_category_ids: &[String]) -> Document {
    doc! {
        "users": user_id,
        "status": TaskStatus::Pending.as_str(),
        "priority": { "$lte": 2 },
        "category_id": { "$nin": work_category_ids.to_vec() },
    }
}

/// Union of the two filtered slices, deduplicated by task identity. The first
/// occurrence wins, so ordering within each slice is preserved.
pub fn merge_distinct(main: Vec<Task>, extra: Vec<Task>) -> Vec<Task> {
    let mut seen = std::collections::HashSet::new();
    main.into_iter()
        .chain(extra)
        .filter(|task| seen.insert(task.task_id.clone()))
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<i32>,
    pub priority_gte: Option<i32>,
    pub priority_lte: Option<i32>,
    pub due_date_gte: Option<DateTime<Utc>>,
    pub due_date_lte: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

pub fn list_filter(user_id: &str, query: &TaskListQuery) -> Document {
    let mut filter = owner_filter(user_id);

    if let Some(status) = query.status {
        filter.insert("status", status.as_str());
    }
    if let Some(priority) = query.priority {
        filter.insert("priority", priority);
    } else {
        let mut range = Document::new();
        if let Some(gte) = query.priority_gte {
            range.insert("$gte", gte);
        }
        if let Some(lte) = query.priority_lte {
            range.insert("$lte", lte);
        }
        if !range.is_empty() {
            filter.insert("priority", range);
        }
    }

    let mut due_range = Document::new();
    if let Some(gte) = query.due_date_gte {
        due_range.insert("$gte", BsonDateTime::from_chrono(gte));
    }
    if let Some(lte) = query.due_date_lte {
        due_range.insert("$lte", BsonDateTime::from_chrono(lte));
    }
    if !due_range.is_empty() {
        filter.insert("due_date", due_range);
    }

    if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = regex::escape(term);
        filter.insert(
            "$or",
            vec![
                doc! { "title": { "$regex": &pattern, "$options": "i" } },
                doc! { "description": { "$regex": &pattern, "$options": "i" } },
            ],
        );
    }

    filter
}

pub(crate) async fn collect_tasks(
    data: &AppState,
    filter: Document,
    sort: Option<Document>,
) -> Result<Vec<Task>, ApiError> {
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let mut find = tasks_coll.find(filter);
    if let Some(sort) = sort {
        find = find.sort(sort);
    }
    let mut cursor = find.await?;

    let mut tasks = vec![];
    while let Some(task) = cursor.next().await {
        match task {
            Ok(t) => tasks.push(t),
            Err(e) => {
                error!("Error reading tasks cursor: {}", e);
                return Err(ApiError::Database(e));
            }
        }
    }
    Ok(tasks)
}

/// One `$in` lookup from user ids to usernames.
pub(crate) async fn username_map(
    db: &Database,
    mut ids: Vec<String>,
) -> Result<HashMap<String, String>, ApiError> {
    ids.sort();
    ids.dedup();

    let mut usernames = HashMap::new();
    if !ids.is_empty() {
        let users_coll = db.collection::<User>("users");
        let mut cursor = users_coll.find(doc! { "user_id": { "$in": ids } }).await?;
        while let Some(user) = cursor.next().await {
            let user = user?;
            usernames.insert(user.user_id, user.username);
        }
    }
    Ok(usernames)
}

/// Resolves owner usernames in one query and builds the response payloads.
pub async fn task_responses(
    db: &Database,
    tasks: Vec<Task>,
) -> Result<Vec<TaskResponse>, ApiError> {
    let ids: Vec<String> = tasks.iter().flat_map(|t| t.users.iter().cloned()).collect();
    let usernames = username_map(db, ids).await?;

    Ok(tasks
        .into_iter()
        .map(|task| TaskResponse::from_task(task, &usernames))
        .collect())
}

async fn find_owned_task(data: &AppState, task_id: &str, user_id: &str) -> Result<Task, ApiError> {
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    tasks_coll
        .find_one(doc! { "task_id": task_id, "users": user_id })
        .await?
        .ok_or_else(ApiError::task_not_found)
}

async fn ensure_category_exists(data: &AppState, category_id: &str) -> Result<(), ApiError> {
    let categories = data.mongodb.db.collection::<Category>("categories");
    if categories
        .find_one(doc! { "category_id": category_id })
        .await?
        .is_none()
    {
        return Err(ApiError::validation("category_id", "Категория не найдена"));
    }
    Ok(())
}

async fn resolve_owners(
    data: &AppState,
    user_ids: &[String],
) -> Result<Vec<String>, ApiError> {
    let mut unique = user_ids.to_vec();
    unique.sort();
    unique.dedup();
    if unique.is_empty() {
        return Err(ApiError::validation(
            "user_ids",
            "Задача должна иметь хотя бы одного владельца",
        ));
    }

    let users_coll = data.mongodb.db.collection::<User>("users");
    let found = users_coll
        .count_documents(doc! { "user_id": { "$in": unique.clone() } })
        .await?;
    if found as usize != unique.len() {
        return Err(ApiError::validation(
            "user_ids",
            "Указан несуществующий пользователь",
        ));
    }
    Ok(unique)
}

/// GET /tasks
pub async fn list_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<TaskListQuery>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;

    let filter = list_filter(&user_id, &query);
    let tasks = collect_tasks(&data, filter, Some(doc! { "due_date": -1 })).await?;
    let responses = task_responses(&data.mongodb.db, tasks).await?;
    Ok(HttpResponse::Ok().json(responses))
}

/// POST /tasks
pub async fn create_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;

    let title = validate_title(&payload.title)?;
    let priority = payload.priority.unwrap_or(DEFAULT_PRIORITY);
    validate_priority(priority)?;
    let now = Utc::now();
    validate_due_date(payload.due_date, now)?;

    if let Some(category_id) = &payload.category_id {
        ensure_category_exists(&data, category_id).await?;
    }

    // The creator becomes sole owner unless an explicit owner list is given.
    let users = match payload.user_ids.as_deref() {
        Some(ids) if !ids.is_empty() => resolve_owners(&data, ids).await?,
        _ => vec![user_id.clone()],
    };

    let new_task = Task {
        id: None,
        task_id: Uuid::new_v4().to_string(),
        title,
        description: payload.description.clone(),
        status: payload.status.unwrap_or(TaskStatus::Pending),
        priority,
        due_date: payload.due_date,
        creation_date: now,
        update_date: now,
        category_id: payload.category_id.clone(),
        users,
    };

    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let mut session = data.mongodb.client.start_session().await?;
    session.start_transaction().await?;
    tasks_coll.insert_one(&new_task).session(&mut session).await?;
    history::record(
        &data.mongodb.db,
        &mut session,
        "task",
        &new_task.task_id,
        HistoryAction::Create,
        &new_task,
    )
    .await?;
    session.commit_transaction().await?;

    info!("Task created: {}", new_task.task_id);
    let mut responses = task_responses(&data.mongodb.db, vec![new_task]).await?;
    Ok(HttpResponse::Created().json(responses.pop()))
}

/// GET /tasks/{task_id}
pub async fn get_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let task = find_owned_task(&data, &path.into_inner(), &user_id).await?;
    let mut responses = task_responses(&data.mongodb.db, vec![task]).await?;
    Ok(HttpResponse::Ok().json(responses.pop()))
}

/// PUT /tasks/{task_id}
pub async fn update_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let task_id = path.into_inner();
    let mut task = find_owned_task(&data, &task_id, &user_id).await?;

    if let Some(title) = &payload.title {
        task.title = validate_title(title)?;
    }
    if let Some(description) = &payload.description {
        task.description = description.clone();
    }
    if let Some(status) = payload.status {
        task.status = status;
    }
    if let Some(priority) = payload.priority {
        validate_priority(priority)?;
        task.priority = priority;
    }
    if let Some(due_date) = payload.due_date {
        validate_due_date(due_date, Utc::now())?;
        task.due_date = due_date;
    }
    match &payload.category_id {
        None => {}
        Some(None) => task.category_id = None,
        Some(Some(category_id)) => {
            ensure_category_exists(&data, category_id).await?;
            task.category_id = Some(category_id.clone());
        }
    }
    if let Some(user_ids) = &payload.user_ids {
        task.users = resolve_owners(&data, user_ids).await?;
    }
    task.update_date = Utc::now();

    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let mut session = data.mongodb.client.start_session().await?;
    session.start_transaction().await?;
    tasks_coll
        .replace_one(doc! { "task_id": &task_id }, &task)
        .session(&mut session)
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

    let mut responses = task_responses(&data.mongodb.db, vec![task]).await?;
    Ok(HttpResponse::Ok().json(responses.pop()))
}

/// DELETE /tasks/{task_id}
///
/// Deleting a task takes its comments with it.
pub async fn delete_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let task_id = path.into_inner();
    let task = find_owned_task(&data, &task_id, &user_id).await?;

    let comments_coll = data.mongodb.db.collection::<Comment>("comments");
    let mut cursor = comments_coll.find(doc! { "task_id": &task_id }).await?;
    let mut comments = vec![];
    while let Some(comment) = cursor.next().await {
        comments.push(comment?);
    }

    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let mut session = data.mongodb.client.start_session().await?;
    session.start_transaction().await?;
    tasks_coll
        .delete_one(doc! { "task_id": &task_id })
        .session(&mut session)
        .await?;
    comments_coll
        .delete_many(doc! { "task_id": &task_id })
        .session(&mut session)
        .await?;
    history::record(
        &data.mongodb.db,
        &mut session,
        "task",
        &task_id,
        HistoryAction::Delete,
        &task,
    )
    .await?;
    for comment in &comments {
        history::record(
            &data.mongodb.db,
            &mut session,
            "comment",
            &comment.comment_id,
            HistoryAction::Delete,
            comment,
        )
        .await?;
    }
    session.commit_transaction().await?;

    info!("Task deleted: {} ({} comments)", task_id, comments.len());
    Ok(HttpResponse::Ok().json(serde_json::json!({ "detail": "Задача удалена" })))
}

/// GET /tasks/overdue
pub async fn overdue_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;

    let filter = overdue_filter(Some(user_id.as_str()), Utc::now());
    let tasks = collect_tasks(&data, filter, None).await?;
    let responses = task_responses(&data.mongodb.db, tasks).await?;
    Ok(HttpResponse::Ok().json(responses))
}

/// GET /tasks/filtered
///
/// Two slices queried separately and merged without duplicates: active
/// high-priority tasks that are still on schedule, plus the low-priority
/// pending backlog outside the work category.
pub async fn filtered_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let now = Utc::now();

    let categories = data.mongodb.db.collection::<Category>("categories");
    let mut cursor = categories.find(doc! { "title": WORK_CATEGORY_TITLE }).await?;
    let mut work_category_ids = vec![];
    while let Some(category) = cursor.next().await {
        work_category_ids.push(category?.category_id);
    }

    let main = collect_tasks(&data, active_priority_filter(&user_id, now), None).await?;
    let extra = collect_tasks(&data, pending_backlog_filter(&user_id, &work_category_ids), None).await?;
    let merged = merge_distinct(main, extra);

    let responses = task_responses(&data.mongodb.db, merged).await?;
    Ok(HttpResponse::Ok().json(responses))
}

/// POST /tasks/{task_id}/complete
///
/// The only dedicated status transition. Repeating it is a conflict, not a
/// no-op.
pub async fn mark_complete(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let task_id = path.into_inner();
    let mut task = find_owned_task(&data, &task_id, &user_id).await?;

    if task.status == TaskStatus::Completed {
        return Err(ApiError::Conflict("Задача уже выполнена".to_string()));
    }

    task.status = TaskStatus::Completed;
    task.update_date = Utc::now();

    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let mut session = data.mongodb.client.start_session().await?;
    session.start_transaction().await?;
    tasks_coll
        .replace_one(doc! { "task_id": &task_id }, &task)
        .session(&mut session)
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

    info!("Task completed: {}", task_id);
    let mut responses = task_responses(&data.mongodb.db, vec![task]).await?;
    Ok(HttpResponse::Ok().json(responses.pop()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_task(task_id: &str, priority: i32, status: TaskStatus) -> Task {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        Task {
            id: None,
            task_id: task_id.to_string(),
            title: format!("Задача {}", task_id),
            description: String::new(),
            status,
            priority,
            due_date: at,
            creation_date: at,
            update_date: at,
            category_id: None,
            users: vec!["u1".to_string()],
        }
    }

    #[test]
    fn title_requires_three_chars_after_trim() {
        assert!(validate_title(" ab ").is_err());
        assert_eq!(validate_title(" купить хлеб ").unwrap(), "купить хлеб");
    }

    #[test]
    fn priority_outside_one_to_four_is_rejected() {
        assert!(validate_priority(0).is_err());
        assert!(validate_priority(5).is_err());
        for p in 1..=4 {
            assert!(validate_priority(p).is_ok());
        }
    }

    #[test]
    fn due_date_in_the_past_is_rejected() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert!(validate_due_date(now - chrono::Duration::seconds(1), now).is_err());
        // Exactly "now" is still acceptable.
        assert!(validate_due_date(now, now).is_ok());
        assert!(validate_due_date(now + chrono::Duration::days(1), now).is_ok());
    }

    #[test]
    fn overdue_filter_excludes_completed_statuses() {
        let now = Utc::now();
        let filter = overdue_filter(Some("u1"), now);
        assert_eq!(filter.get_str("users").unwrap(), "u1");
        let statuses = filter.get_document("status").unwrap().get_array("$in").unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(!statuses.iter().any(|s| s.as_str() == Some("completed")));
        assert!(filter.get_document("due_date").unwrap().contains_key("$lt"));
    }

    #[test]
    fn overdue_filter_without_user_spans_all_owners() {
        let filter = overdue_filter(None, Utc::now());
        assert!(!filter.contains_key("users"));
    }

    #[test]
    fn active_priority_filter_keeps_high_priorities_on_schedule() {
        let filter = active_priority_filter("u1", Utc::now());
        assert_eq!(
            filter.get_document("priority").unwrap().get_i32("$gte").unwrap(),
            3
        );
        assert!(filter.get_document("due_date").unwrap().contains_key("$gte"));
    }

    #[test]
    fn pending_backlog_filter_excludes_work_categories() {
        let work = vec!["cat-work".to_string()];
        let filter = pending_backlog_filter("u1", &work);
        assert_eq!(filter.get_str("status").unwrap(), "pending");
        assert_eq!(
            filter.get_document("priority").unwrap().get_i32("$lte").unwrap(),
            2
        );
        let excluded = filter.get_document("category_id").unwrap().get_array("$nin").unwrap();
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].as_str(), Some("cat-work"));
    }

    #[test]
    fn merge_keeps_both_slices_and_drops_duplicates() {
        let t1 = sample_task("t1", 4, TaskStatus::Pending);
        let t2 = sample_task("t2", 1, TaskStatus::Pending);
        let dup = sample_task("t1", 4, TaskStatus::Pending);

        let merged = merge_distinct(vec![t1], vec![t2, dup]);
        let ids: Vec<&str> = merged.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[test]
    fn merge_of_disjoint_slices_matches_the_expected_union() {
        // Priorities 4 and 1: the slices cannot overlap, the union is plain.
        let main = vec![sample_task("t1", 4, TaskStatus::Pending)];
        let extra = vec![sample_task("t2", 1, TaskStatus::Pending)];
        assert_eq!(merge_distinct(main, extra).len(), 2);
    }

    #[test]
    fn status_labels_are_localized() {
        assert_eq!(TaskStatus::Pending.display_label(), "В ожидании");
        assert_eq!(TaskStatus::InProgress.display_label(), "В процессе");
        assert_eq!(TaskStatus::Completed.display_label(), "Выполнено");
    }

    #[test]
    fn priority_labels_cover_the_full_range() {
        assert_eq!(priority_label(1), "Низкий");
        assert_eq!(priority_label(2), "Средний");
        assert_eq!(priority_label(3), "Высокий");
        assert_eq!(priority_label(4), "Критический");
    }

    #[test]
    fn list_filter_combines_owner_with_requested_bounds() {
        let query = TaskListQuery {
            status: Some(TaskStatus::Pending),
            priority: None,
            priority_gte: Some(2),
            priority_lte: Some(3),
            due_date_gte: None,
            due_date_lte: None,
            search: None,
        };
        let filter = list_filter("u1", &query);
        assert_eq!(filter.get_str("users").unwrap(), "u1");
        assert_eq!(filter.get_str("status").unwrap(), "pending");
        let priority = filter.get_document("priority").unwrap();
        assert_eq!(priority.get_i32("$gte").unwrap(), 2);
        assert_eq!(priority.get_i32("$lte").unwrap(), 3);
    }

    #[test]
    fn list_filter_search_escapes_regex_metacharacters() {
        let query = TaskListQuery {
            status: None,
            priority: None,
            priority_gte: None,
            priority_lte: None,
            due_date_gte: None,
            due_date_lte: None,
            search: Some("отчет (v2)".to_string()),
        };
        let filter = list_filter("u1", &query);
        let or = filter.get_array("$or").unwrap();
        assert_eq!(or.len(), 2);
        let title = or[0].as_document().unwrap().get_document("title").unwrap();
        assert!(title.get_str("$regex").unwrap().contains("\\("));
    }
}
