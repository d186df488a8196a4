use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::info;
use mongodb::bson::doc;
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::admin::require_admin;
use crate::app_state::AppState;
use crate::auth::current_user;
use crate::category::Category;
use crate::error::ApiError;
use crate::task::{self, Task, TaskStatus};

/// Only high and critical priority tasks are exported, whatever filters the
/// caller asks for.
pub const EXPORT_MIN_PRIORITY: i32 = 3;

pub const EXPORT_HEADERS: [&str; 10] = [
    "id",
    "title",
    "description",
    "user",
    "category",
    "Статус",
    "priority",
    "due_date",
    "creation_date",
    "update_date",
];

/// Long-form status labels used in the spreadsheet. Note the export wording
/// for completed tasks differs from the model display label.
pub fn status_export_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "В ожидании",
        TaskStatus::InProgress => "В процессе",
        TaskStatus::Completed => "Завершено",
    }
}

pub fn format_due_date(due_date: DateTime<Utc>) -> String {
    due_date.format("%d-%m-%Y").to_string()
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%d-%m-%Y %H:%M").to_string()
}

#[derive(Debug, PartialEq)]
pub struct ExportRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub user: String,
    pub category: String,
    pub status: String,
    pub priority: i32,
    pub due_date: String,
    pub creation_date: String,
    pub update_date: String,
}

/// Projects tasks into display-only rows. Tasks below the export priority
/// floor are dropped here even if the caller's query let them through.
pub fn export_rows(
    tasks: &[Task],
    usernames: &HashMap<String, String>,
    category_titles: &HashMap<String, String>,
) -> Vec<ExportRow> {
    tasks
        .iter()
        .filter(|task| task.priority >= EXPORT_MIN_PRIORITY)
        .map(|task| {
            let user = task
                .users
                .iter()
                .map(|id| usernames.get(id).cloned().unwrap_or_default())
                .collect::<Vec<_>>()
                .join(", ");
            let category = task
                .category_id
                .as_ref()
                .and_then(|id| category_titles.get(id).cloned())
                .unwrap_or_default();
            ExportRow {
                id: task.task_id.clone(),
                title: task.title.clone(),
                description: task.description.clone(),
                user,
                category,
                status: status_export_label(task.status).to_string(),
                priority: task.priority,
                due_date: format_due_date(task.due_date),
                creation_date: format_timestamp(task.creation_date),
                update_date: format_timestamp(task.update_date),
            }
        })
        .collect()
}

pub fn write_workbook(rows: &[ExportRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let header_format = Format::new().set_bold();
    for (col, header) in EXPORT_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        worksheet.write_string(r, 0, &row.id)?;
        worksheet.write_string(r, 1, &row.title)?;
        worksheet.write_string(r, 2, &row.description)?;
        worksheet.write_string(r, 3, &row.user)?;
        worksheet.write_string(r, 4, &row.category)?;
        worksheet.write_string(r, 5, &row.status)?;
        worksheet.write_number(r, 6, row.priority as f64)?;
        worksheet.write_string(r, 7, &row.due_date)?;
        worksheet.write_string(r, 8, &row.creation_date)?;
        worksheet.write_string(r, 9, &row.update_date)?;
    }

    workbook.save_to_buffer()
}

/// GET /admin/tasks/export
pub async fn export_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    require_admin(&data, &user_id).await?;

    let filter = doc! { "priority": { "$gte": EXPORT_MIN_PRIORITY } };
    let tasks = task::collect_tasks(&data, filter, Some(doc! { "due_date": -1 })).await?;

    let owner_ids: Vec<String> = tasks.iter().flat_map(|t| t.users.iter().cloned()).collect();
    let usernames = task::username_map(&data.mongodb.db, owner_ids).await?;

    let categories_coll = data.mongodb.db.collection::<Category>("categories");
    let mut cursor = categories_coll.find(doc! {}).await?;
    let mut category_titles = HashMap::new();
    while let Some(category) = cursor.next().await {
        let category = category?;
        category_titles.insert(category.category_id, category.title);
    }

    let rows = export_rows(&tasks, &usernames, &category_titles);
    let buffer = write_workbook(&rows)?;
    info!("Exported {} tasks to XLSX", rows.len());

    Ok(HttpResponse::Ok()
        .content_type("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        .insert_header(("Content-Disposition", "attachment; filename=\"tasks.xlsx\""))
        .body(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mongodb::bson::oid::ObjectId;

    fn task(task_id: &str, priority: i32, status: TaskStatus) -> Task {
        Task {
            id: Some(ObjectId::new()),
            task_id: task_id.to_string(),
            title: format!("Задача {}", task_id),
            description: "описание".to_string(),
            status,
            priority,
            due_date: Utc.with_ymd_and_hms(2025, 6, 5, 10, 0, 0).unwrap(),
            creation_date: Utc.with_ymd_and_hms(2025, 6, 1, 14, 30, 0).unwrap(),
            update_date: Utc.with_ymd_and_hms(2025, 6, 2, 9, 5, 0).unwrap(),
            category_id: Some("cat1".to_string()),
            users: vec!["u1".to_string()],
        }
    }

    fn maps() -> (HashMap<String, String>, HashMap<String, String>) {
        let mut usernames = HashMap::new();
        usernames.insert("u1".to_string(), "alice".to_string());
        let mut categories = HashMap::new();
        categories.insert("cat1".to_string(), "Личное".to_string());
        (usernames, categories)
    }

    #[test]
    fn only_high_priority_tasks_are_exported() {
        let tasks = vec![
            task("t1", 1, TaskStatus::Pending),
            task("t2", 3, TaskStatus::Pending),
            task("t3", 4, TaskStatus::Completed),
            task("t4", 2, TaskStatus::InProgress),
        ];
        let (usernames, categories) = maps();
        let rows = export_rows(&tasks, &usernames, &categories);
        let exported: Vec<(&str, i32)> =
            rows.iter().map(|r| (r.id.as_str(), r.priority)).collect();
        assert_eq!(exported, vec![("t2", 3), ("t3", 4)]);
    }

    #[test]
    fn rows_carry_localized_labels_and_formatted_dates() {
        let tasks = vec![task("t1", 3, TaskStatus::Pending)];
        let (usernames, categories) = maps();
        let rows = export_rows(&tasks, &usernames, &categories);

        assert_eq!(rows[0].status, "В ожидании");
        assert_eq!(rows[0].user, "alice");
        assert_eq!(rows[0].category, "Личное");
        assert_eq!(rows[0].due_date, "05-06-2025");
        assert_eq!(rows[0].creation_date, "01-06-2025 14:30");
        assert_eq!(rows[0].update_date, "02-06-2025 09:05");
    }

    #[test]
    fn completed_status_uses_the_export_wording() {
        assert_eq!(status_export_label(TaskStatus::Completed), "Завершено");
        // The model display label wording is different on purpose.
        assert_eq!(TaskStatus::Completed.display_label(), "Выполнено");
    }

    #[test]
    fn workbook_renders_without_errors() {
        let tasks = vec![task("t1", 4, TaskStatus::InProgress)];
        let (usernames, categories) = maps();
        let rows = export_rows(&tasks, &usernames, &categories);
        let buffer = write_workbook(&rows).unwrap();
        assert!(!buffer.is_empty());
    }
}
