use chrono::{DateTime, Utc};
use mongodb::bson::{to_document, Document};
use mongodb::{ClientSession, Database};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const COLLECTION: &str = "history";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
}

/// Append-only snapshot of an entity taken at mutation time. Records are
/// never updated or deleted by normal operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub entity_type: String,
    pub entity_id: String,
    pub action: HistoryAction,
    pub snapshot: Document,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub recorded_at: DateTime<Utc>,
}

/// Appends one history record inside the caller's transaction, so the
/// snapshot is never visible without the primary write (and vice versa).
pub async fn record<T: Serialize>(
    db: &Database,
    session: &mut ClientSession,
    entity_type: &str,
    entity_id: &str,
    action: HistoryAction,
    entity: &T,
) -> Result<(), ApiError> {
    let snapshot = to_document(entity).map_err(mongodb::error::Error::from)?;
    let record = HistoryRecord {
        entity_type: entity_type.to_string(),
        entity_id: entity_id.to_string(),
        action,
        snapshot,
        recorded_at: Utc::now(),
    };
    db.collection::<HistoryRecord>(COLLECTION)
        .insert_one(&record)
        .session(session)
        .await?;
    Ok(())
}
