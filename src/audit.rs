use diesel::{prelude::*, PgConnection};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::models::NewActivityLogEntry;
use crate::schema::activity_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
    Share,
    Unshare,
    Provision,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Share => "share",
            Action::Unshare => "unshare",
            Action::Provision => "provision",
        }
    }
}

/// Appends an activity row. A failed write is logged and swallowed so the
/// mutation that triggered it still succeeds.
pub fn record(
    conn: &mut PgConnection,
    trip_id: Option<Uuid>,
    user_id: Option<Uuid>,
    action: Action,
    entity_type: &str,
    entity_id: Option<Uuid>,
    details: Value,
) {
    let entry = NewActivityLogEntry {
        id: Uuid::new_v4(),
        trip_id,
        user_id,
        action: action.as_str().to_string(),
        entity_type: entity_type.to_string(),
        entity_id,
        details,
    };

    if let Err(err) = diesel::insert_into(activity_log::table)
        .values(&entry)
        .execute(conn)
    {
        warn!(
            error = %err,
            action = action.as_str(),
            entity_type,
            "failed to write activity log entry"
        );
    }
}
