use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::SessionRepository;
use crate::domain::session::{SessionData, StoredSession};
use crate::schema::sessions;

use super::models::{NewSessionRow, SessionRow};

/// Session storage in the `sessions` table, one JSONB document per visitor.
pub struct DieselSessionRepository {
    pool: DbPool,
}

impl DieselSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Inserts or overwrites the session row on an existing connection, so
    /// callers can write it inside their own transaction.
    pub(crate) fn upsert(conn: &mut PgConnection, session: &StoredSession) -> QueryResult<usize> {
        let row = NewSessionRow {
            id: session.id,
            data: Value::Object(session.data.values().clone()),
            expires_at: session.expires_at,
        };
        diesel::insert_into(sessions::table)
            .values(&row)
            .on_conflict(sessions::id)
            .do_update()
            .set(&row)
            .execute(conn)
    }
}

impl SessionRepository for DieselSessionRepository {
    fn load(&self, session_id: Uuid) -> Result<Option<SessionData>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = sessions::table
            .find(session_id)
            .filter(sessions::expires_at.gt(Utc::now()))
            .select(SessionRow::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(row.map(|row| match row.data {
            Value::Object(values) => SessionData::from_values(values),
            other => {
                log::warn!(
                    "Session {} holds non-object data ({}); starting fresh",
                    session_id,
                    other
                );
                SessionData::default()
            }
        }))
    }

    fn save(
        &self,
        session_id: Uuid,
        data: &SessionData,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        Self::upsert(
            &mut conn,
            &StoredSession {
                id: session_id,
                data: data.clone(),
                expires_at,
            },
        )?;
        Ok(())
    }

    fn delete_expired(&self) -> Result<usize, DomainError> {
        let mut conn = self.pool.get()?;

        let deleted = diesel::delete(sessions::table.filter(sessions::expires_at.le(Utc::now())))
            .execute(&mut conn)?;
        Ok(deleted)
    }
}
