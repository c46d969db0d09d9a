use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Connection lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Interactions are only ever read through their person, so ownership is
/// the single rule `persons.user_id = ?`.
const INTERACTION_SELECT: &str = r#"
    SELECT i.*, p.name AS person_name
    FROM interactions i
    JOIN persons p ON p.id = i.person_id"#;

/// Thread-safe SQLite store
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store for testing
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                display_name TEXT DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS persons (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                origin TEXT,
                relationship_type TEXT NOT NULL,
                relationship_strength INTEGER NOT NULL
                    CHECK (relationship_strength BETWEEN 1 AND 5),
                occupation TEXT,
                context TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS interactions (
                id TEXT PRIMARY KEY,
                person_id TEXT NOT NULL,
                title TEXT NOT NULL,
                place_name TEXT,
                latitude REAL,
                longitude REAL,
                interaction_time TEXT,
                notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (person_id) REFERENCES persons(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_persons_user_id ON persons(user_id);
            CREATE INDEX IF NOT EXISTS idx_persons_created_at ON persons(created_at);
            CREATE INDEX IF NOT EXISTS idx_interactions_person_id ON interactions(person_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== User Operations ====================

    pub fn create_user(&self, user: &mut User) -> StoreResult<()> {
        let conn = self.conn()?;
        user.id = Uuid::new_v4().to_string();
        let now = now();
        user.created_at = now;
        user.updated_at = now;

        conn.execute(
            r#"INSERT INTO users (id, username, email, password_hash, display_name, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &user.id,
                &user.username,
                &user.email,
                &user.password_hash,
                &user.display_name,
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> StoreResult<User> {
        let conn = self.conn()?;
        conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
            .map_err(|e| not_found(e, format!("User {}", id)))
    }

    pub fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT * FROM users WHERE username = ?1",
            params![username],
            row_to_user,
        )
        .map_err(|e| not_found(e, format!("User {}", username)))
    }

    pub fn count_users(&self) -> StoreResult<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    // ==================== Person Operations ====================

    pub fn create_person(&self, person: &mut Person) -> StoreResult<()> {
        let conn = self.conn()?;
        person.id = Uuid::new_v4().to_string();
        let now = now();
        person.created_at = now;
        person.updated_at = now;

        conn.execute(
            r#"INSERT INTO persons (id, user_id, name, origin, relationship_type, relationship_strength,
                occupation, context, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                &person.id,
                &person.user_id,
                &person.name,
                &person.origin,
                &person.relationship_type,
                person.relationship_strength,
                &person.occupation,
                &person.context,
                format_datetime(&person.created_at),
                format_datetime(&person.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Fetch a person owned by `user_id`; someone else's person is `NotFound`.
    pub fn get_person(&self, user_id: &str, id: &str) -> StoreResult<Person> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT * FROM persons WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
            row_to_person,
        )
        .map_err(|e| not_found(e, format!("Person {}", id)))
    }

    /// All persons of a user, newest first
    pub fn list_persons(&self, user_id: &str) -> StoreResult<Vec<Person>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT * FROM persons WHERE user_id = ?1
               ORDER BY created_at DESC, rowid DESC"#,
        )?;
        let rows = stmt.query_map(params![user_id], row_to_person)?;

        let mut persons = Vec::new();
        for row in rows {
            persons.push(row?);
        }
        Ok(persons)
    }

    pub fn update_person(&self, person: &mut Person) -> StoreResult<()> {
        let conn = self.conn()?;
        person.updated_at = now();

        let rows = conn.execute(
            r#"UPDATE persons SET name = ?1, origin = ?2, relationship_type = ?3,
               relationship_strength = ?4, occupation = ?5, context = ?6, updated_at = ?7
               WHERE id = ?8 AND user_id = ?9"#,
            params![
                &person.name,
                &person.origin,
                &person.relationship_type,
                person.relationship_strength,
                &person.occupation,
                &person.context,
                format_datetime(&person.updated_at),
                &person.id,
                &person.user_id,
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("Person {}", person.id)));
        }
        Ok(())
    }

    /// Delete a person together with its interactions
    pub fn delete_person(&self, user_id: &str, id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM persons WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("Person {}", id)));
        }
        Ok(())
    }

    // ==================== Interaction Operations ====================

    /// Insert an interaction. The caller has already checked that the person
    /// belongs to the requesting user; the joined person summary is filled in.
    pub fn create_interaction(&self, interaction: &mut Interaction) -> StoreResult<()> {
        let conn = self.conn()?;
        interaction.id = Uuid::new_v4().to_string();
        let now = now();
        interaction.created_at = now;
        interaction.updated_at = now;
        interaction.interaction_time = interaction.interaction_time.map(|t| t.trunc_subsecs(6));

        let notes_json = interaction
            .notes
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            r#"INSERT INTO interactions (id, person_id, title, place_name, latitude, longitude,
                interaction_time, notes, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                &interaction.id,
                &interaction.person_id,
                &interaction.title,
                &interaction.place_name,
                interaction.latitude,
                interaction.longitude,
                interaction.interaction_time.as_ref().map(format_datetime),
                notes_json,
                format_datetime(&interaction.created_at),
                format_datetime(&interaction.updated_at),
            ],
        )?;

        interaction.person = person_summary(&conn, &interaction.person_id)?;
        Ok(())
    }

    pub fn get_interaction(&self, user_id: &str, id: &str) -> StoreResult<Interaction> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE i.id = ?1 AND p.user_id = ?2", INTERACTION_SELECT);
        conn.query_row(&sql, params![id, user_id], row_to_interaction)
            .map_err(|e| not_found(e, format!("Interaction {}", id)))
    }

    /// Interactions of a user, optionally narrowed to one person, most
    /// recent first by interaction time (or creation time when unset).
    pub fn list_interactions(
        &self,
        user_id: &str,
        person_id: Option<&str>,
    ) -> StoreResult<Vec<Interaction>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"{} WHERE p.user_id = ?1 AND (?2 IS NULL OR i.person_id = ?2)
               ORDER BY COALESCE(i.interaction_time, i.created_at) DESC, i.rowid DESC"#,
            INTERACTION_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, person_id], row_to_interaction)?;

        let mut interactions = Vec::new();
        for row in rows {
            interactions.push(row?);
        }
        Ok(interactions)
    }

    pub fn update_interaction(&self, interaction: &mut Interaction) -> StoreResult<()> {
        let conn = self.conn()?;
        interaction.updated_at = now();
        interaction.interaction_time = interaction.interaction_time.map(|t| t.trunc_subsecs(6));

        let notes_json = interaction
            .notes
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let rows = conn.execute(
            r#"UPDATE interactions SET person_id = ?1, title = ?2, place_name = ?3, latitude = ?4,
               longitude = ?5, interaction_time = ?6, notes = ?7, updated_at = ?8
               WHERE id = ?9"#,
            params![
                &interaction.person_id,
                &interaction.title,
                &interaction.place_name,
                interaction.latitude,
                interaction.longitude,
                interaction.interaction_time.as_ref().map(format_datetime),
                notes_json,
                format_datetime(&interaction.updated_at),
                &interaction.id,
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("Interaction {}", interaction.id)));
        }

        interaction.person = person_summary(&conn, &interaction.person_id)?;
        Ok(())
    }

    pub fn delete_interaction(&self, user_id: &str, id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            r#"DELETE FROM interactions WHERE id = ?1
               AND person_id IN (SELECT id FROM persons WHERE user_id = ?2)"#,
            params![id, user_id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("Interaction {}", id)));
        }
        Ok(())
    }
}

fn person_summary(conn: &Connection, person_id: &str) -> StoreResult<Option<PersonSummary>> {
    let summary = conn
        .query_row(
            "SELECT id, name FROM persons WHERE id = ?1",
            params![person_id],
            |row| {
                Ok(PersonSummary {
                    id: row.get("id")?,
                    name: row.get("name")?,
                })
            },
        )
        .optional()?;
    Ok(summary)
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        display_name: row.get("display_name")?,
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

fn row_to_person(row: &rusqlite::Row) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        origin: row.get("origin")?,
        relationship_type: row.get("relationship_type")?,
        relationship_strength: row.get("relationship_strength")?,
        occupation: row.get("occupation")?,
        context: row.get("context")?,
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

fn row_to_interaction(row: &rusqlite::Row) -> rusqlite::Result<Interaction> {
    let notes: Option<String> = row.get("notes")?;
    let interaction_time: Option<String> = row.get("interaction_time")?;
    let person_id: String = row.get("person_id")?;

    Ok(Interaction {
        id: row.get("id")?,
        title: row.get("title")?,
        place_name: row.get("place_name")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        interaction_time: interaction_time.map(parse_datetime),
        notes: notes.and_then(|n| serde_json::from_str(&n).ok()),
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
        person: Some(PersonSummary {
            id: person_id.clone(),
            name: row.get("person_name")?,
        }),
        person_id,
    })
}

fn not_found(e: rusqlite::Error, what: String) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(what),
        _ => StoreError::Database(e),
    }
}

/// Microsecond precision, matching what `format_datetime` writes.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
