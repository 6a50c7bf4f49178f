//! SQLite-backed [`Store`].

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::debug;

use aether_core::{Agent, AgentId, AgentStatus, LogEntry, LogLevel, Task, TaskId};

use super::{StatusCounts, Store, StoreError, StoreResult};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS agents (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        role TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        description TEXT NOT NULL,
        status TEXT NOT NULL,
        result TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        agent_id TEXT NOT NULL,
        message TEXT NOT NULL,
        level TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_agents_created_at ON agents(created_at);
    CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
    CREATE INDEX IF NOT EXISTS idx_logs_agent ON logs(agent_id);
"#;

/// [`Store`] over a single SQLite connection.
///
/// Queries run on the blocking pool; the connection is serialized by a mutex.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;
        debug!(path = %path.display(), "Opened SQLite store");
        Self::with_schema(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_connection<T, F>(&self, func: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            func(&guard)
        })
        .await
        .map_err(|error| StoreError::Task(error.to_string()))?
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_agent(&self, agent: &Agent) -> StoreResult<()> {
        let agent = agent.clone();
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO agents (id, name, role, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    agent.id.as_str(),
                    agent.name,
                    agent.role.as_str(),
                    agent.status.as_str(),
                    format_timestamp(agent.created_at),
                ],
            )
            .map_err(|e| conflict_or(e, agent.id.as_str()))?;
            Ok(())
        })
        .await
    }

    async fn get_agent(&self, id: &AgentId) -> StoreResult<Option<Agent>> {
        let id = id.clone();
        self.with_connection(move |conn| select_agent(conn, &id)).await
    }

    async fn list_agents(&self) -> StoreResult<Vec<Agent>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, role, status, created_at FROM agents ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([], AgentRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(AgentRow::into_agent).collect()
        })
        .await
    }

    async fn update_agent_status(&self, id: &AgentId, status: AgentStatus) -> StoreResult<Agent> {
        let id = id.clone();
        self.with_connection(move |conn| {
            let changed = conn.execute(
                "UPDATE agents SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("agent {}", id)));
            }
            select_agent(conn, &id)?.ok_or_else(|| StoreError::NotFound(format!("agent {}", id)))
        })
        .await
    }

    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        let task = task.clone();
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, agent_id, description, status, result, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    task.id.as_str(),
                    task.agent_id.as_str(),
                    task.description,
                    task.status.as_str(),
                    task.result,
                    format_timestamp(task.created_at),
                ],
            )
            .map_err(|e| conflict_or(e, task.id.as_str()))?;
            Ok(())
        })
        .await
    }

    async fn get_task(&self, id: &TaskId) -> StoreResult<Option<Task>> {
        let id = id.clone();
        self.with_connection(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, agent_id, description, status, result, created_at FROM tasks WHERE id = ?1",
                    params![id.as_str()],
                    TaskRow::from_row,
                )
                .optional()?;
            row.map(TaskRow::into_task).transpose()
        })
        .await
    }

    async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, agent_id, description, status, result, created_at FROM tasks ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([], TaskRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(TaskRow::into_task).collect()
        })
        .await
    }

    async fn update_task(&self, task: &Task) -> StoreResult<()> {
        let task = task.clone();
        self.with_connection(move |conn| {
            let changed = conn.execute(
                "UPDATE tasks SET status = ?1, result = ?2 WHERE id = ?3",
                params![task.status.as_str(), task.result, task.id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("task {}", task.id)));
            }
            Ok(())
        })
        .await
    }

    async fn append_log(
        &self,
        agent_id: &AgentId,
        message: &str,
        level: LogLevel,
    ) -> StoreResult<LogEntry> {
        let agent_id = agent_id.clone();
        let message = message.to_string();
        self.with_connection(move |conn| {
            let created_at = Utc::now();
            conn.execute(
                "INSERT INTO logs (agent_id, message, level, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    agent_id.as_str(),
                    message,
                    level.as_str(),
                    format_timestamp(created_at),
                ],
            )?;
            Ok(LogEntry {
                id: conn.last_insert_rowid(),
                agent_id,
                message,
                level,
                created_at,
            })
        })
        .await
    }

    async fn list_logs(&self, agent_id: &AgentId) -> StoreResult<Vec<LogEntry>> {
        let agent_id = agent_id.clone();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, agent_id, message, level, created_at FROM logs WHERE agent_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map(params![agent_id.as_str()], LogRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(LogRow::into_entry).collect()
        })
        .await
    }

    async fn counts(&self) -> StoreResult<StatusCounts> {
        self.with_connection(|conn| {
            let mut counts = StatusCounts::default();

            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM agents GROUP BY status")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            for (status, count) in rows {
                counts.agents.insert(status.parse()?, count as u64);
            }

            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            for (status, count) in rows {
                counts.tasks.insert(status.parse()?, count as u64);
            }

            let logs: i64 = conn.query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))?;
            counts.logs = logs as u64;

            Ok(counts)
        })
        .await
    }
}

fn select_agent(conn: &Connection, id: &AgentId) -> StoreResult<Option<Agent>> {
    let row = conn
        .query_row(
            "SELECT id, name, role, status, created_at FROM agents WHERE id = ?1",
            params![id.as_str()],
            AgentRow::from_row,
        )
        .optional()?;
    row.map(AgentRow::into_agent).transpose()
}

fn conflict_or(error: rusqlite::Error, id: &str) -> StoreError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(id.to_string())
        }
        _ => StoreError::Sqlite(error),
    }
}

// Fixed-width UTC timestamps sort lexicographically in chronological order.
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

struct AgentRow {
    id: String,
    name: String,
    role: String,
    status: String,
    created_at: String,
}

impl AgentRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            role: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_agent(self) -> StoreResult<Agent> {
        Ok(Agent {
            id: AgentId::new(self.id),
            name: self.name,
            role: self.role.parse()?,
            status: self.status.parse()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

struct TaskRow {
    id: String,
    agent_id: String,
    description: String,
    status: String,
    result: Option<String>,
    created_at: String,
}

impl TaskRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            agent_id: row.get(1)?,
            description: row.get(2)?,
            status: row.get(3)?,
            result: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_task(self) -> StoreResult<Task> {
        Ok(Task {
            id: TaskId::new(self.id),
            agent_id: AgentId::new(self.agent_id),
            description: self.description,
            status: self.status.parse()?,
            result: self.result,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

struct LogRow {
    id: i64,
    agent_id: String,
    message: String,
    level: String,
    created_at: String,
}

impl LogRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            agent_id: row.get(1)?,
            message: row.get(2)?,
            level: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_entry(self) -> StoreResult<LogEntry> {
        Ok(LogEntry {
            id: self.id,
            agent_id: AgentId::new(self.agent_id),
            message: self.message,
            level: self.level.parse()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
