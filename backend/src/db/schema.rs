//! SQLite schema for the LMS tables
//!
//! Statements are idempotent (`IF NOT EXISTS`), so sync runs on every start.
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS` text.

use sqlx::SqlitePool;
use tracing::{debug, info};

/// `(table, CREATE statement)` in dependency order
const TABLES: &[(&str, &str)] = &[
    (
        "schools",
        r#"CREATE TABLE IF NOT EXISTS schools (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            address TEXT NOT NULL DEFAULT '',
            city TEXT,
            active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    ),
    (
        "users",
        r#"CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL DEFAULT '',
            profile_image TEXT,
            email_verified_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    ),
    (
        "roles",
        r#"CREATE TABLE IF NOT EXISTS roles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            guard_name TEXT NOT NULL DEFAULT 'web',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    ),
    (
        "role_user",
        r#"CREATE TABLE IF NOT EXISTS role_user (
            role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (role_id, user_id)
        )"#,
    ),
    (
        "school_user",
        r#"CREATE TABLE IF NOT EXISTS school_user (
            school_id INTEGER NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            PRIMARY KEY (school_id, user_id)
        )"#,
    ),
    (
        "class_rooms",
        r#"CREATE TABLE IF NOT EXISTS class_rooms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            school_id INTEGER NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            grade INTEGER,
            year INTEGER,
            active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    ),
    (
        "class_room_students",
        r#"CREATE TABLE IF NOT EXISTS class_room_students (
            class_room_id INTEGER NOT NULL REFERENCES class_rooms(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (class_room_id, user_id)
        )"#,
    ),
    (
        "courses",
        r#"CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            class_room_id INTEGER NOT NULL REFERENCES class_rooms(id) ON DELETE CASCADE,
            teacher_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            name TEXT NOT NULL,
            description TEXT,
            active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    ),
    (
        "learning_materials",
        r#"CREATE TABLE IF NOT EXISTS learning_materials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT,
            file TEXT,
            file_extension TEXT,
            type TEXT NOT NULL,
            order_number INTEGER NOT NULL DEFAULT 1,
            active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    ),
    (
        "learning_material_questions",
        r#"CREATE TABLE IF NOT EXISTS learning_material_questions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            learning_material_id INTEGER NOT NULL REFERENCES learning_materials(id) ON DELETE CASCADE,
            title TEXT,
            description TEXT,
            file TEXT,
            file_extension TEXT,
            type TEXT NOT NULL,
            order_number INTEGER NOT NULL DEFAULT 1,
            clue TEXT,
            active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    ),
    (
        "learning_material_question_test_cases",
        r#"CREATE TABLE IF NOT EXISTS learning_material_question_test_cases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            learning_material_question_id INTEGER NOT NULL REFERENCES learning_material_questions(id) ON DELETE CASCADE,
            input TEXT,
            expected_output_file TEXT,
            description TEXT,
            hidden BOOLEAN NOT NULL DEFAULT 1,
            active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    ),
    (
        "student_scores",
        r#"CREATE TABLE IF NOT EXISTS student_scores (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            learning_material_question_id INTEGER NOT NULL REFERENCES learning_material_questions(id) ON DELETE CASCADE,
            coding_time INTEGER NOT NULL DEFAULT 0,
            score INTEGER NOT NULL DEFAULT 0,
            completion_status BOOLEAN NOT NULL DEFAULT 0,
            trial_status BOOLEAN NOT NULL DEFAULT 0,
            compile_count INTEGER NOT NULL DEFAULT 0,
            test_case_complete_count INTEGER NOT NULL DEFAULT 0,
            test_case_total_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (user_id, learning_material_question_id)
        )"#,
    ),
];

/// Check if a table exists in the database
async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool, sqlx::Error> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?;

    Ok(result.is_some())
}

/// Create every missing table. Returns the names of tables created.
pub async fn sync_schema(pool: &SqlitePool) -> Result<Vec<&'static str>, sqlx::Error> {
    let mut created = Vec::new();
    for (table, sql) in TABLES {
        if table_exists(pool, table).await? {
            continue;
        }
        debug!(table = table, "Creating table");
        sqlx::query(sql).execute(pool).await?;
        created.push(*table);
    }

    if !created.is_empty() {
        info!(tables = ?created, "Schema sync created tables");
    }
    Ok(created)
}
