//! Demo data set.
//!
//! A small, fixed LMS graph used by the test suites and by
//! `SEED_DEMO_DATA=true`. Rows carry explicit ids and strictly increasing
//! timestamps and are inserted with INSERT OR IGNORE, so re-runs are
//! idempotent.

use sqlx::SqlitePool;
use tracing::info;

const ROLES: &[(i64, &str)] = &[
    (1, "super_admin"),
    (2, "school_admin"),
    (3, "teacher"),
    (4, "student"),
];

/// (id, name, address, city)
const SCHOOLS: &[(i64, &str, &str, &str)] = &[
    (1, "Northfield High School", "12 Elm Street", "Springfield"),
    (2, "Riverside Academy", "4 Harbour Road", "Shelbyville"),
    (3, "Lakeside School", "90 Shore Drive", "Ogdenville"),
];

/// (id, name, username, email, role id)
const USERS: &[(i64, &str, &str, &str, i64)] = &[
    (1, "Ada Admin", "admin", "admin@learnhub.test", 1),
    (2, "Tom Teacher", "teacher", "teacher@learnhub.test", 3),
    (3, "Sam Student", "sam", "sam@learnhub.test", 4),
    (4, "Kim Student", "kim", "kim@learnhub.test", 4),
    (5, "Lee Student", "lee", "lee@learnhub.test", 4),
];

/// (school id, user id, role)
const SCHOOL_USERS: &[(i64, i64, &str)] = &[
    (3, 2, "teacher"),
    (1, 3, "student"),
    (1, 5, "student"),
    (2, 4, "student"),
    (2, 5, "student"),
];

/// (id, school id, name, grade)
const CLASS_ROOMS: &[(i64, i64, &str, i64)] = &[
    (1, 1, "Class 1A", 10),
    (2, 1, "Class 1B", 10),
    (3, 2, "Class 2A", 11),
];

/// (class room id, user id)
const CLASS_ROOM_STUDENTS: &[(i64, i64)] = &[(1, 3), (1, 5), (3, 4)];

/// (id, class room id, teacher id, name, description, active)
const COURSES: &[(i64, i64, i64, &str, &str, bool)] = &[
    (1, 1, 2, "Algorithms", "Sorting, searching and complexity", true),
    (2, 1, 2, "Biology", "Cells and ecosystems", false),
    (3, 2, 2, "Algorithmic Thinking", "Problem decomposition", true),
];

/// (id, course id, title, file, order number)
const LEARNING_MATERIALS: &[(i64, i64, &str, Option<&str>, i64)] = &[
    (1, 1, "Introduction to Sorting", Some("sorting.pdf"), 1),
    (2, 1, "Binary Search", None, 2),
    (3, 3, "Breaking Problems Down", Some("decomposition.pdf"), 1),
];

/// (id, learning material id, title, order number)
const QUESTIONS: &[(i64, i64, &str, i64)] = &[
    (1, 1, "Implement bubble sort", 1),
    (2, 1, "Implement insertion sort", 2),
    (3, 3, "Split a task into steps", 1),
];

/// (id, question id, input, description)
const TEST_CASES: &[(i64, i64, &str, &str)] = &[
    (1, 1, "3 1 2", "three unsorted numbers"),
    (2, 1, "", "empty input"),
    (3, 2, "5 4 3 2 1", "reverse order"),
];

/// (id, user id, question id, score, completed)
const SCORES: &[(i64, i64, i64, i64, bool)] = &[
    (1, 3, 1, 100, true),
    (2, 3, 2, 40, false),
    (3, 5, 1, 80, true),
    (4, 4, 3, 60, true),
];

/// Timestamp for the `n`th row of a table, increasing with `n`
fn stamp(n: i64) -> String {
    format!("2024-01-{:02} 08:00:00", n.clamp(1, 28))
}

/// Insert the demo data set inside a single transaction.
pub async fn seed_demo_data(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for &(id, name) in ROLES {
        sqlx::query("INSERT OR IGNORE INTO roles (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(stamp(id))
            .bind(stamp(id))
            .execute(&mut *tx)
            .await?;
    }

    for &(id, name, address, city) in SCHOOLS {
        sqlx::query(
            "INSERT OR IGNORE INTO schools (id, name, address, city, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(address)
        .bind(city)
        .bind(stamp(id))
        .bind(stamp(id))
        .execute(&mut *tx)
        .await?;
    }

    for &(id, name, username, email, role_id) in USERS {
        sqlx::query(
            "INSERT OR IGNORE INTO users (id, name, username, email, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(username)
        .bind(email)
        .bind(stamp(id))
        .bind(stamp(id))
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO role_user (role_id, user_id) VALUES (?, ?)")
            .bind(role_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    for &(school_id, user_id, role) in SCHOOL_USERS {
        sqlx::query("INSERT OR IGNORE INTO school_user (school_id, user_id, role) VALUES (?, ?, ?)")
            .bind(school_id)
            .bind(user_id)
            .bind(role)
            .execute(&mut *tx)
            .await?;
    }

    for &(id, school_id, name, grade) in CLASS_ROOMS {
        sqlx::query(
            "INSERT OR IGNORE INTO class_rooms (id, school_id, name, grade, year, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 2024, ?, ?)",
        )
        .bind(id)
        .bind(school_id)
        .bind(name)
        .bind(grade)
        .bind(stamp(id))
        .bind(stamp(id))
        .execute(&mut *tx)
        .await?;
    }

    for &(class_room_id, user_id) in CLASS_ROOM_STUDENTS {
        sqlx::query("INSERT OR IGNORE INTO class_room_students (class_room_id, user_id) VALUES (?, ?)")
            .bind(class_room_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    for &(id, class_room_id, teacher_id, name, description, active) in COURSES {
        sqlx::query(
            "INSERT OR IGNORE INTO courses (id, class_room_id, teacher_id, name, description, active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(class_room_id)
        .bind(teacher_id)
        .bind(name)
        .bind(description)
        .bind(active)
        .bind(stamp(id))
        .bind(stamp(id))
        .execute(&mut *tx)
        .await?;
    }

    for &(id, course_id, title, file, order_number) in LEARNING_MATERIALS {
        sqlx::query(
            "INSERT OR IGNORE INTO learning_materials (id, course_id, title, file, file_extension, type, order_number, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 'document', ?, ?, ?)",
        )
        .bind(id)
        .bind(course_id)
        .bind(title)
        .bind(file)
        .bind(file.map(|_| "pdf"))
        .bind(order_number)
        .bind(stamp(id))
        .bind(stamp(id))
        .execute(&mut *tx)
        .await?;
    }

    for &(id, material_id, title, order_number) in QUESTIONS {
        sqlx::query(
            "INSERT OR IGNORE INTO learning_material_questions (id, learning_material_id, title, type, order_number, created_at, updated_at) \
             VALUES (?, ?, ?, 'live_code', ?, ?, ?)",
        )
        .bind(id)
        .bind(material_id)
        .bind(title)
        .bind(order_number)
        .bind(stamp(id))
        .bind(stamp(id))
        .execute(&mut *tx)
        .await?;
    }

    for &(id, question_id, input, description) in TEST_CASES {
        sqlx::query(
            "INSERT OR IGNORE INTO learning_material_question_test_cases (id, learning_material_question_id, input, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(question_id)
        .bind(input)
        .bind(description)
        .bind(stamp(id))
        .bind(stamp(id))
        .execute(&mut *tx)
        .await?;
    }

    for &(id, user_id, question_id, score, completed) in SCORES {
        sqlx::query(
            "INSERT OR IGNORE INTO student_scores (id, user_id, learning_material_question_id, score, completion_status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(question_id)
        .bind(score)
        .bind(completed)
        .bind(stamp(id))
        .bind(stamp(id))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!("Demo data seeded");
    Ok(())
}
