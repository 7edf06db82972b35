use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("marksd.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            student_name TEXT NOT NULL,
            student_roll_no TEXT NOT NULL,
            class_name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_roll ON students(student_roll_no)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            subject_name TEXT NOT NULL,
            subject_code TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tests(
            id TEXT PRIMARY KEY,
            test_name TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            max_marks REAL NOT NULL,
            converted_max_marks REAL NOT NULL,
            test_date TEXT,
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tests_subject ON tests(subject_id)",
        [],
    )?;

    // One mark record per (student, test); resubmission overwrites in place.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_marks(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            test_id TEXT NOT NULL,
            marks_obtained REAL NOT NULL,
            converted_marks REAL NOT NULL,
            remarks TEXT,
            added_by TEXT,
            updated_at TEXT,
            UNIQUE(student_id, test_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(test_id) REFERENCES tests(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_marks_test ON student_marks(test_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_marks_student ON student_marks(student_id)",
        [],
    )?;

    Ok(conn)
}
