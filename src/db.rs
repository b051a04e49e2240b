use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "rollcall.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            start_time TEXT NOT NULL DEFAULT '08:00'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            sort_order INTEGER NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_sort ON students(class_id, sort_order)",
        [],
    )?;

    // Workspaces created before badge scanning have no scan_code column.
    ensure_students_scan_code(&conn)?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_students_class_scan_code
         ON students(class_id, scan_code) WHERE scan_code IS NOT NULL",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            class_id TEXT NOT NULL,
            session_date TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL,
            attributes TEXT NOT NULL DEFAULT '{}',
            violations TEXT NOT NULL DEFAULT '[]',
            teachers_note TEXT NOT NULL DEFAULT '',
            updated_at TEXT,
            PRIMARY KEY(class_id, session_date, student_id),
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_student ON attendance_records(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS content_items(
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            body TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(collection, id)
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_students_scan_code(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "scan_code")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN scan_code TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_db_is_idempotent_and_migrates_scan_code() {
        let dir = std::env::temp_dir().join(format!("rollcall-db-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        {
            let conn = Connection::open(dir.join(DB_FILE_NAME)).expect("open raw");
            conn.execute_batch(
                "CREATE TABLE classes(id TEXT PRIMARY KEY, name TEXT NOT NULL, start_time TEXT NOT NULL DEFAULT '08:00');
                 CREATE TABLE students(id TEXT PRIMARY KEY, class_id TEXT NOT NULL, last_name TEXT NOT NULL,
                   first_name TEXT NOT NULL, active INTEGER NOT NULL DEFAULT 1, sort_order INTEGER NOT NULL, updated_at TEXT);",
            )
            .expect("seed old schema");
        }
        let conn = open_db(&dir).expect("open migrated");
        assert!(table_has_column(&conn, "students", "scan_code").expect("pragma"));
        drop(conn);
        open_db(&dir).expect("reopen");
    }
}
