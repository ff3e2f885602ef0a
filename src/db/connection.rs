use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use rusqlite::{Connection, OpenFlags};

use super::{load_registry, replace_with_registry};
use crate::error::{RegistrarError, Result};

/// Open (or create) the SQLite file at `path`, enable foreign keys, and make
/// sure every table exists. The returned connection is the store handle the
/// rest of this module expects.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    configure(&conn)?;
    init_schema(&conn)?;
    info!("opened registrar store at {}", path.display());
    Ok(conn)
}

/// Throwaway store for tests and dry runs.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    Ok(())
}

/// Create the four tables if they are missing. Safe to call on every start.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL CHECK (age > 0),
            email TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS instructors (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL CHECK (age > 0),
            email TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            instructor_id TEXT,
            FOREIGN KEY(instructor_id) REFERENCES instructors(id) ON DELETE SET NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments (
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            PRIMARY KEY (student_id, course_id),
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE
        )",
        [],
    )?;

    Ok(())
}

/// Copy the live database to `dest` with `VACUUM INTO`. Destinations without a
/// `.sqlite` or `.db` extension get `.sqlite` appended. The copy is written to
/// a sibling `.tmp` file and renamed over `dest`, so an existing backup is
/// replaced only once the new one is complete. Returns the path that was
/// written.
pub fn backup(conn: &Connection, dest: &Path) -> Result<PathBuf> {
    let has_db_extension = dest
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sqlite") || ext.eq_ignore_ascii_case("db"));
    let dest = if has_db_extension {
        dest.to_path_buf()
    } else {
        dest.with_extension("sqlite")
    };

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = dest.clone().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    // VACUUM INTO refuses to overwrite, so clear a leftover from a failed run.
    if tmp.exists() {
        fs::remove_file(&tmp)?;
    }
    conn.execute("VACUUM INTO ?1", [tmp.to_string_lossy()])?;
    fs::rename(&tmp, &dest)?;

    info!("backed up registrar store to {}", dest.display());
    Ok(dest)
}

/// Replace the contents of the store with the tables of the backup at `src`.
///
/// The backup is opened read-only and loaded through [`load_registry`], so a
/// file with missing tables, invalid fields, or one-sided links is rejected
/// before anything is written. The swap itself is one transaction.
pub fn restore(conn: &mut Connection, src: &Path) -> Result<()> {
    if !src.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("backup {} does not exist", src.display()),
        )
        .into());
    }

    let source = Connection::open_with_flags(src, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let tables: i64 = source.query_row(
        "SELECT COUNT(*) FROM sqlite_master
         WHERE type = 'table' AND name IN ('students', 'instructors', 'courses', 'enrollments')",
        [],
        |row| row.get(0),
    )?;
    if tables != 4 {
        return Err(RegistrarError::Schema(format!(
            "{} is not a registrar database",
            src.display()
        )));
    }

    let registry = load_registry(&source)?;
    replace_with_registry(conn, &registry)?;
    info!("restored registrar store from {}", src.display());
    Ok(())
}
