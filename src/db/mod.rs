//! SQLite repository split across logical submodules. Every function takes the
//! connection explicitly; writes open their own transaction so a failure part
//! way through leaves the tables exactly as they were.

mod connection;
mod courses;
mod enrollments;
mod people;
mod queries;
mod snapshot;


use rusqlite::{ffi, Connection, Error as SqlError, OptionalExtension};

use crate::error::{EntityKind, RegistrarError, Result};

pub use connection::{backup, init_schema, open_in_memory, open_store, restore};
pub use courses::{add_course, delete_course, get_course, list_courses, update_course};
pub use enrollments::{assign_instructor, list_enrollments, register, unregister, Enrollment};
pub use people::{
    add_instructor, add_student, delete_instructor, delete_student, get_instructor, get_student,
    list_people, update_instructor, update_student,
};
pub use queries::{list_all, search, statistics, SearchHit, Statistics};
pub use snapshot::{load_registry, replace_with_registry};

fn table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Student => "students",
        EntityKind::Instructor => "instructors",
        EntityKind::Course => "courses",
    }
}

fn exists(conn: &Connection, kind: EntityKind, id: &str) -> Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", table(kind));
    let found = conn
        .query_row(&sql, [id], |_| Ok(()))
        .optional()?
        .is_some();
    Ok(found)
}

/// Fail with `NotFound` unless `id` is present in the table for `kind`.
fn ensure_exists(conn: &Connection, kind: EntityKind, id: &str) -> Result<()> {
    if exists(conn, kind, id)? {
        Ok(())
    } else {
        Err(RegistrarError::not_found(kind, id))
    }
}

/// Turn a key collision into `DuplicateKey`; everything else, including CHECK
/// and NOT NULL failures, stays a storage error.
fn map_constraint(err: SqlError, kind: EntityKind, id: &str) -> RegistrarError {
    let primary_key = matches!(
        &err,
        SqlError::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    );
    if primary_key {
        RegistrarError::duplicate(kind, id)
    } else {
        err.into()
    }
}
