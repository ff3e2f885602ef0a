use log::debug;
use rusqlite::{params, Connection};

use super::ensure_exists;
use crate::error::{EntityKind, Result};
use crate::validation::normalize_id;

/// Enroll a student in a course. `INSERT OR IGNORE` makes repeats a no-op.
pub fn register(conn: &mut Connection, student_id: &str, course_id: &str) -> Result<()> {
    let student_id = normalize_id(student_id);
    let course_id = normalize_id(course_id);

    let tx = conn.transaction()?;
    ensure_exists(&tx, EntityKind::Student, &student_id)?;
    ensure_exists(&tx, EntityKind::Course, &course_id)?;
    tx.execute(
        "INSERT OR IGNORE INTO enrollments (student_id, course_id) VALUES (?1, ?2)",
        params![student_id, course_id],
    )?;
    tx.commit()?;

    debug!("registered {student_id} in {course_id}");
    Ok(())
}

/// Remove an enrollment. Both ids must exist, but a missing enrollment row is
/// not an error.
pub fn unregister(conn: &mut Connection, student_id: &str, course_id: &str) -> Result<()> {
    let student_id = normalize_id(student_id);
    let course_id = normalize_id(course_id);

    let tx = conn.transaction()?;
    ensure_exists(&tx, EntityKind::Student, &student_id)?;
    ensure_exists(&tx, EntityKind::Course, &course_id)?;
    tx.execute(
        "DELETE FROM enrollments WHERE student_id = ?1 AND course_id = ?2",
        params![student_id, course_id],
    )?;
    tx.commit()?;

    debug!("unregistered {student_id} from {course_id}");
    Ok(())
}

/// Point a course at an instructor, or clear it with `None`. The instructor's
/// course list is derived from this column, so one write updates both sides.
pub fn assign_instructor(
    conn: &mut Connection,
    course_id: &str,
    instructor_id: Option<&str>,
) -> Result<()> {
    let course_id = normalize_id(course_id);
    let instructor_id = instructor_id.map(normalize_id);

    let tx = conn.transaction()?;
    ensure_exists(&tx, EntityKind::Course, &course_id)?;
    if let Some(instructor_id) = &instructor_id {
        ensure_exists(&tx, EntityKind::Instructor, instructor_id)?;
    }
    tx.execute(
        "UPDATE courses SET instructor_id = ?1 WHERE id = ?2",
        params![instructor_id, course_id],
    )?;
    tx.commit()?;

    debug!("course {course_id} instructor set to {instructor_id:?}");
    Ok(())
}

/// One row of the enrollment table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub student_id: String,
    pub course_id: String,
}

/// Enrollment rows, optionally narrowed to one student and/or one course,
/// ordered by student then course. Unknown ids simply match nothing.
pub fn list_enrollments(
    conn: &Connection,
    student_id: Option<&str>,
    course_id: Option<&str>,
) -> Result<Vec<Enrollment>> {
    let student_id = student_id.map(normalize_id);
    let course_id = course_id.map(normalize_id);

    let mut stmt = conn.prepare(
        "SELECT student_id, course_id FROM enrollments
         WHERE (?1 IS NULL OR student_id = ?1) AND (?2 IS NULL OR course_id = ?2)
         ORDER BY student_id, course_id",
    )?;
    let enrollments = stmt
        .query_map(params![student_id, course_id], |row| {
            Ok(Enrollment {
                student_id: row.get(0)?,
                course_id: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(enrollments)
}
