use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{ensure_exists, map_constraint};
use crate::error::{EntityKind, RegistrarError, Result};
use crate::models::{Course, CourseUpdate};
use crate::validation::normalize_id;

/// Insert a course with its instructor reference and roster. Every referenced
/// id must already be stored; ids are normalized the same way lookups are.
pub fn add_course(conn: &mut Connection, course: &Course) -> Result<()> {
    let course = course.checked()?;
    let tx = conn.transaction()?;
    if let Some(instructor_id) = &course.instructor_id {
        ensure_exists(&tx, EntityKind::Instructor, instructor_id)?;
    }
    for student_id in &course.student_ids {
        ensure_exists(&tx, EntityKind::Student, student_id)?;
    }

    tx.execute(
        "INSERT INTO courses (id, name, instructor_id) VALUES (?1, ?2, ?3)",
        params![course.id, course.name, course.instructor_id],
    )
    .map_err(|err| map_constraint(err, EntityKind::Course, &course.id))?;

    for student_id in &course.student_ids {
        tx.execute(
            "INSERT OR IGNORE INTO enrollments (student_id, course_id) VALUES (?1, ?2)",
            params![student_id, course.id],
        )?;
    }
    tx.commit()?;

    debug!("inserted course {}", course.id);
    Ok(())
}

/// Load one course with its roster.
pub fn get_course(conn: &Connection, id: &str) -> Result<Course> {
    let id = normalize_id(id);
    let mut course = conn
        .query_row(
            "SELECT id, name, instructor_id FROM courses WHERE id = ?1",
            [&id],
            row_to_course,
        )
        .optional()?
        .ok_or_else(|| RegistrarError::not_found(EntityKind::Course, &id))?;

    let mut stmt = conn.prepare(
        "SELECT student_id FROM enrollments WHERE course_id = ?1 ORDER BY student_id",
    )?;
    course.student_ids = stmt
        .query_map([&id], |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;

    Ok(course)
}

/// Courses whose name contains `name_filter` (case-insensitive), ordered by
/// id, with rosters filled in.
pub fn list_courses(conn: &Connection, name_filter: Option<&str>) -> Result<Vec<Course>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, instructor_id FROM courses
         WHERE ?1 IS NULL OR instr(LOWER(name), LOWER(?1)) > 0
         ORDER BY id",
    )?;
    let mut courses = stmt
        .query_map([name_filter], row_to_course)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut rosters: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut stmt = conn.prepare("SELECT course_id, student_id FROM enrollments")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let course_id: String = row.get(0)?;
        let student_id: String = row.get(1)?;
        rosters.entry(course_id).or_default().insert(student_id);
    }

    for course in &mut courses {
        if let Some(student_ids) = rosters.remove(&course.id) {
            course.student_ids = student_ids;
        }
    }
    Ok(courses)
}

/// Rename a course and/or change its instructor in one transaction.
pub fn update_course(conn: &mut Connection, id: &str, update: &CourseUpdate) -> Result<Course> {
    let changes = update.normalized()?;
    let id = normalize_id(id);

    let tx = conn.transaction()?;
    ensure_exists(&tx, EntityKind::Course, &id)?;
    if let Some(Some(instructor_id)) = &changes.instructor_id {
        ensure_exists(&tx, EntityKind::Instructor, instructor_id)?;
    }
    if let Some(name) = &changes.name {
        tx.execute(
            "UPDATE courses SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
    }
    if let Some(instructor_id) = &changes.instructor_id {
        tx.execute(
            "UPDATE courses SET instructor_id = ?1 WHERE id = ?2",
            params![instructor_id, id],
        )?;
    }
    tx.commit()?;

    debug!("updated course {id}");
    get_course(conn, &id)
}

/// Remove a course and its enrollment rows. Students and the instructor stay.
pub fn delete_course(conn: &mut Connection, id: &str) -> Result<()> {
    let id = normalize_id(id);

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM enrollments WHERE course_id = ?1", [&id])?;
    let deleted = tx.execute("DELETE FROM courses WHERE id = ?1", [&id])?;
    if deleted == 0 {
        return Err(RegistrarError::not_found(EntityKind::Course, &id));
    }
    tx.commit()?;

    debug!("deleted course {id}");
    Ok(())
}

fn row_to_course(row: &Row) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        name: row.get(1)?,
        instructor_id: row.get(2)?,
        student_ids: BTreeSet::new(),
    })
}
