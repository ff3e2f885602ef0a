use rusqlite::Connection;

use super::{list_courses, list_people};
use crate::error::{EntityKind, Result};
use crate::models::{Entity, PersonKind};

/// Every stored entity of `kind`, optionally narrowed to names containing
/// `name_filter` (case-insensitive), ordered by id.
pub fn list_all(conn: &Connection, kind: EntityKind, name_filter: Option<&str>) -> Result<Vec<Entity>> {
    let entities = match kind {
        EntityKind::Student => list_people(conn, PersonKind::Student, name_filter)?
            .into_iter()
            .map(Entity::Student)
            .collect(),
        EntityKind::Instructor => list_people(conn, PersonKind::Instructor, name_filter)?
            .into_iter()
            .map(Entity::Instructor)
            .collect(),
        EntityKind::Course => list_courses(conn, name_filter)?
            .into_iter()
            .map(Entity::Course)
            .collect(),
    };
    Ok(entities)
}

/// One row of a cross-table search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
    /// Courses have no email.
    pub email: Option<String>,
}

/// Case-insensitive substring search over ids, names, and emails of every
/// table. Students come first, then instructors, then courses, each ordered
/// by id.
pub fn search(conn: &Connection, query: &str) -> Result<Vec<SearchHit>> {
    let needle = query.trim().to_lowercase();
    let mut hits = Vec::new();

    for (kind, sql) in [
        (
            EntityKind::Student,
            "SELECT id, name, email FROM students
             WHERE instr(LOWER(id), ?1) > 0 OR instr(LOWER(name), ?1) > 0
                OR instr(LOWER(email), ?1) > 0
             ORDER BY id",
        ),
        (
            EntityKind::Instructor,
            "SELECT id, name, email FROM instructors
             WHERE instr(LOWER(id), ?1) > 0 OR instr(LOWER(name), ?1) > 0
                OR instr(LOWER(email), ?1) > 0
             ORDER BY id",
        ),
        (
            EntityKind::Course,
            "SELECT id, name, NULL FROM courses
             WHERE instr(LOWER(id), ?1) > 0 OR instr(LOWER(name), ?1) > 0
             ORDER BY id",
        ),
    ] {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([&needle], |row| {
            Ok(SearchHit {
                kind,
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
            })
        })?;
        for hit in rows {
            hits.push(hit?);
        }
    }

    Ok(hits)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// Row counts per table.
    pub students: i64,
    pub instructors: i64,
    pub courses: i64,
    pub enrollments: i64,
    /// Mean roster size over courses that have at least one student; `None`
    /// when nobody is enrolled anywhere.
    pub average_roster: Option<f64>,
}

/// Row counts for every table plus the average roster size, read in one
/// pass over the store.
pub fn statistics(conn: &Connection) -> Result<Statistics> {
    let count = |table: &str| -> Result<i64> {
        let total = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(total)
    };

    let average_roster = conn.query_row(
        "SELECT AVG(roster) FROM (
             SELECT COUNT(*) AS roster FROM enrollments GROUP BY course_id
         )",
        [],
        |row| row.get(0),
    )?;

    Ok(Statistics {
        students: count("students")?,
        instructors: count("instructors")?,
        courses: count("courses")?,
        enrollments: count("enrollments")?,
        average_roster,
    })
}
