use std::collections::BTreeSet;

use log::info;
use rusqlite::{params, Connection};

use super::{list_courses, list_people};
use crate::error::Result;
use crate::models::{Course, PersonKind};
use crate::registry::Registry;

/// Hydrate the whole store into an in-memory registry. Courses are added bare
/// first; people then bring their links along, which fills in rosters and
/// instructors from the people side.
pub fn load_registry(conn: &Connection) -> Result<Registry> {
    let mut registry = Registry::new();
    for course in list_courses(conn, None)? {
        registry.add_course(Course {
            instructor_id: None,
            student_ids: BTreeSet::new(),
            ..course
        })?;
    }
    for kind in [PersonKind::Student, PersonKind::Instructor] {
        for person in list_people(conn, kind, None)? {
            registry.add_person(person)?;
        }
    }
    registry.check_links()?;
    Ok(registry)
}

/// Replace every row in the store with the contents of `registry`. Runs as a
/// single transaction: either the new graph is stored in full or the old one
/// is kept.
pub fn replace_with_registry(conn: &mut Connection, registry: &Registry) -> Result<()> {
    registry.check_links()?;

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM enrollments", [])?;
    tx.execute("DELETE FROM courses", [])?;
    tx.execute("DELETE FROM instructors", [])?;
    tx.execute("DELETE FROM students", [])?;

    for (table, people) in [
        ("students", registry.students().collect::<Vec<_>>()),
        ("instructors", registry.instructors().collect::<Vec<_>>()),
    ] {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {table} (id, name, age, email) VALUES (?1, ?2, ?3, ?4)"
        ))?;
        for person in people {
            stmt.execute(params![person.id, person.name, person.age, person.email])?;
        }
    }

    {
        let mut insert_course =
            tx.prepare("INSERT INTO courses (id, name, instructor_id) VALUES (?1, ?2, ?3)")?;
        let mut insert_enrollment =
            tx.prepare("INSERT INTO enrollments (student_id, course_id) VALUES (?1, ?2)")?;
        for course in registry.courses() {
            insert_course.execute(params![course.id, course.name, course.instructor_id])?;
            for student_id in &course.student_ids {
                insert_enrollment.execute(params![student_id, course.id])?;
            }
        }
    }
    tx.commit()?;

    info!(
        "stored registry: {} students, {} instructors, {} courses",
        registry.students().count(),
        registry.instructors().count(),
        registry.courses().count()
    );
    Ok(())
}
