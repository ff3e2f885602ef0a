use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{ensure_exists, map_constraint, table};
use crate::error::{EntityKind, RegistrarError, Result};
use crate::models::{Person, PersonKind, PersonUpdate};
use crate::validation::normalize_id;

/// Insert a student together with an enrollment row for every course it
/// carries.
pub fn add_student(conn: &mut Connection, student: &Person) -> Result<()> {
    add_person(conn, PersonKind::Student, student)
}

/// Insert an instructor and point each of its courses at it.
pub fn add_instructor(conn: &mut Connection, instructor: &Person) -> Result<()> {
    add_person(conn, PersonKind::Instructor, instructor)
}

/// Fields and link ids are re-validated first, so a hand-built `Person` is
/// rejected with `Validation` rather than tripping a table constraint.
fn add_person(conn: &mut Connection, kind: PersonKind, person: &Person) -> Result<()> {
    if person.kind != kind {
        return Err(RegistrarError::validation(
            "kind",
            format!("{} is not a {}", person.id, kind.entity_kind()),
        ));
    }
    let person = person.checked()?;
    let entity = kind.entity_kind();

    let tx = conn.transaction()?;
    for course_id in &person.course_ids {
        ensure_exists(&tx, EntityKind::Course, course_id)?;
    }

    tx.execute(
        &format!(
            "INSERT INTO {} (id, name, age, email) VALUES (?1, ?2, ?3, ?4)",
            table(entity)
        ),
        params![person.id, person.name, person.age, person.email],
    )
    .map_err(|err| map_constraint(err, entity, &person.id))?;

    for course_id in &person.course_ids {
        match kind {
            PersonKind::Student => tx.execute(
                "INSERT OR IGNORE INTO enrollments (student_id, course_id) VALUES (?1, ?2)",
                params![person.id, course_id],
            )?,
            PersonKind::Instructor => tx.execute(
                "UPDATE courses SET instructor_id = ?1 WHERE id = ?2",
                params![person.id, course_id],
            )?,
        };
    }
    tx.commit()?;

    debug!("inserted {entity} {}", person.id);
    Ok(())
}

/// Load one student with the courses it is enrolled in.
pub fn get_student(conn: &Connection, id: &str) -> Result<Person> {
    get_person(conn, PersonKind::Student, id)
}

/// Load one instructor with the courses it teaches.
pub fn get_instructor(conn: &Connection, id: &str) -> Result<Person> {
    get_person(conn, PersonKind::Instructor, id)
}

fn get_person(conn: &Connection, kind: PersonKind, id: &str) -> Result<Person> {
    let id = normalize_id(id);
    let entity = kind.entity_kind();
    let mut person = conn
        .query_row(
            &format!("SELECT id, name, age, email FROM {} WHERE id = ?1", table(entity)),
            [&id],
            |row| row_to_person(row, kind),
        )
        .optional()?
        .ok_or_else(|| RegistrarError::not_found(entity, &id))?;

    let sql = match kind {
        PersonKind::Student => {
            "SELECT course_id FROM enrollments WHERE student_id = ?1 ORDER BY course_id"
        }
        PersonKind::Instructor => "SELECT id FROM courses WHERE instructor_id = ?1 ORDER BY id",
    };
    let mut stmt = conn.prepare(sql)?;
    person.course_ids = stmt
        .query_map([&id], |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;

    Ok(person)
}

/// Every person of `kind` whose name contains `name_filter`
/// (case-insensitive), ordered by id.
pub fn list_people(conn: &Connection, kind: PersonKind, name_filter: Option<&str>) -> Result<Vec<Person>> {
    let entity = kind.entity_kind();
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, age, email FROM {}
         WHERE ?1 IS NULL OR instr(LOWER(name), LOWER(?1)) > 0
         ORDER BY id",
        table(entity)
    ))?;
    let mut people = stmt
        .query_map([name_filter], |row| row_to_person(row, kind))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let links_sql = match kind {
        PersonKind::Student => "SELECT student_id, course_id FROM enrollments",
        PersonKind::Instructor => {
            "SELECT instructor_id, id FROM courses WHERE instructor_id IS NOT NULL"
        }
    };
    let mut links: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut stmt = conn.prepare(links_sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let person_id: String = row.get(0)?;
        let course_id: String = row.get(1)?;
        links.entry(person_id).or_default().insert(course_id);
    }

    for person in &mut people {
        if let Some(course_ids) = links.remove(&person.id) {
            person.course_ids = course_ids;
        }
    }
    Ok(people)
}

/// Partial update of a student's fields; returns the stored result.
pub fn update_student(conn: &mut Connection, id: &str, update: &PersonUpdate) -> Result<Person> {
    update_person(conn, PersonKind::Student, id, update)
}

pub fn update_instructor(conn: &mut Connection, id: &str, update: &PersonUpdate) -> Result<Person> {
    update_person(conn, PersonKind::Instructor, id, update)
}

/// Apply the fields present in `update`. Validation runs before the
/// transaction opens, so a rejected update never touches the file.
fn update_person(
    conn: &mut Connection,
    kind: PersonKind,
    id: &str,
    update: &PersonUpdate,
) -> Result<Person> {
    let changes = update.normalized()?;
    let id = normalize_id(id);
    let entity = kind.entity_kind();
    let table = table(entity);

    let tx = conn.transaction()?;
    ensure_exists(&tx, entity, &id)?;
    if let Some(name) = &changes.name {
        tx.execute(
            &format!("UPDATE {table} SET name = ?1 WHERE id = ?2"),
            params![name, id],
        )?;
    }
    if let Some(age) = changes.age {
        tx.execute(
            &format!("UPDATE {table} SET age = ?1 WHERE id = ?2"),
            params![age, id],
        )?;
    }
    if let Some(email) = &changes.email {
        tx.execute(
            &format!("UPDATE {table} SET email = ?1 WHERE id = ?2"),
            params![email, id],
        )?;
    }
    tx.commit()?;

    debug!("updated {entity} {id}");
    get_person(conn, kind, &id)
}

/// Remove a student along with every enrollment row that references it.
pub fn delete_student(conn: &mut Connection, id: &str) -> Result<()> {
    delete_person(conn, PersonKind::Student, id)
}

/// Remove an instructor; its courses remain with no instructor.
pub fn delete_instructor(conn: &mut Connection, id: &str) -> Result<()> {
    delete_person(conn, PersonKind::Instructor, id)
}

fn delete_person(conn: &mut Connection, kind: PersonKind, id: &str) -> Result<()> {
    let id = normalize_id(id);
    let entity = kind.entity_kind();

    let tx = conn.transaction()?;
    match kind {
        PersonKind::Student => {
            tx.execute("DELETE FROM enrollments WHERE student_id = ?1", [&id])?;
        }
        PersonKind::Instructor => {
            tx.execute(
                "UPDATE courses SET instructor_id = NULL WHERE instructor_id = ?1",
                [&id],
            )?;
        }
    }
    let deleted = tx.execute(&format!("DELETE FROM {} WHERE id = ?1", table(entity)), [&id])?;
    if deleted == 0 {
        // Dropping `tx` rolls back the link cleanup above.
        return Err(RegistrarError::not_found(entity, &id));
    }
    tx.commit()?;

    debug!("deleted {entity} {id}");
    Ok(())
}

fn row_to_person(row: &Row, kind: PersonKind) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        email: row.get(3)?,
        kind,
        course_ids: BTreeSet::new(),
    })
}
