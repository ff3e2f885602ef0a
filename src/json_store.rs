//! JSON backup format for the whole registrar graph. Records are flat and link
//! to each other by id only; both directions of every link are written out and
//! must agree when the document is read back.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{RegistrarError, Result};
use crate::models::{Course, Person, PersonKind};
use crate::registry::Registry;
use crate::validation::normalize_id;

/// Version written into every export. Documents from a newer writer are
/// rejected instead of being half-understood.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Ordered by id, as exported.
    pub students: Vec<PersonRecord>,
    pub instructors: Vec<PersonRecord>,
    /// Courses own the links; people's `course_ids` must agree with them.
    pub courses: Vec<CourseRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: String,
    pub name: String,
    /// Signed so an out-of-range value reaches validation instead of failing to parse.
    pub age: i64,
    pub email: String,
    #[serde(default)]
    pub course_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub instructor_id: Option<String>,
    #[serde(default)]
    pub student_ids: Vec<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl From<&Person> for PersonRecord {
    fn from(person: &Person) -> Self {
        PersonRecord {
            id: person.id.clone(),
            name: person.name.clone(),
            age: i64::from(person.age),
            email: person.email.clone(),
            course_ids: person.course_ids.iter().cloned().collect(),
        }
    }
}

impl From<&Course> for CourseRecord {
    fn from(course: &Course) -> Self {
        CourseRecord {
            id: course.id.clone(),
            name: course.name.clone(),
            instructor_id: course.instructor_id.clone(),
            student_ids: course.student_ids.iter().cloned().collect(),
        }
    }
}

/// Snapshot the registry. Every list is ordered by id, so exporting the same
/// graph twice yields identical documents.
pub fn export(registry: &Registry) -> Document {
    Document {
        schema_version: SCHEMA_VERSION,
        students: registry.students().map(PersonRecord::from).collect(),
        instructors: registry.instructors().map(PersonRecord::from).collect(),
        courses: registry.courses().map(CourseRecord::from).collect(),
    }
}

/// Rebuild a registry from a document: entities first (students, instructors,
/// courses), then links. Links are taken from the course records and the
/// people records are checked against the result.
pub fn import(document: &Document) -> Result<Registry> {
    if document.schema_version > SCHEMA_VERSION {
        return Err(RegistrarError::Schema(format!(
            "unsupported schema_version {} (newest known is {SCHEMA_VERSION})",
            document.schema_version
        )));
    }

    let mut registry = Registry::new();
    for record in &document.students {
        registry.add_person(Person::student(&record.id, &record.name, record.age, &record.email)?)?;
    }
    for record in &document.instructors {
        registry.add_person(Person::instructor(
            &record.id,
            &record.name,
            record.age,
            &record.email,
        )?)?;
    }
    for record in &document.courses {
        registry.add_course(Course::new(&record.id, &record.name)?)?;
    }

    for record in &document.courses {
        if let Some(instructor_id) = &record.instructor_id {
            known(&registry, PersonKind::Instructor.into(), instructor_id, &record.id)?;
            registry.assign_instructor(&record.id, instructor_id)?;
        }
        for student_id in &record.student_ids {
            known(&registry, PersonKind::Student.into(), student_id, &record.id)?;
            registry.register(student_id, &record.id)?;
        }
    }

    for (kind, records) in [
        (PersonKind::Student, &document.students),
        (PersonKind::Instructor, &document.instructors),
    ] {
        for record in records {
            let listed = record
                .course_ids
                .iter()
                .map(|course_id| -> Result<String> {
                    known(&registry, Target::Course, course_id, &record.id)?;
                    Ok(normalize_id(course_id))
                })
                .collect::<Result<BTreeSet<_>>>()?;
            let person = registry.person(kind, &record.id)?;
            if listed != person.course_ids {
                return Err(RegistrarError::CorruptData(format!(
                    "{} {} course_ids {:?} disagree with course records {:?}",
                    kind.entity_kind(),
                    person.id,
                    listed,
                    person.course_ids
                )));
            }
        }
    }

    registry.check_links()?;
    Ok(registry)
}

#[derive(Clone, Copy)]
enum Target {
    Person(PersonKind),
    Course,
}

impl From<PersonKind> for Target {
    fn from(kind: PersonKind) -> Self {
        Target::Person(kind)
    }
}

/// A reference to an id missing from the document is corrupt data rather than
/// a lookup miss.
fn known(registry: &Registry, target: Target, id: &str, referenced_by: &str) -> Result<()> {
    let found = match target {
        Target::Person(kind) => registry.person(kind, id).is_ok(),
        Target::Course => registry.course(id).is_ok(),
    };
    if found {
        return Ok(());
    }
    let label = match target {
        Target::Person(kind) => kind.entity_kind().to_string(),
        Target::Course => "course".to_string(),
    };
    Err(RegistrarError::CorruptData(format!(
        "{referenced_by} references unknown {label} {id}"
    )))
}

/// Pretty-printed JSON for `document`.
pub fn to_json_string(document: &Document) -> Result<String> {
    serde_json::to_string_pretty(document).map_err(|err| RegistrarError::Schema(err.to_string()))
}

/// Parse a document. Missing or mistyped fields surface as
/// [`RegistrarError::Schema`].
pub fn from_json_str(json: &str) -> Result<Document> {
    serde_json::from_str(json).map_err(|err| RegistrarError::Schema(err.to_string()))
}

/// Write the registry to `path`, going through `<path>.tmp` so a crash never
/// leaves a truncated export behind.
pub fn save_to_path(path: &Path, registry: &Registry) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = to_json_string(&export(registry))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    info!("exported registry to {}", path.display());
    Ok(())
}

/// Read and import the document at `path`. Nothing is returned unless the
/// whole file parses and every link resolves.
pub fn load_from_path(path: &Path) -> Result<Registry> {
    let json = fs::read_to_string(path)?;
    let registry = from_json_str(&json).and_then(|document| import(&document));
    match &registry {
        Ok(_) => info!("imported registry from {}", path.display()),
        Err(err) => warn!("rejected {}: {err}", path.display()),
    }
    registry
}
