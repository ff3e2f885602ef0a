//! Domain models that mirror the SQLite schema and the JSON export format.
//! People share one struct tagged with their kind; links between people and
//! courses are stored as id sets so the graph never holds mutual references.
//! The registry and the repository are responsible for keeping both sides of
//! every link in agreement.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{EntityKind, RegistrarError, Result};
use crate::validation::{
    normalize_course_name, normalize_email, normalize_id, normalize_name, validate_age,
    validate_course_name, validate_email, validate_id, validate_name,
};

/// Distinguishes the two roles a [`Person`] can have. Each role lives in its own
/// table and its own registry map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonKind {
    Student,
    Instructor,
}

impl PersonKind {
    pub fn entity_kind(self) -> EntityKind {
        match self {
            PersonKind::Student => EntityKind::Student,
            PersonKind::Instructor => EntityKind::Instructor,
        }
    }
}

#[derive(Debug, Clone)]
/// A student or an instructor. Both carry the same attribute set, so storage
/// and serialization treat them uniformly and only `kind` tells them apart.
pub struct Person {
    /// Normalized (trimmed, uppercased) identifier, unique within `kind`.
    pub id: String,
    /// Title-cased display name.
    pub name: String,
    /// Always positive.
    pub age: u32,
    /// Lowercased email address.
    pub email: String,
    pub kind: PersonKind,
    /// Enrolled courses for a student, assigned courses for an instructor.
    /// A `BTreeSet` keeps exports and listings deterministic.
    pub course_ids: BTreeSet<String>,
}

impl Person {
    /// Validate and normalize every field up front. Nothing is created when any
    /// field is rejected.
    pub fn new(kind: PersonKind, id: &str, name: &str, age: i64, email: &str) -> Result<Self> {
        let id = checked_id(id)?;
        let name = checked_person_name(name)?;
        let age = checked_age(age)?;
        let email = checked_email(email)?;
        Ok(Person {
            id,
            name,
            age,
            email,
            kind,
            course_ids: BTreeSet::new(),
        })
    }

    /// Shorthand for [`Person::new`] with [`PersonKind::Student`].
    pub fn student(id: &str, name: &str, age: i64, email: &str) -> Result<Self> {
        Self::new(PersonKind::Student, id, name, age, email)
    }

    /// Shorthand for [`Person::new`] with [`PersonKind::Instructor`].
    pub fn instructor(id: &str, name: &str, age: i64, email: &str) -> Result<Self> {
        Self::new(PersonKind::Instructor, id, name, age, email)
    }

    pub fn has_course(&self, course_id: &str) -> bool {
        self.course_ids.contains(course_id)
    }

    /// Re-run field validation on a person whose fields may have been set by
    /// hand, and normalize the course ids it carries. Storage layers call this
    /// before writing so a bad value surfaces as `Validation`.
    pub fn checked(&self) -> Result<Person> {
        let mut person = Person::new(
            self.kind,
            &self.id,
            &self.name,
            i64::from(self.age),
            &self.email,
        )?;
        person.course_ids = self.course_ids.iter().map(|id| normalize_id(id)).collect();
        Ok(person)
    }
}

impl PartialEq for Person {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

impl Eq for Person {}

impl Hash for Person {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

#[derive(Debug, Clone)]
/// A course offering with an optional instructor and a roster of students.
pub struct Course {
    pub id: String,
    pub name: String,
    /// At most one instructor teaches a course.
    pub instructor_id: Option<String>,
    /// The roster, ordered by student id.
    pub student_ids: BTreeSet<String>,
}

impl Course {
    /// Validate and normalize the id and name. The course starts with no
    /// instructor and an empty roster.
    pub fn new(id: &str, name: &str) -> Result<Self> {
        Ok(Course {
            id: checked_id(id)?,
            name: checked_course_name(name)?,
            instructor_id: None,
            student_ids: BTreeSet::new(),
        })
    }

    pub fn has_student(&self, student_id: &str) -> bool {
        self.student_ids.contains(student_id)
    }

    /// Same as [`Person::checked`]: validate the id and name again and
    /// normalize the instructor and roster ids.
    pub fn checked(&self) -> Result<Course> {
        let mut course = Course::new(&self.id, &self.name)?;
        course.instructor_id = self.instructor_id.as_deref().map(normalize_id);
        course.student_ids = self.student_ids.iter().map(|id| normalize_id(id)).collect();
        Ok(course)
    }
}

impl PartialEq for Course {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Course {}

impl Hash for Course {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.name)
    }
}

/// Any stored record, as returned by `db::list_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Student(Person),
    Instructor(Person),
    Course(Course),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Student(_) => EntityKind::Student,
            Entity::Instructor(_) => EntityKind::Instructor,
            Entity::Course(_) => EntityKind::Course,
        }
    }

    /// The normalized id of whichever entity this is.
    pub fn id(&self) -> &str {
        match self {
            Entity::Student(person) | Entity::Instructor(person) => &person.id,
            Entity::Course(course) => &course.id,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Student(person) | Entity::Instructor(person) => {
                write!(f, "{} {}", person.id, person)
            }
            Entity::Course(course) => write!(f, "{course}"),
        }
    }
}

/// Partial update for a person. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct PersonUpdate {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub email: Option<String>,
}

impl PersonUpdate {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.email.is_none()
    }

    /// Check every provided field and return the normalized values, so callers
    /// can reject the whole update before writing anything.
    pub(crate) fn normalized(&self) -> Result<PersonChanges> {
        Ok(PersonChanges {
            name: self.name.as_deref().map(checked_person_name).transpose()?,
            age: self.age.map(checked_age).transpose()?,
            email: self.email.as_deref().map(checked_email).transpose()?,
        })
    }
}

/// A [`PersonUpdate`] whose fields already passed validation.
#[derive(Debug, Clone)]
pub(crate) struct PersonChanges {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub email: Option<String>,
}

impl PersonChanges {
    /// Write the already-validated values onto `person`.
    pub fn apply(self, person: &mut Person) {
        if let Some(name) = self.name {
            person.name = name;
        }
        if let Some(age) = self.age {
            person.age = age;
        }
        if let Some(email) = self.email {
            person.email = email;
        }
    }
}

/// Partial update for a course. `instructor_id: Some(None)` clears the
/// instructor, `Some(Some(id))` reassigns it.
#[derive(Debug, Clone, Default)]
pub struct CourseUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the instructor; `None` leaves it alone.
    pub instructor_id: Option<Option<String>>,
}

impl CourseUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.instructor_id.is_none()
    }

    pub(crate) fn normalized(&self) -> Result<CourseChanges> {
        let instructor_id = match &self.instructor_id {
            Some(Some(id)) => Some(Some(checked_id(id)?)),
            Some(None) => Some(None),
            None => None,
        };
        Ok(CourseChanges {
            name: self.name.as_deref().map(checked_course_name).transpose()?,
            instructor_id,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CourseChanges {
    pub name: Option<String>,
    pub instructor_id: Option<Option<String>>,
}

pub(crate) fn checked_id(raw: &str) -> Result<String> {
    if validate_id(raw) {
        Ok(normalize_id(raw))
    } else {
        Err(RegistrarError::validation(
            "id",
            format!("{raw:?} must be 1-20 letters, digits, '-' or '_'"),
        ))
    }
}

fn checked_person_name(raw: &str) -> Result<String> {
    if validate_name(raw) {
        Ok(normalize_name(raw))
    } else {
        Err(RegistrarError::validation(
            "name",
            format!("{raw:?} is not a valid person name"),
        ))
    }
}

fn checked_course_name(raw: &str) -> Result<String> {
    if validate_course_name(raw) {
        Ok(normalize_course_name(raw))
    } else {
        Err(RegistrarError::validation(
            "course name",
            format!("{raw:?} is not a valid course name"),
        ))
    }
}

fn checked_age(raw: i64) -> Result<u32> {
    if validate_age(raw) {
        u32::try_from(raw).map_err(|_| RegistrarError::validation("age", "out of range"))
    } else {
        Err(RegistrarError::validation(
            "age",
            format!("{raw} must be a positive integer"),
        ))
    }
}

fn checked_email(raw: &str) -> Result<String> {
    if validate_email(raw) {
        Ok(normalize_email(raw))
    } else {
        Err(RegistrarError::validation(
            "email",
            format!("{raw:?} is not a valid email address"),
        ))
    }
}
