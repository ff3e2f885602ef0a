//! In-memory registrar graph. One id-keyed map per entity type is the single
//! source of truth; links are id sets on both ends and every mutation below
//! updates both ends before returning. Validation and existence checks run
//! before the first write, so a failed call leaves the graph untouched.

use std::collections::BTreeMap;

use log::debug;

use crate::error::{EntityKind, RegistrarError, Result};
use crate::models::{Course, CourseUpdate, Person, PersonKind, PersonUpdate};
use crate::validation::normalize_id;

#[derive(Debug, Clone, Default)]
pub struct Registry {
    students: BTreeMap<String, Person>,
    instructors: BTreeMap<String, Person>,
    courses: BTreeMap<String, Course>,
}

impl Registry {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the fields, then insert a student with no enrollments.
    /// Fails with `DuplicateKey` if the id is taken.
    pub fn create_student(&mut self, id: &str, name: &str, age: i64, email: &str) -> Result<&Person> {
        self.add_person(Person::student(id, name, age, email)?)
    }

    /// Same as [`Registry::create_student`] for instructors.
    pub fn create_instructor(
        &mut self,
        id: &str,
        name: &str,
        age: i64,
        email: &str,
    ) -> Result<&Person> {
        self.add_person(Person::instructor(id, name, age, email)?)
    }

    /// Insert a course with no instructor and an empty roster.
    pub fn create_course(&mut self, id: &str, name: &str) -> Result<&Course> {
        self.add_course(Course::new(id, name)?)
    }

    /// Insert an already-built person after re-validating its fields. Any
    /// course ids it carries are linked on the course side as well; for an instructor this takes the course over
    /// from its previous instructor.
    pub fn add_person(&mut self, person: Person) -> Result<&Person> {
        let person = person.checked()?;
        if self.people(person.kind).contains_key(&person.id) {
            return Err(RegistrarError::duplicate(person.kind.entity_kind(), &person.id));
        }
        let course_ids = person
            .course_ids
            .iter()
            .map(|course_id| self.ensure_course(course_id))
            .collect::<Result<Vec<_>>>()?;

        let id = person.id.clone();
        let kind = person.kind;
        let mut bare = person;
        bare.course_ids.clear();
        self.people_mut(kind).insert(id.clone(), bare);

        for course_id in &course_ids {
            match kind {
                PersonKind::Student => self.link_student(&id, course_id),
                PersonKind::Instructor => self.link_instructor(course_id, &id),
            }
        }
        debug!("added {} {}", kind.entity_kind(), id);
        self.people(kind)
            .get(&id)
            .ok_or_else(|| RegistrarError::not_found(kind.entity_kind(), &id))
    }

    /// Insert an already-built course, linking its instructor and roster.
    pub fn add_course(&mut self, course: Course) -> Result<&Course> {
        let course = course.checked()?;
        if self.courses.contains_key(&course.id) {
            return Err(RegistrarError::duplicate(EntityKind::Course, &course.id));
        }
        let instructor_id = course
            .instructor_id
            .as_deref()
            .map(|instructor_id| self.ensure_person(PersonKind::Instructor, instructor_id))
            .transpose()?;
        let student_ids = course
            .student_ids
            .iter()
            .map(|student_id| self.ensure_person(PersonKind::Student, student_id))
            .collect::<Result<Vec<_>>>()?;

        let id = course.id.clone();
        let mut bare = course;
        bare.instructor_id = None;
        bare.student_ids.clear();
        self.courses.insert(id.clone(), bare);

        if let Some(instructor_id) = instructor_id {
            self.link_instructor(&id, &instructor_id);
        }
        for student_id in &student_ids {
            self.link_student(student_id, &id);
        }
        debug!("added course {id}");
        self.course(&id)
    }

    /// Look up a student; `id` is normalized first.
    pub fn student(&self, id: &str) -> Result<&Person> {
        self.person(PersonKind::Student, id)
    }

    pub fn instructor(&self, id: &str) -> Result<&Person> {
        self.person(PersonKind::Instructor, id)
    }

    /// Look up a person of either kind by normalized id.
    pub fn person(&self, kind: PersonKind, id: &str) -> Result<&Person> {
        let id = normalize_id(id);
        self.people(kind)
            .get(&id)
            .ok_or_else(|| RegistrarError::not_found(kind.entity_kind(), &id))
    }

    /// Look up a course by normalized id.
    pub fn course(&self, id: &str) -> Result<&Course> {
        let id = normalize_id(id);
        self.courses
            .get(&id)
            .ok_or_else(|| RegistrarError::not_found(EntityKind::Course, &id))
    }

    /// Students ordered by id.
    pub fn students(&self) -> impl Iterator<Item = &Person> {
        self.students.values()
    }

    /// Instructors ordered by id.
    pub fn instructors(&self) -> impl Iterator<Item = &Person> {
        self.instructors.values()
    }

    /// Courses ordered by id.
    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty() && self.instructors.is_empty() && self.courses.is_empty()
    }

    /// Enroll a student. Repeating the call is a no-op.
    pub fn register(&mut self, student_id: &str, course_id: &str) -> Result<()> {
        let student_id = self.ensure_person(PersonKind::Student, student_id)?;
        let course_id = self.ensure_course(course_id)?;
        self.link_student(&student_id, &course_id);
        Ok(())
    }

    /// Drop an enrollment. Unregistering a student who is not enrolled is a
    /// no-op, but both ids must exist.
    pub fn unregister(&mut self, student_id: &str, course_id: &str) -> Result<()> {
        let student_id = self.ensure_person(PersonKind::Student, student_id)?;
        let course_id = self.ensure_course(course_id)?;
        if let Some(student) = self.students.get_mut(&student_id) {
            student.course_ids.remove(&course_id);
        }
        if let Some(course) = self.courses.get_mut(&course_id) {
            course.student_ids.remove(&student_id);
        }
        debug!("unregistered {student_id} from {course_id}");
        Ok(())
    }

    /// Give a course to an instructor, taking it away from whoever taught it
    /// before.
    pub fn assign_instructor(&mut self, course_id: &str, instructor_id: &str) -> Result<()> {
        let course_id = self.ensure_course(course_id)?;
        let instructor_id = self.ensure_person(PersonKind::Instructor, instructor_id)?;
        self.link_instructor(&course_id, &instructor_id);
        Ok(())
    }

    /// Clear the course's instructor, if any. The instructor stays in the
    /// registry with one course fewer.
    pub fn unassign_instructor(&mut self, course_id: &str) -> Result<()> {
        let course_id = self.ensure_course(course_id)?;
        self.unlink_instructor(&course_id);
        Ok(())
    }

    /// Apply a partial update. Every present field is validated before any is
    /// written.
    pub fn update_student(&mut self, id: &str, update: &PersonUpdate) -> Result<&Person> {
        self.update_person(PersonKind::Student, id, update)
    }

    pub fn update_instructor(&mut self, id: &str, update: &PersonUpdate) -> Result<&Person> {
        self.update_person(PersonKind::Instructor, id, update)
    }

    fn update_person(&mut self, kind: PersonKind, id: &str, update: &PersonUpdate) -> Result<&Person> {
        let changes = update.normalized()?;
        let id = self.ensure_person(kind, id)?;
        let person = self
            .people_mut(kind)
            .get_mut(&id)
            .ok_or_else(|| RegistrarError::not_found(kind.entity_kind(), &id))?;
        changes.apply(person);
        Ok(&*person)
    }

    /// Rename a course and/or move it to another instructor (or to none).
    /// The old and new instructors' course sets are adjusted in the same call.
    pub fn update_course(&mut self, id: &str, update: &CourseUpdate) -> Result<&Course> {
        let changes = update.normalized()?;
        let id = self.ensure_course(id)?;
        if let Some(Some(instructor_id)) = &changes.instructor_id {
            self.ensure_person(PersonKind::Instructor, instructor_id)?;
        }

        match changes.instructor_id {
            Some(Some(instructor_id)) => self.link_instructor(&id, &instructor_id),
            Some(None) => self.unlink_instructor(&id),
            None => {}
        }
        let course = self
            .courses
            .get_mut(&id)
            .ok_or_else(|| RegistrarError::not_found(EntityKind::Course, &id))?;
        if let Some(name) = changes.name {
            course.name = name;
        }
        Ok(&*course)
    }

    /// Remove a student and strike it from every roster.
    pub fn delete_student(&mut self, id: &str) -> Result<Person> {
        let id = normalize_id(id);
        let student = self
            .students
            .remove(&id)
            .ok_or_else(|| RegistrarError::not_found(EntityKind::Student, &id))?;
        for course_id in &student.course_ids {
            if let Some(course) = self.courses.get_mut(course_id) {
                course.student_ids.remove(&id);
            }
        }
        debug!("deleted student {id}");
        Ok(student)
    }

    /// Remove a course from the catalogue, from every student's schedule, and
    /// from its instructor.
    pub fn delete_course(&mut self, id: &str) -> Result<Course> {
        let id = normalize_id(id);
        let course = self
            .courses
            .remove(&id)
            .ok_or_else(|| RegistrarError::not_found(EntityKind::Course, &id))?;
        for student_id in &course.student_ids {
            if let Some(student) = self.students.get_mut(student_id) {
                student.course_ids.remove(&id);
            }
        }
        if let Some(instructor) = course
            .instructor_id
            .as_ref()
            .and_then(|instructor_id| self.instructors.get_mut(instructor_id))
        {
            instructor.course_ids.remove(&id);
        }
        debug!("deleted course {id}");
        Ok(course)
    }

    /// Remove an instructor. Their courses stay, without an instructor.
    pub fn delete_instructor(&mut self, id: &str) -> Result<Person> {
        let id = normalize_id(id);
        let instructor = self
            .instructors
            .remove(&id)
            .ok_or_else(|| RegistrarError::not_found(EntityKind::Instructor, &id))?;
        for course_id in &instructor.course_ids {
            if let Some(course) = self.courses.get_mut(course_id) {
                course.instructor_id = None;
            }
        }
        debug!("deleted instructor {id}");
        Ok(instructor)
    }

    /// Walk the whole graph and confirm that every link is present on both ends
    /// and points at a known entity.
    pub fn check_links(&self) -> Result<()> {
        for student in self.students.values() {
            for course_id in &student.course_ids {
                let linked = self
                    .courses
                    .get(course_id)
                    .is_some_and(|course| course.student_ids.contains(&student.id));
                if !linked {
                    return Err(RegistrarError::CorruptData(format!(
                        "student {} lists course {course_id} but the roster disagrees",
                        student.id
                    )));
                }
            }
        }
        for instructor in self.instructors.values() {
            for course_id in &instructor.course_ids {
                let linked = self
                    .courses
                    .get(course_id)
                    .is_some_and(|course| course.instructor_id.as_ref() == Some(&instructor.id));
                if !linked {
                    return Err(RegistrarError::CorruptData(format!(
                        "instructor {} lists course {course_id} but the course disagrees",
                        instructor.id
                    )));
                }
            }
        }
        for course in self.courses.values() {
            for student_id in &course.student_ids {
                let linked = self
                    .students
                    .get(student_id)
                    .is_some_and(|student| student.course_ids.contains(&course.id));
                if !linked {
                    return Err(RegistrarError::CorruptData(format!(
                        "course {} lists student {student_id} but the student disagrees",
                        course.id
                    )));
                }
            }
            if let Some(instructor_id) = &course.instructor_id {
                let linked = self
                    .instructors
                    .get(instructor_id)
                    .is_some_and(|instructor| instructor.course_ids.contains(&course.id));
                if !linked {
                    return Err(RegistrarError::CorruptData(format!(
                        "course {} names instructor {instructor_id} but the instructor disagrees",
                        course.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn people(&self, kind: PersonKind) -> &BTreeMap<String, Person> {
        match kind {
            PersonKind::Student => &self.students,
            PersonKind::Instructor => &self.instructors,
        }
    }

    fn people_mut(&mut self, kind: PersonKind) -> &mut BTreeMap<String, Person> {
        match kind {
            PersonKind::Student => &mut self.students,
            PersonKind::Instructor => &mut self.instructors,
        }
    }

    /// Normalize `id` and confirm the person exists, returning the map key.
    fn ensure_person(&self, kind: PersonKind, id: &str) -> Result<String> {
        Ok(self.person(kind, id)?.id.clone())
    }

    fn ensure_course(&self, id: &str) -> Result<String> {
        Ok(self.course(id)?.id.clone())
    }

    // Link helpers assume both ids were checked by the caller.

    fn link_student(&mut self, student_id: &str, course_id: &str) {
        if let Some(student) = self.students.get_mut(student_id) {
            student.course_ids.insert(course_id.to_string());
        }
        if let Some(course) = self.courses.get_mut(course_id) {
            course.student_ids.insert(student_id.to_string());
        }
    }

    fn link_instructor(&mut self, course_id: &str, instructor_id: &str) {
        self.unlink_instructor(course_id);
        if let Some(course) = self.courses.get_mut(course_id) {
            course.instructor_id = Some(instructor_id.to_string());
        }
        if let Some(instructor) = self.instructors.get_mut(instructor_id) {
            instructor.course_ids.insert(course_id.to_string());
        }
    }

    fn unlink_instructor(&mut self, course_id: &str) {
        let previous = self
            .courses
            .get_mut(course_id)
            .and_then(|course| course.instructor_id.take());
        if let Some(instructor) = previous.and_then(|id| self.instructors.get_mut(&id)) {
            instructor.course_ids.remove(course_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Registry {
        let mut registry = Registry::new();
        registry.create_student("S1", "Ana", 20, "ana@aub.edu").unwrap();
        registry.create_student("S2", "Ali", 21, "ali@aub.edu").unwrap();
        registry.create_instructor("I1", "Dr Smith", 45, "smith@aub.edu").unwrap();
        registry.create_instructor("I2", "Dr Jones", 50, "jones@aub.edu").unwrap();
        registry.create_course("C1", "Algorithms").unwrap();
        registry.create_course("C2", "Databases").unwrap();
        registry
    }

    #[test]
    fn register_links_both_sides_and_is_idempotent() {
        let mut registry = sample();
        registry.register("S1", "C1").unwrap();
        registry.register("s1", "c1").unwrap();

        assert!(registry.student("S1").unwrap().has_course("C1"));
        assert!(registry.course("C1").unwrap().has_student("S1"));
        assert_eq!(registry.student("S1").unwrap().course_ids.len(), 1);
        assert_eq!(registry.course("C1").unwrap().student_ids.len(), 1);

        registry.unregister("S1", "C1").unwrap();
        registry.unregister("S1", "C1").unwrap();
        assert!(!registry.student("S1").unwrap().has_course("C1"));
        assert!(!registry.course("C1").unwrap().has_student("S1"));
        registry.check_links().unwrap();
    }

    #[test]
    fn register_unknown_ids_fail_without_changes() {
        let mut registry = sample();
        let err = registry.register("S9", "C1").unwrap_err();
        assert!(matches!(err, RegistrarError::NotFound { kind: EntityKind::Student, .. }));
        let err = registry.register("S1", "C9").unwrap_err();
        assert!(matches!(err, RegistrarError::NotFound { kind: EntityKind::Course, .. }));
        assert!(registry.student("S1").unwrap().course_ids.is_empty());
    }

    #[test]
    fn duplicate_and_invalid_creates() {
        let mut registry = sample();
        assert!(matches!(
            registry.create_student("s1", "Someone Else", 30, "else@aub.edu"),
            Err(RegistrarError::DuplicateKey { kind: EntityKind::Student, .. })
        ));
        assert!(matches!(
            registry.create_student("S3", "Zed", 22, "zed.aub.edu"),
            Err(RegistrarError::Validation { .. })
        ));
        assert!(registry.student("S3").is_err());
        // Same id in a different table is fine.
        registry.create_instructor("S1", "Dr Ana", 40, "dr.ana@aub.edu").unwrap();
    }

    #[test]
    fn reassigning_instructor_moves_course() {
        let mut registry = sample();
        registry.assign_instructor("C1", "I1").unwrap();
        registry.assign_instructor("C1", "I2").unwrap();

        assert_eq!(registry.course("C1").unwrap().instructor_id.as_deref(), Some("I2"));
        assert!(!registry.instructor("I1").unwrap().has_course("C1"));
        assert!(registry.instructor("I2").unwrap().has_course("C1"));

        registry.unassign_instructor("C1").unwrap();
        assert!(registry.course("C1").unwrap().instructor_id.is_none());
        assert!(registry.instructor("I2").unwrap().course_ids.is_empty());
        registry.check_links().unwrap();
    }

    #[test]
    fn deleting_course_cascades() {
        let mut registry = sample();
        registry.register("S1", "C1").unwrap();
        registry.register("S2", "C1").unwrap();
        registry.register("S1", "C2").unwrap();
        registry.assign_instructor("C1", "I1").unwrap();

        let removed = registry.delete_course("C1").unwrap();
        assert_eq!(removed.id, "C1");
        assert_eq!(
            registry.student("S1").unwrap().course_ids.iter().collect::<Vec<_>>(),
            vec!["C2"]
        );
        assert!(registry.student("S2").unwrap().course_ids.is_empty());
        assert!(registry.instructor("I1").unwrap().course_ids.is_empty());
        assert!(matches!(
            registry.delete_course("C1"),
            Err(RegistrarError::NotFound { .. })
        ));
        registry.check_links().unwrap();
    }

    #[test]
    fn deleting_people_cascades() {
        let mut registry = sample();
        registry.register("S1", "C1").unwrap();
        registry.assign_instructor("C1", "I1").unwrap();
        registry.assign_instructor("C2", "I1").unwrap();

        registry.delete_student("S1").unwrap();
        assert!(registry.course("C1").unwrap().student_ids.is_empty());

        registry.delete_instructor("I1").unwrap();
        assert!(registry.course("C1").unwrap().instructor_id.is_none());
        assert!(registry.course("C2").unwrap().instructor_id.is_none());
        assert_eq!(registry.courses().count(), 2);
        registry.check_links().unwrap();
    }

    #[test]
    fn updates_validate_before_mutating() {
        let mut registry = sample();
        let err = registry
            .update_student(
                "S1",
                &PersonUpdate {
                    name: Some("New Name".into()),
                    email: Some("broken".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, RegistrarError::Validation { field: "email", .. }));
        assert_eq!(registry.student("S1").unwrap().name, "Ana");

        let updated = registry
            .update_course(
                "C2",
                &CourseUpdate {
                    name: Some("Database Systems".into()),
                    instructor_id: Some(Some("i2".into())),
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Database Systems");
        assert!(registry.instructor("I2").unwrap().has_course("C2"));

        assert!(matches!(
            registry.update_course(
                "C2",
                &CourseUpdate {
                    instructor_id: Some(Some("I9".into())),
                    ..Default::default()
                }
            ),
            Err(RegistrarError::NotFound { kind: EntityKind::Instructor, .. })
        ));
        assert_eq!(
            registry.course("C2").unwrap().instructor_id.as_deref(),
            Some("I2")
        );
    }

    #[test]
    fn add_person_links_carried_courses() {
        let mut registry = sample();
        let mut student = Person::student("S3", "Zed", 22, "zed@aub.edu").unwrap();
        student.course_ids.insert("C1".into());
        registry.add_person(student).unwrap();
        assert!(registry.course("C1").unwrap().has_student("S3"));

        let mut ghost = Person::student("S4", "Ghost", 22, "ghost@aub.edu").unwrap();
        ghost.course_ids.insert("C9".into());
        assert!(registry.add_person(ghost).is_err());
        assert!(registry.student("S4").is_err());
        registry.check_links().unwrap();
    }
}
