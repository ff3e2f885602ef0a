use std::fs;

use campus_registrar::{db, json_store, EntityKind, Person, RegistrarError, Registry};

#[test]
fn enroll_then_delete_course_leaves_student_unenrolled() -> anyhow::Result<()> {
    let mut registry = Registry::new();
    let ana = registry.create_student("S1", "Ana", 20, "ana@aub.edu")?;
    assert_eq!(ana.name, "Ana");
    registry.create_course("C1", "Algorithms")?;

    registry.register("S1", "C1")?;
    assert!(registry.student("S1")?.has_course("C1"));
    assert!(registry.course("C1")?.has_student("S1"));

    registry.delete_course("C1")?;
    assert!(registry.student("S1")?.course_ids.is_empty());
    Ok(())
}

#[test]
fn invalid_email_adds_nothing_anywhere() -> anyhow::Result<()> {
    let mut registry = Registry::new();
    for email in ["", "ana.aub.edu"] {
        let err = registry.create_student("S1", "Ana", 20, email).unwrap_err();
        assert!(matches!(err, RegistrarError::Validation { .. }));
    }
    assert!(registry.is_empty());

    let dir = tempfile::tempdir()?;
    let conn = db::open_store(&dir.path().join("school.sqlite"))?;
    assert!(Person::student("S1", "Ana", 20, "").is_err());
    assert_eq!(db::statistics(&conn)?.students, 0);
    Ok(())
}

#[test]
fn import_with_unknown_course_is_corrupt() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("broken.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "students": [
                {"id": "S1", "name": "Ana", "age": 20, "email": "ana@aub.edu", "course_ids": ["C9"]}
            ],
            "instructors": [],
            "courses": [
                {"id": "C1", "name": "Algorithms", "instructor_id": null, "student_ids": []}
            ]
        }"#,
    )?;

    let err = json_store::load_from_path(&path).unwrap_err();
    assert!(matches!(err, RegistrarError::CorruptData(_)), "{err}");
    Ok(())
}

#[test]
fn store_survives_export_and_import_through_json() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut conn = db::open_store(&dir.path().join("data").join("school.sqlite"))?;

    db::add_student(&mut conn, &Person::student("S001", "Tamara", 22, "tamara@example.com")?)?;
    db::add_student(&mut conn, &Person::student("S002", "Ali", 21, "ali@example.com")?)?;
    db::add_instructor(&mut conn, &Person::instructor("I100", "Dr. Smith", 45, "smith@example.com")?)?;
    db::add_course(&mut conn, &campus_registrar::Course::new("EECE435", "Tools Lab")?)?;
    db::register(&mut conn, "S001", "EECE435")?;
    db::register(&mut conn, "S002", "EECE435")?;
    db::assign_instructor(&mut conn, "EECE435", Some("I100"))?;

    let export_path = dir.path().join("exports").join("school.json");
    json_store::save_to_path(&export_path, &db::load_registry(&conn)?)?;
    assert!(export_path.exists());

    db::delete_course(&mut conn, "EECE435")?;
    db::delete_student(&mut conn, "S002")?;
    assert_eq!(db::statistics(&conn)?.enrollments, 0);

    let restored = json_store::load_from_path(&export_path)?;
    db::replace_with_registry(&mut conn, &restored)?;

    let course = db::get_course(&conn, "EECE435")?;
    assert_eq!(
        course.student_ids.iter().cloned().collect::<Vec<_>>(),
        vec!["S001".to_string(), "S002".to_string()]
    );
    assert_eq!(course.instructor_id.as_deref(), Some("I100"));
    assert!(db::get_instructor(&conn, "I100")?.has_course("EECE435"));
    Ok(())
}

#[test]
fn reopening_the_file_keeps_data_and_backup_copies_it() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("school.sqlite");
    {
        let mut conn = db::open_store(&path)?;
        db::add_student(&mut conn, &Person::student("S1", "Ana", 20, "ana@aub.edu")?)?;
    }

    let conn = db::open_store(&path)?;
    assert_eq!(db::get_student(&conn, "S1")?.email, "ana@aub.edu");

    let written = db::backup(&conn, &dir.path().join("backups").join("snapshot"))?;
    assert_eq!(written.extension().and_then(|ext| ext.to_str()), Some("sqlite"));
    let copy = db::open_store(&written)?;
    let students = db::list_all(&copy, EntityKind::Student, None)?;
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].id(), "S1");
    Ok(())
}

#[test]
fn rejected_import_leaves_store_untouched() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut conn = db::open_store(&dir.path().join("school.sqlite"))?;
    db::add_student(&mut conn, &Person::student("S1", "Ana", 20, "ana@aub.edu")?)?;

    let path = dir.path().join("partial.json");
    fs::write(&path, r#"{"students": [{"id": "S2", "name": "Ali"}], "instructors": [], "courses": []}"#)?;
    let err = json_store::load_from_path(&path).unwrap_err();
    assert!(matches!(err, RegistrarError::Schema(_)), "{err}");

    assert_eq!(db::statistics(&conn)?.students, 1);
    assert!(db::get_student(&conn, "S1").is_ok());
    Ok(())
}

#[test]
fn backup_to_the_same_file_twice_overwrites_it() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut conn = db::open_store(&dir.path().join("school.sqlite"))?;
    db::add_student(&mut conn, &Person::student("S1", "Ana", 20, "ana@aub.edu")?)?;

    let dest = dir.path().join("nightly.sqlite");
    db::backup(&conn, &dest)?;
    db::add_student(&mut conn, &Person::student("S2", "Ali", 21, "ali@aub.edu")?)?;
    let written = db::backup(&conn, &dest)?;

    assert_eq!(written, dest);
    let copy = db::open_store(&written)?;
    assert_eq!(db::statistics(&copy)?.students, 2);
    Ok(())
}

#[test]
fn restore_swaps_in_a_backup() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut conn = db::open_store(&dir.path().join("school.sqlite"))?;
    db::add_student(&mut conn, &Person::student("S1", "Ana", 20, "ana@aub.edu")?)?;
    db::add_course(&mut conn, &campus_registrar::Course::new("C1", "Algorithms")?)?;
    db::register(&mut conn, "S1", "C1")?;
    let saved = db::backup(&conn, &dir.path().join("saved.db"))?;

    db::delete_course(&mut conn, "C1")?;
    db::add_student(&mut conn, &Person::student("S2", "Ali", 21, "ali@aub.edu")?)?;

    db::restore(&mut conn, &saved)?;
    assert!(db::get_student(&conn, "S2").is_err());
    assert!(db::get_course(&conn, "C1")?.has_student("S1"));
    assert_eq!(
        db::list_enrollments(&conn, Some("S1"), None)?,
        vec![db::Enrollment {
            student_id: "S1".into(),
            course_id: "C1".into(),
        }]
    );
    Ok(())
}

#[test]
fn restore_rejects_missing_and_foreign_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut conn = db::open_store(&dir.path().join("school.sqlite"))?;
    db::add_student(&mut conn, &Person::student("S1", "Ana", 20, "ana@aub.edu")?)?;

    let err = db::restore(&mut conn, &dir.path().join("absent.sqlite")).unwrap_err();
    assert!(matches!(err, RegistrarError::Io(_)), "{err}");

    let foreign = dir.path().join("other.sqlite");
    rusqlite::Connection::open(&foreign)?.execute("CREATE TABLE notes (body TEXT)", [])?;
    let err = db::restore(&mut conn, &foreign).unwrap_err();
    assert!(matches!(err, RegistrarError::Schema(_)), "{err}");

    assert_eq!(db::statistics(&conn)?.students, 1);
    Ok(())
}
