//! Binary entry point: resolve the database location, open the store, and run
//! one maintenance command against it. Interactive front ends link the library
//! directly; this binary covers scripted backups and quick lookups.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use campus_registrar::{db, json_store, Config, EntityKind};

#[derive(Parser)]
#[command(name = "campus-registrar")]
#[command(about = "Manage students, instructors, and courses in a local SQLite store")]
struct Args {
    /// Database file (overrides REGISTRAR_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print record counts and the average roster size
    Stats,
    /// List one kind of record, ordered by id
    List {
        #[arg(value_enum)]
        kind: Kind,
        /// Only records whose name contains this text
        #[arg(long)]
        name: Option<String>,
    },
    /// Find records by id, name, or email
    Search { query: String },
    /// Write the whole store to a JSON file
    Export { file: PathBuf },
    /// Replace the store with the contents of a JSON file
    Import { file: PathBuf },
    /// Copy the SQLite file
    Backup { file: PathBuf },
    /// Replace the store with the contents of a backup file
    Restore { file: PathBuf },
    /// List enrollments, optionally for one student or one course
    Enrollments {
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        course: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Students,
    Instructors,
    Courses,
}

impl From<Kind> for EntityKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Students => EntityKind::Student,
            Kind::Instructors => EntityKind::Instructor,
            Kind::Courses => EntityKind::Course,
        }
    }
}

/// Returning a `Result` bubbles fatal problems (an unwritable data directory,
/// a rejected import) up to the terminal with their context attached.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::resolve(args.db)?;
    let mut conn = db::open_store(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;

    match args.command {
        Command::Stats => {
            let stats = db::statistics(&conn).context("failed to read statistics")?;
            println!("students:    {}", stats.students);
            println!("instructors: {}", stats.instructors);
            println!("courses:     {}", stats.courses);
            println!("enrollments: {}", stats.enrollments);
            match stats.average_roster {
                Some(avg) => println!("avg roster:  {avg:.2}"),
                None => println!("avg roster:  -"),
            }
        }
        Command::List { kind, name } => {
            let entities =
                db::list_all(&conn, kind.into(), name.as_deref()).context("failed to list records")?;
            for entity in entities {
                println!("{entity}");
            }
        }
        Command::Search { query } => {
            for hit in db::search(&conn, &query).context("search failed")? {
                match hit.email {
                    Some(email) => println!("{:<10} {:<12} {} <{}>", hit.kind, hit.id, hit.name, email),
                    None => println!("{:<10} {:<12} {}", hit.kind, hit.id, hit.name),
                }
            }
        }
        Command::Export { file } => {
            let registry = db::load_registry(&conn).context("failed to load store")?;
            json_store::save_to_path(&file, &registry)
                .with_context(|| format!("failed to export to {}", file.display()))?;
        }
        Command::Import { file } => {
            let registry = json_store::load_from_path(&file)
                .with_context(|| format!("failed to import {}", file.display()))?;
            db::replace_with_registry(&mut conn, &registry).context("failed to store import")?;
            info!("imported {} into {}", file.display(), config.db_path.display());
        }
        Command::Backup { file } => {
            let written = db::backup(&conn, &file).context("backup failed")?;
            println!("{}", written.display());
        }
        Command::Restore { file } => {
            db::restore(&mut conn, &file)
                .with_context(|| format!("failed to restore {}", file.display()))?;
        }
        Command::Enrollments { student, course } => {
            let enrollments = db::list_enrollments(&conn, student.as_deref(), course.as_deref())
                .context("failed to list enrollments")?;
            for enrollment in enrollments {
                println!("{:<12} {}", enrollment.student_id, enrollment.course_id);
            }
        }
    }

    Ok(())
}
