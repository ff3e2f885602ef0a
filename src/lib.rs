//! Core library for the campus registrar: students, instructors, and courses,
//! kept consistent in memory, exported to JSON, and stored in SQLite.
//!
//! Front ends (the bundled CLI, or a GUI) call into [`Registry`] for in-memory
//! edits, [`json_store`] for backups, and [`db`] for the persistent store. Every
//! failure comes back as a [`RegistrarError`].
pub mod config;
pub mod db;
pub mod error;
pub mod json_store;
pub mod models;
pub mod registry;
pub mod validation;

/// Typed failures and the crate-wide result alias.
pub use error::{EntityKind, RegistrarError, Result};

/// The domain types other layers manipulate.
pub use models::{Course, CourseUpdate, Entity, Person, PersonKind, PersonUpdate};

/// The in-memory graph that keeps both sides of every link in sync.
pub use registry::Registry;

pub use config::Config;
