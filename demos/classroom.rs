//! Self-contained walkthrough: open the registrar, issue commands for both
//! record kinds, and read the projections back through the query bus.
//!
//! Run with: `cargo run --example classroom`
//!
//! Set `RUST_LOG=campus_es=debug` to watch appends and dispatches.

use campus_es::{Command, Query, Registrar};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("campus_es=info")),
        )
        .init();

    // Use a temporary directory for the log files.
    let tmp = tempfile::tempdir()?;
    let app = Registrar::open(tmp.path()).await?;

    // Enroll two students and one teacher.
    app.commands
        .dispatch(Command::new(
            "CreateStudent",
            json!({ "id": "s-1", "name": "Ann" }),
        ))
        .await?;
    app.commands
        .dispatch(Command::new("CreateStudent", json!({ "id": "s-2" })))
        .await?;
    app.commands
        .dispatch(Command::new(
            "UpdateStudentName",
            json!({ "id": "s-2", "name": "Bo" }),
        ))
        .await?;
    app.commands
        .dispatch(Command::new(
            "CreateTeacher",
            json!({ "id": "t-1", "name": "Mr. Chips" }),
        ))
        .await?;

    // Read everything back through the query bus.
    let students = app
        .queries
        .dispatch(Query::new("ListStudents", json!({})))
        .await?;
    println!("students: {students}");

    let teacher = app
        .queries
        .dispatch(Query::new("GetTeacherById", json!({ "id": "t-1" })))
        .await?;
    println!("teacher t-1: {teacher}");

    // A rejected command leaves the log untouched.
    let rejected = app
        .commands
        .dispatch(Command::new("CreateStudent", json!({ "id": "s-1" })))
        .await;
    println!("double create: {}", rejected.unwrap_err());

    // Verify expected state.
    assert_eq!(students.as_array().map(Vec::len), Some(2));
    assert_eq!(students[1]["name"], "Bo");
    assert_eq!(teacher["name"], "Mr. Chips");
    assert_eq!(app.store.events("student").await?.len(), 3);

    println!("all assertions passed");

    Ok(())
}
