//! Concrete record kinds and the process-wide wiring that assembles them.

pub mod projections;
pub mod student;
pub mod teacher;

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::aggregate::Aggregate;
use crate::command::CommandBus;
use crate::error::{DispatchError, StoreError};
use crate::projection::ProjectionHandle;
use crate::query::{Query, QueryBus};
use crate::store::{EventStore, EventStoreBuilder};

use projections::{StudentDirectory, TeacherRoster};
use student::Student;
use teacher::Teacher;

/// Fully wired registry: store, buses, and live projections.
///
/// Built once at process start via [`Registrar::open`]. `Clone` is cheap --
/// every field is a shared handle, so clones address the same store and the
/// same routing tables.
#[derive(Debug, Clone)]
pub struct Registrar {
    /// The underlying per-kind event store.
    pub store: EventStore,
    /// Write-side bus with both aggregates' command types registered.
    pub commands: CommandBus,
    /// Read-side bus with the lookup and listing queries registered.
    pub queries: QueryBus,
    /// Live student directory.
    pub students: ProjectionHandle<StudentDirectory>,
    /// Live teacher roster.
    pub teachers: ProjectionHandle<TeacherRoster>,
}

impl Registrar {
    /// Open the store in `data_dir`, attach both projections, and register
    /// every command and query handler.
    ///
    /// Projections are attached before any command handler exists, so every
    /// event a command appends is already observed by the read models.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the data directory cannot be prepared or a
    /// log file fails to replay.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = EventStoreBuilder::new()
            .data_dir(data_dir)
            .stream_kind(Student::KIND)
            .stream_kind(Teacher::KIND)
            .open()
            .await?;

        let students = store.attach::<StudentDirectory>().await?;
        let teachers = store.attach::<TeacherRoster>().await?;

        let commands = CommandBus::new();
        commands.register_aggregate::<Student>(&store).await;
        commands.register_aggregate::<Teacher>(&store).await;

        let queries = QueryBus::new();
        register_student_queries(&queries, students.clone()).await;
        register_teacher_queries(&queries, teachers.clone()).await;

        Ok(Self {
            store,
            commands,
            queries,
            students,
            teachers,
        })
    }
}

/// Payload shape of the point-read queries.
#[derive(Debug, Deserialize)]
struct ByIdPayload {
    id: String,
}

fn parse_id(query: &Query) -> Result<String, DispatchError> {
    let payload: ByIdPayload =
        serde_json::from_value(query.payload.clone()).map_err(|source| {
            DispatchError::InvalidPayload {
                request_type: query.query_type.clone(),
                source,
            }
        })?;
    Ok(payload.id)
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, DispatchError> {
    let value = serde_json::to_value(value).map_err(StoreError::from)?;
    Ok(value)
}

async fn register_student_queries(
    queries: &QueryBus,
    students: ProjectionHandle<StudentDirectory>,
) {
    let directory = students.clone();
    queries
        .register("GetStudentById", move |query: Query| {
            let directory = directory.clone();
            async move {
                let id = parse_id(&query)?;
                match directory.read(|d| d.get(&id)) {
                    Some(record) => to_result(&record),
                    None => Ok(Value::Null),
                }
            }
        })
        .await;

    queries
        .register("ListStudents", move |_query: Query| {
            let directory = students.clone();
            async move { to_result(&directory.read(|d| d.all())) }
        })
        .await;
}

async fn register_teacher_queries(queries: &QueryBus, teachers: ProjectionHandle<TeacherRoster>) {
    let roster = teachers.clone();
    queries
        .register("GetTeacherById", move |query: Query| {
            let roster = roster.clone();
            async move {
                let id = parse_id(&query)?;
                match roster.read(|r| r.get(&id)) {
                    Some(record) => to_result(&record),
                    None => Ok(Value::Null),
                }
            }
        })
        .await;

    queries
        .register("ListTeachers", move |_query: Query| {
            let roster = teachers.clone();
            async move { to_result(&roster.read(|r| r.all())) }
        })
        .await;
}
