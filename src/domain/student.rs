//! Student aggregate -- enrollment records in the campus registry.
//!
//! A student is created once under a caller-chosen id and can be renamed
//! afterwards. Both commands are validated against the state rebuilt from
//! the instance's event history.

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A student record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Student {
    /// Display name; `None` until one is provided.
    pub name: Option<String>,
    /// Whether the student has been created (used to guard double-create).
    pub created: bool,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands accepted by the [`Student`] aggregate.
///
/// Serialized adjacently tagged (`type` / `payload`), matching the
/// [`Command`](crate::Command) envelope shape so envelopes decode directly
/// into this enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum StudentCommand {
    /// Create a new student record, optionally with a name.
    CreateStudent {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Set the display name of an existing student.
    UpdateStudentName { id: String, name: String },
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Domain events produced by the [`Student`] aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum StudentEvent {
    /// A new student was created.
    StudentCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// The student's display name changed.
    StudentNameUpdated { name: String },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when handling a [`StudentCommand`].
#[derive(Debug, thiserror::Error)]
pub enum StudentError {
    /// Attempted to create a student that already exists.
    #[error("student already exists")]
    AlreadyExists,
    /// Attempted to modify a student that has not been created.
    #[error("student does not exist")]
    NotCreated,
    /// A provided name must not be blank.
    #[error("student name must not be blank")]
    BlankName,
}

// ---------------------------------------------------------------------------
// Aggregate impl
// ---------------------------------------------------------------------------

impl Aggregate for Student {
    const KIND: &'static str = "student";
    const COMMAND_TYPES: &'static [&'static str] = &["CreateStudent", "UpdateStudentName"];
    type Command = StudentCommand;
    type DomainEvent = StudentEvent;
    type Error = StudentError;

    fn aggregate_id(command: &StudentCommand) -> &str {
        match command {
            StudentCommand::CreateStudent { id, .. } => id,
            StudentCommand::UpdateStudentName { id, .. } => id,
        }
    }

    fn handle(&self, cmd: StudentCommand) -> Result<Vec<StudentEvent>, StudentError> {
        match cmd {
            StudentCommand::CreateStudent { name, .. } => {
                if self.created {
                    return Err(StudentError::AlreadyExists);
                }
                if let Some(ref name) = name
                    && name.trim().is_empty()
                {
                    return Err(StudentError::BlankName);
                }
                Ok(vec![StudentEvent::StudentCreated { name }])
            }
            StudentCommand::UpdateStudentName { name, .. } => {
                if !self.created {
                    return Err(StudentError::NotCreated);
                }
                if name.trim().is_empty() {
                    return Err(StudentError::BlankName);
                }
                Ok(vec![StudentEvent::StudentNameUpdated { name }])
            }
        }
    }

    fn apply(mut self, event: &StudentEvent) -> Self {
        match event {
            StudentEvent::StudentCreated { name } => {
                self.name = name.clone();
                self.created = true;
            }
            StudentEvent::StudentNameUpdated { name } => {
                self.name = Some(name.clone());
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
