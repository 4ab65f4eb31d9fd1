//! Teacher aggregate -- staff records in the campus registry.
//!
//! Mirrors the student aggregate: create once under a caller-chosen id,
//! rename afterwards.

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A teacher record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Teacher {
    /// Display name; `None` until one is provided.
    pub name: Option<String>,
    /// Whether the teacher has been created (used to guard double-create).
    pub created: bool,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands accepted by the [`Teacher`] aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TeacherCommand {
    /// Create a new teacher record, optionally with a name.
    CreateTeacher {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Set the display name of an existing teacher.
    UpdateTeacherName { id: String, name: String },
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Domain events produced by the [`Teacher`] aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TeacherEvent {
    /// A new teacher was created.
    TeacherCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// The teacher's display name changed.
    TeacherNameUpdated { name: String },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when handling a [`TeacherCommand`].
#[derive(Debug, thiserror::Error)]
pub enum TeacherError {
    /// Attempted to create a teacher that already exists.
    #[error("teacher already exists")]
    AlreadyExists,
    /// Attempted to modify a teacher that has not been created.
    #[error("teacher does not exist")]
    NotCreated,
    /// A provided name must not be blank.
    #[error("teacher name must not be blank")]
    BlankName,
}

// ---------------------------------------------------------------------------
// Aggregate impl
// ---------------------------------------------------------------------------

impl Aggregate for Teacher {
    const KIND: &'static str = "teacher";
    const COMMAND_TYPES: &'static [&'static str] = &["CreateTeacher", "UpdateTeacherName"];
    type Command = TeacherCommand;
    type DomainEvent = TeacherEvent;
    type Error = TeacherError;

    fn aggregate_id(command: &TeacherCommand) -> &str {
        match command {
            TeacherCommand::CreateTeacher { id, .. } => id,
            TeacherCommand::UpdateTeacherName { id, .. } => id,
        }
    }

    fn handle(&self, cmd: TeacherCommand) -> Result<Vec<TeacherEvent>, TeacherError> {
        match cmd {
            TeacherCommand::CreateTeacher { name, .. } => {
                if self.created {
                    return Err(TeacherError::AlreadyExists);
                }
                if let Some(ref name) = name
                    && name.trim().is_empty()
                {
                    return Err(TeacherError::BlankName);
                }
                Ok(vec![TeacherEvent::TeacherCreated { name }])
            }
            TeacherCommand::UpdateTeacherName { name, .. } => {
                if !self.created {
                    return Err(TeacherError::NotCreated);
                }
                if name.trim().is_empty() {
                    return Err(TeacherError::BlankName);
                }
                Ok(vec![TeacherEvent::TeacherNameUpdated { name }])
            }
        }
    }

    fn apply(mut self, event: &TeacherEvent) -> Self {
        match event {
            TeacherEvent::TeacherCreated { name } => {
                self.name = name.clone();
                self.created = true;
            }
            TeacherEvent::TeacherNameUpdated { name } => {
                self.name = Some(name.clone());
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
