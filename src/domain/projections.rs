//! Read models over the student and teacher streams.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::student::StudentEvent;
use super::teacher::TeacherEvent;
use crate::event::{Event, decode_event};
use crate::projection::Projection;

// ---------------------------------------------------------------------------
// Student directory
// ---------------------------------------------------------------------------

/// One student entry in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    /// Instance id the entry is keyed by.
    pub id: String,
    /// Current display name, if one has been set.
    pub name: Option<String>,
}

/// Directory of all students, keyed by instance id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentDirectory {
    records: HashMap<String, StudentRecord>,
}

impl StudentDirectory {
    /// Look up one student by id.
    pub fn get(&self, id: &str) -> Option<StudentRecord> {
        self.records.get(id).cloned()
    }

    /// All students, sorted by id.
    pub fn all(&self) -> Vec<StudentRecord> {
        let mut records: Vec<StudentRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Number of students in the directory.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Projection for StudentDirectory {
    const KIND: &'static str = "student";

    fn apply(&mut self, event: &Event) {
        // Unknown event types are skipped so new kinds of student events
        // can appear in the stream without breaking this read model.
        let Some(domain_event) = decode_event::<StudentEvent>(event) else {
            return;
        };
        match domain_event {
            StudentEvent::StudentCreated { name } => {
                self.records.insert(
                    event.aggregate_id.clone(),
                    StudentRecord {
                        id: event.aggregate_id.clone(),
                        name,
                    },
                );
            }
            StudentEvent::StudentNameUpdated { name } => {
                if let Some(record) = self.records.get_mut(&event.aggregate_id) {
                    record.name = Some(name);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Teacher roster
// ---------------------------------------------------------------------------

/// One teacher entry in the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherRecord {
    /// Instance id the entry is keyed by.
    pub id: String,
    /// Current display name, if one has been set.
    pub name: Option<String>,
}

/// Roster of all teachers, keyed by instance id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeacherRoster {
    records: HashMap<String, TeacherRecord>,
}

impl TeacherRoster {
    /// Look up one teacher by id.
    pub fn get(&self, id: &str) -> Option<TeacherRecord> {
        self.records.get(id).cloned()
    }

    /// All teachers, sorted by id.
    pub fn all(&self) -> Vec<TeacherRecord> {
        let mut records: Vec<TeacherRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Number of teachers in the roster.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Projection for TeacherRoster {
    const KIND: &'static str = "teacher";

    fn apply(&mut self, event: &Event) {
        let Some(domain_event) = decode_event::<TeacherEvent>(event) else {
            return;
        };
        match domain_event {
            TeacherEvent::TeacherCreated { name } => {
                self.records.insert(
                    event.aggregate_id.clone(),
                    TeacherRecord {
                        id: event.aggregate_id.clone(),
                        name,
                    },
                );
            }
            TeacherEvent::TeacherNameUpdated { name } => {
                if let Some(record) = self.records.get_mut(&event.aggregate_id) {
                    record.name = Some(name);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::encode_domain_event;
    use serde_json::json;

    fn student_created(id: &str, name: Option<&str>) -> Event {
        encode_domain_event(
            id,
            &StudentEvent::StudentCreated {
                name: name.map(str::to_owned),
            },
        )
        .expect("encode should succeed")
    }

    fn student_renamed(id: &str, name: &str) -> Event {
        encode_domain_event(
            id,
            &StudentEvent::StudentNameUpdated {
                name: name.to_owned(),
            },
        )
        .expect("encode should succeed")
    }

    #[test]
    fn created_then_renamed() {
        let mut directory = StudentDirectory::default();
        directory.apply(&student_created("s-1", None));
        directory.apply(&student_renamed("s-1", "Ann"));

        let record = directory.get("s-1").expect("record should exist");
        assert_eq!(record.name.as_deref(), Some("Ann"));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn unknown_event_type_is_a_noop() {
        let mut directory = StudentDirectory::default();
        directory.apply(&student_created("s-1", Some("Ann")));

        let before = directory.clone();
        directory.apply(&Event::new("GalaxyFormed", "s-1", json!({"spiral": true})));
        assert_eq!(directory, before);
    }

    #[test]
    fn rename_of_unknown_id_is_a_noop() {
        let mut directory = StudentDirectory::default();
        directory.apply(&student_renamed("s-9", "Ann"));
        assert!(directory.is_empty());
        assert!(directory.get("s-9").is_none());
    }

    #[test]
    fn all_is_sorted_by_id() {
        let mut directory = StudentDirectory::default();
        directory.apply(&student_created("s-2", Some("Bo")));
        directory.apply(&student_created("s-1", Some("Ann")));

        let ids: Vec<String> = directory.all().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["s-1", "s-2"]);
    }

    #[test]
    fn roster_tracks_teachers() {
        let mut roster = TeacherRoster::default();
        roster.apply(
            &encode_domain_event(
                "t-1",
                &TeacherEvent::TeacherCreated {
                    name: Some("Mr. Chips".to_owned()),
                },
            )
            .expect("encode should succeed"),
        );
        roster.apply(
            &encode_domain_event(
                "t-1",
                &TeacherEvent::TeacherNameUpdated {
                    name: "Dr. Chips".to_owned(),
                },
            )
            .expect("encode should succeed"),
        );

        let record = roster.get("t-1").expect("record should exist");
        assert_eq!(record.name.as_deref(), Some("Dr. Chips"));
    }

    #[test]
    fn raw_envelope_without_name_key_is_accepted() {
        // Events appended directly to the store (not via an aggregate) may
        // carry a minimal payload.
        let mut directory = StudentDirectory::default();
        directory.apply(&Event::new("StudentCreated", "s-1", json!({})));

        let record = directory.get("s-1").expect("record should exist");
        assert!(record.name.is_none());
    }
}
