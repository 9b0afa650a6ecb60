use crate::error::Error;
use derive_more::Display;
use docshelf_model::Document;
use std::collections::HashMap;
use uuid::Uuid;

/// Locally generated id of one upload, unrelated to the document id it ends
/// up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub struct UploadId(Uuid);
impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}
impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum UploadStage {
    #[display("queued")]
    Queued,
    #[display("validating")]
    Validating,
    #[display("extracting text")]
    Extracting,
    #[display("uploading")]
    Uploading,
    #[display("saving")]
    Saving,
    #[display("done")]
    Done,
    #[display("failed")]
    Failed,
}
impl UploadStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStage::Done | UploadStage::Failed)
    }
}

#[derive(Debug)]
pub enum UploadEvent {
    /// First event of a batch.
    Started { total: usize },
    Stage {
        id: UploadId,
        file_name: String,
        stage: UploadStage,
    },
    /// Something went wrong that didn't stop the upload.
    Warning { id: UploadId, message: String },
    Done { id: UploadId, document: Box<Document> },
    Failed { id: UploadId, error: Error },
    /// Last event of a batch.
    Complete { succeeded: usize, failed: usize },
}

/// What is known about one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    pub file_name: String,
    pub stage: UploadStage,
    pub warnings: Vec<String>,
    pub document: Option<Document>,
    /// User-facing message of the failure.
    pub error: Option<String>,
}

/// Folds [`UploadEvent`]s into per-upload state, in submission order.
#[derive(Debug, Clone, Default)]
pub struct UploadTracker {
    order: Vec<UploadId>,
    entries: HashMap<UploadId, UploadProgress>,
    total: usize,
}

impl UploadTracker {
    pub fn apply(&mut self, event: &UploadEvent) {
        match event {
            UploadEvent::Started { total } => self.total += total,
            UploadEvent::Stage { id, file_name, stage } => match self.entries.get_mut(id) {
                Some(entry) if !entry.stage.is_terminal() => entry.stage = *stage,
                Some(_) => {},
                None => {
                    self.order.push(*id);
                    self.entries.insert(
                        *id,
                        UploadProgress {
                            file_name: file_name.clone(),
                            stage: *stage,
                            warnings: Vec::new(),
                            document: None,
                            error: None,
                        },
                    );
                },
            },
            UploadEvent::Warning { id, message } => {
                if let Some(entry) = self.entries.get_mut(id) {
                    entry.warnings.push(message.clone());
                }
            },
            UploadEvent::Done { id, document } => {
                if let Some(entry) = self.entries.get_mut(id) {
                    entry.stage = UploadStage::Done;
                    entry.document = Some(document.as_ref().clone());
                }
            },
            UploadEvent::Failed { id, error } => {
                if let Some(entry) = self.entries.get_mut(id) {
                    entry.stage = UploadStage::Failed;
                    entry.error = Some(error.to_string());
                }
            },
            UploadEvent::Complete { .. } => {},
        }
    }

    pub fn get(&self, id: UploadId) -> Option<&UploadProgress> {
        self.entries.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (UploadId, &UploadProgress)> {
        self.order.iter().filter_map(|id| self.entries.get(id).map(|entry| (*id, entry)))
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn count(&self, stage: UploadStage) -> usize {
        self.entries.values().filter(|entry| entry.stage == stage).count()
    }

    /// Every announced upload has reached a terminal stage.
    pub fn is_finished(&self) -> bool {
        self.entries.len() >= self.total && self.entries.values().all(|entry| entry.stage.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn stage(id: UploadId, stage: UploadStage) -> UploadEvent {
        UploadEvent::Stage {
            id,
            file_name: "a.pdf".to_string(),
            stage,
        }
    }

    #[test]
    fn test_entries_are_independent() {
        let (a, b) = (UploadId::new(), UploadId::new());
        let mut tracker = UploadTracker::default();
        tracker.apply(&UploadEvent::Started { total: 2 });
        tracker.apply(&stage(a, UploadStage::Queued));
        tracker.apply(&stage(b, UploadStage::Queued));
        tracker.apply(&stage(b, UploadStage::Uploading));
        tracker.apply(&UploadEvent::Warning {
            id: b,
            message: "No text".to_string(),
        });
        tracker.apply(&UploadEvent::Failed {
            id: a,
            error: Error::from(ErrorKind::invalid("File is empty.")),
        });

        assert_eq!(tracker.get(a).unwrap().stage, UploadStage::Failed);
        assert_eq!(tracker.get(a).unwrap().error.as_deref(), Some("File is empty."));
        assert_eq!(tracker.get(b).unwrap().stage, UploadStage::Uploading);
        assert_eq!(tracker.get(b).unwrap().warnings, ["No text"]);
        assert!(!tracker.is_finished());
        let order: Vec<UploadId> = tracker.iter().map(|(id, _)| id).collect();
        assert_eq!(order, [a, b]);
    }

    #[test]
    fn test_terminal_stage_sticks() {
        let id = UploadId::new();
        let mut tracker = UploadTracker::default();
        tracker.apply(&UploadEvent::Started { total: 1 });
        tracker.apply(&stage(id, UploadStage::Queued));
        tracker.apply(&UploadEvent::Failed {
            id,
            error: Error::from(ErrorKind::Task),
        });
        tracker.apply(&stage(id, UploadStage::Saving));
        assert_eq!(tracker.get(id).unwrap().stage, UploadStage::Failed);
        assert!(tracker.is_finished());
        assert_eq!(tracker.count(UploadStage::Failed), 1);
    }
}
