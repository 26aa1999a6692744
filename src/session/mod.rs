//! Session workflow controller
//!
//! Owns the upload -> recognize -> present -> export-or-restart cycle as an
//! explicit state machine. The session is a plain value object handed to the
//! interaction layer; it is never shared between users and never mutated
//! from more than one place. Recognition itself is an external capability
//! reached through the [`Recognize`] trait, and the controller guarantees it
//! runs at most once per uploaded blob.

pub mod export;

use tracing::{debug, info};

use crate::error::WorkflowError;

pub use export::{CsvArtifact, ResultRow};

/// External text-recognition capability consumed by the workflow.
///
/// Implementations decode the raw upload, run OCR, and return the recognized
/// fragments in detection order. The controller does not care how.
pub trait Recognize {
    fn recognize(&mut self, upload: &Upload) -> Result<Vec<String>, WorkflowError>;
}

/// The image currently held by the session: original file name plus the
/// bytes exactly as they were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    name: String,
    bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Original file name, used for display and for the export row.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw uploaded bytes, still in whatever format the user picked.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Lifecycle position, computed from the session fields on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing uploaded yet (also the post-export and post-restart state).
    Empty,
    /// An image is held but recognition has not completed for it.
    Uploaded,
    /// Recognition finished; results are ready for review and export.
    Processed,
}

/// Per-user interaction state between one upload and its resolution.
///
/// Invariant: `extracted_text` and `result_row` are set iff `processed` is
/// true, and `processed` is only ever true while an upload is held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    upload: Option<Upload>,
    extracted_text: Option<String>,
    result_row: Option<ResultRow>,
    processed: bool,
}

impl Session {
    /// A fresh session with every field empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the current state from the fields.
    pub fn state(&self) -> SessionState {
        match (&self.upload, self.processed) {
            (None, _) => SessionState::Empty,
            (Some(_), false) => SessionState::Uploaded,
            (Some(_), true) => SessionState::Processed,
        }
    }

    pub fn uploaded_image(&self) -> Option<&Upload> {
        self.upload.as_ref()
    }

    pub fn extracted_text(&self) -> Option<&str> {
        self.extracted_text.as_deref()
    }

    pub fn result_row(&self) -> Option<&ResultRow> {
        self.result_row.as_ref()
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// Store a new upload. Any prior results are cleared first, so a blob
    /// uploaded over a processed session always starts a clean cycle.
    pub fn upload(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let upload = Upload::new(name, bytes);
        info!(image = %upload.name(), size = upload.bytes().len(), "image uploaded");
        self.extracted_text = None;
        self.result_row = None;
        self.processed = false;
        self.upload = Some(upload);
    }

    /// Run recognition for the held upload through the given capability.
    ///
    /// Idempotent per blob: once the session is processed this returns
    /// without touching the capability, so re-rendering cannot re-trigger
    /// OCR. On error the session is left unchanged in `Uploaded`; the same
    /// call can be retried since the blob has not moved.
    pub fn recognize(&mut self, service: &mut dyn Recognize) -> Result<(), WorkflowError> {
        if self.processed {
            debug!("recognition already complete for this upload, skipping");
            return Ok(());
        }
        let Some(upload) = &self.upload else {
            debug!("recognize requested with no upload, ignoring");
            return Ok(());
        };

        let fragments = service.recognize(upload)?;
        let text = fragments.join(" ");
        info!(
            image = %upload.name(),
            fragments = fragments.len(),
            chars = text.len(),
            "recognition complete"
        );

        self.result_row = Some(ResultRow::new(upload.name(), &text));
        self.extracted_text = Some(text);
        self.processed = true;
        Ok(())
    }

    /// Serialize the result row as a CSV artifact and clear the session.
    ///
    /// Returns `None` unless the session is processed. A single call both
    /// produces the artifact and returns the session to `Empty`.
    pub fn export(&mut self) -> Option<CsvArtifact> {
        if !self.processed {
            return None;
        }
        let row = self.result_row.as_ref()?;
        let artifact = row.to_csv_artifact();
        info!(file = %artifact.file_name, bytes = artifact.data.len(), "result exported");
        self.restart();
        Some(artifact)
    }

    /// Discard every field, returning to the initial empty state.
    pub fn restart(&mut self) {
        debug!("session reset");
        *self = Session::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Recognizer scripted per-test: returns canned fragments or an error,
    /// and counts how many times the workflow actually invoked it.
    struct ScriptedRecognizer {
        outcome: Result<Vec<String>, WorkflowError>,
        calls: usize,
    }

    impl ScriptedRecognizer {
        fn returning(fragments: &[&str]) -> Self {
            Self {
                outcome: Ok(fragments.iter().map(|s| s.to_string()).collect()),
                calls: 0,
            }
        }

        fn failing(err: WorkflowError) -> Self {
            Self {
                outcome: Err(err),
                calls: 0,
            }
        }
    }

    impl Recognize for ScriptedRecognizer {
        fn recognize(&mut self, _upload: &Upload) -> Result<Vec<String>, WorkflowError> {
            self.calls += 1;
            match &self.outcome {
                Ok(fragments) => Ok(fragments.clone()),
                Err(WorkflowError::UnsupportedFormat { reason }) => {
                    Err(WorkflowError::unsupported_format(reason.clone()))
                }
                Err(WorkflowError::RecognitionFailed { reason }) => {
                    Err(WorkflowError::recognition_failed(reason.clone()))
                }
            }
        }
    }

    #[test]
    fn test_initial_state_is_empty() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.uploaded_image().is_none());
        assert!(session.extracted_text().is_none());
        assert!(session.result_row().is_none());
        assert!(!session.is_processed());
    }

    #[test]
    fn test_upload_transitions_to_uploaded() {
        let mut session = Session::new();
        session.upload("rx1.png", vec![1, 2, 3]);

        assert_eq!(session.state(), SessionState::Uploaded);
        assert_eq!(session.uploaded_image().unwrap().name(), "rx1.png");
        assert!(!session.is_processed());
    }

    #[test]
    fn test_recognize_joins_fragments_with_single_space() {
        let mut session = Session::new();
        session.upload("rx1.png", vec![0u8; 16]);

        let mut ocr = ScriptedRecognizer::returning(&["Take", "2", "tablets"]);
        session.recognize(&mut ocr).unwrap();

        assert_eq!(session.state(), SessionState::Processed);
        assert_eq!(session.extracted_text(), Some("Take 2 tablets"));
        let row = session.result_row().unwrap();
        assert_eq!(row.image_name, "rx1.png");
        assert_eq!(row.extracted_text, "Take 2 tablets");
    }

    #[test]
    fn test_processed_implies_text_and_row_present() {
        let mut session = Session::new();
        session.upload("a.png", vec![0u8; 4]);
        let mut ocr = ScriptedRecognizer::returning(&["hi"]);
        session.recognize(&mut ocr).unwrap();

        assert!(session.is_processed());
        assert!(session.extracted_text().is_some());
        assert!(session.result_row().is_some());
    }

    #[test]
    fn test_empty_fragment_list_is_not_an_error() {
        let mut session = Session::new();
        session.upload("blank.png", vec![0u8; 4]);

        let mut ocr = ScriptedRecognizer::returning(&[]);
        session.recognize(&mut ocr).unwrap();

        assert!(session.is_processed());
        assert_eq!(session.extracted_text(), Some(""));
        assert_eq!(session.state(), SessionState::Processed);
    }

    #[test]
    fn test_recognition_runs_at_most_once_per_blob() {
        let mut session = Session::new();
        session.upload("rx1.png", vec![0u8; 4]);

        let mut ocr = ScriptedRecognizer::returning(&["once"]);
        session.recognize(&mut ocr).unwrap();
        // Re-render cycles dispatch the same action again; none may reach
        // the capability.
        session.recognize(&mut ocr).unwrap();
        session.recognize(&mut ocr).unwrap();

        assert_eq!(ocr.calls, 1);
        assert_eq!(session.extracted_text(), Some("once"));
    }

    #[test]
    fn test_recognize_without_upload_is_a_noop() {
        let mut session = Session::new();
        let mut ocr = ScriptedRecognizer::returning(&["never"]);
        session.recognize(&mut ocr).unwrap();

        assert_eq!(ocr.calls, 0);
        assert_eq!(session.state(), SessionState::Empty);
    }

    #[test]
    fn test_failed_recognition_leaves_session_uploaded() {
        let mut session = Session::new();
        session.upload("rx1.png", vec![0u8; 4]);

        let mut ocr = ScriptedRecognizer::failing(WorkflowError::recognition_failed("backend down"));
        let err = session.recognize(&mut ocr).unwrap_err();
        assert!(matches!(err, WorkflowError::RecognitionFailed { .. }));

        assert_eq!(session.state(), SessionState::Uploaded);
        assert!(session.extracted_text().is_none());
        assert!(!session.is_processed());
    }

    #[test]
    fn test_failed_recognition_can_be_retried_on_same_blob() {
        let mut session = Session::new();
        session.upload("rx1.png", vec![0u8; 4]);

        let mut failing = ScriptedRecognizer::failing(WorkflowError::recognition_failed("flaky"));
        assert!(session.recognize(&mut failing).is_err());

        let mut working = ScriptedRecognizer::returning(&["recovered"]);
        session.recognize(&mut working).unwrap();

        assert_eq!(session.extracted_text(), Some("recovered"));
        assert_eq!(working.calls, 1);
    }

    #[test]
    fn test_upload_over_processed_clears_prior_results() {
        let mut session = Session::new();
        session.upload("first.png", vec![1]);
        let mut ocr = ScriptedRecognizer::returning(&["old", "text"]);
        session.recognize(&mut ocr).unwrap();
        assert_eq!(session.state(), SessionState::Processed);

        session.upload("second.png", vec![2]);

        // Prior text is gone before any new recognition has run.
        assert_eq!(session.state(), SessionState::Uploaded);
        assert!(session.extracted_text().is_none());
        assert!(session.result_row().is_none());
        assert!(!session.is_processed());
        assert_eq!(session.uploaded_image().unwrap().name(), "second.png");
    }

    #[test]
    fn test_restart_from_every_state_returns_initial() {
        let initial = Session::new();

        let mut from_empty = Session::new();
        from_empty.restart();
        assert_eq!(from_empty, initial);

        let mut from_uploaded = Session::new();
        from_uploaded.upload("x.png", vec![1, 2]);
        from_uploaded.restart();
        assert_eq!(from_uploaded, initial);

        let mut from_processed = Session::new();
        from_processed.upload("x.png", vec![1, 2]);
        let mut ocr = ScriptedRecognizer::returning(&["text"]);
        from_processed.recognize(&mut ocr).unwrap();
        from_processed.restart();
        assert_eq!(from_processed, initial);
    }

    #[test]
    fn test_export_yields_csv_and_clears_session() {
        let mut session = Session::new();
        session.upload("rx1.png", vec![0u8; 4]);
        let mut ocr = ScriptedRecognizer::returning(&["Take", "2", "tablets"]);
        session.recognize(&mut ocr).unwrap();

        let artifact = session.export().expect("processed session must export");
        assert_eq!(artifact.file_name, "extracted_text.csv");
        assert_eq!(artifact.mime_type, "text/csv");
        assert_eq!(
            String::from_utf8(artifact.data).unwrap(),
            "Image,Extracted Text\nrx1.png,Take 2 tablets\n"
        );

        assert_eq!(session, Session::new());
    }

    #[test]
    fn test_export_outside_processed_returns_none() {
        let mut session = Session::new();
        assert!(session.export().is_none());

        session.upload("x.png", vec![1]);
        assert!(session.export().is_none());
        // The refused export must not disturb the held upload.
        assert_eq!(session.state(), SessionState::Uploaded);
    }
}
