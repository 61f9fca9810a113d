use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::intake::{DragEvent, Dropzone, FileId, ImageFile, Preview, UploadSource};

/// Shown when "Analyze" is pressed before any upload.
pub const NO_IMAGE_MESSAGE: &str = "Please upload an image first.";

/// Used when a failure carries no description of its own.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred.";

/// The page's state, derived from which fields are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiState {
    Empty,
    Ready,
    Loading,
    Done,
    Failed,
}

/// The uploaded file and, once derived, its preview.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    pub file: ImageFile,
    pub preview: Option<Preview>,
    /// Derivation failed; the placeholder stays up for good.
    pub preview_failed: bool,
}

/// Work handed back by [`Controller::analyze`] for the caller to run.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub generation: u64,
    pub file: ImageFile,
}

/// Read-only copy of the state for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub state: UiState,
    pub file_name: Option<String>,
    pub preview: Option<Preview>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub is_loading: bool,
    /// A file is selected but its preview has not arrived yet.
    pub preview_pending: bool,
    pub dragging: bool,
}

/// The single authoritative page state. Every external event maps to one method.
#[derive(Debug, Default)]
pub struct Controller {
    selected: Option<SelectedImage>,
    result: Option<String>,
    error: Option<String>,
    /// Generation of the request still awaiting its response. At most one at a time.
    in_flight: Option<u64>,
    dropzone: Dropzone,
    /// Incremented on each upload and each dispatch; completions compare against it
    /// before writing results.
    generation: u64,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> UiState {
        if self.in_flight.is_some() {
            UiState::Loading
        } else if self.error.is_some() {
            UiState::Failed
        } else if self.result.is_some() {
            UiState::Done
        } else if self.selected.is_some() {
            UiState::Ready
        } else {
            UiState::Empty
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn drag(&mut self, event: DragEvent) {
        self.dropzone.handle(event);
    }

    /// Replaces the image and clears result and error. A request still in flight
    /// keeps the page in `Loading` until it resolves, but its outcome is now stale.
    pub fn upload(&mut self, file: ImageFile, source: UploadSource) -> FileId {
        if source == UploadSource::Drop {
            self.dropzone.handle(DragEvent::Drop);
        }
        let id = file.id();
        self.selected = Some(SelectedImage {
            file,
            preview: None,
            preview_failed: false,
        });
        self.result = None;
        self.error = None;
        self.generation += 1;
        id
    }

    /// Attach a preview if it belongs to the current file. Returns whether it was kept.
    pub fn preview_ready(&mut self, id: FileId, preview: Preview) -> bool {
        match self.selected.as_mut() {
            Some(selected) if selected.file.id() == id => {
                selected.preview = Some(preview);
                true
            }
            _ => false,
        }
    }

    /// Mark the current file's preview as unavailable. Stale ids are ignored.
    pub fn preview_failed(&mut self, id: FileId) {
        if let Some(selected) = self.selected.as_mut().filter(|s| s.file.id() == id) {
            selected.preview_failed = true;
        }
    }

    /// `Ready`/`Done`/`Failed` -> `Loading`, or `Failed` straight away with no image.
    /// Returns the work to run, or `None` if nothing should be dispatched.
    pub fn analyze(&mut self) -> Option<Dispatch> {
        if self.in_flight.is_some() {
            return None;
        }
        let Some(selected) = self.selected.as_ref() else {
            self.result = None;
            self.error = Some(NO_IMAGE_MESSAGE.to_string());
            return None;
        };
        let file = selected.file.clone();
        self.result = None;
        self.error = None;
        self.generation += 1;
        self.in_flight = Some(self.generation);
        Some(Dispatch {
            generation: self.generation,
            file,
        })
    }

    /// `Loading` -> `Done` or `Failed`. Resolving the in-flight request always ends
    /// `Loading`; the outcome is only written if no upload happened since dispatch.
    /// Returns false when the outcome was discarded.
    pub fn finish(&mut self, generation: u64, outcome: Result<String, AnalysisError>) -> bool {
        if self.in_flight != Some(generation) {
            return false;
        }
        self.in_flight = None;
        if generation != self.generation {
            return false;
        }
        match outcome {
            Ok(text) => {
                self.result = Some(text);
                self.error = None;
            }
            Err(err) => {
                let message = err.to_string();
                self.result = None;
                self.error = Some(if message.trim().is_empty() {
                    UNKNOWN_ERROR_MESSAGE.to_string()
                } else {
                    message
                });
            }
        }
        true
    }

    pub fn view(&self) -> View {
        View {
            state: self.state(),
            file_name: self.selected.as_ref().map(|s| s.file.name().to_string()),
            preview: self.selected.as_ref().and_then(|s| s.preview.clone()),
            result: self.result.clone(),
            error: self.error.clone(),
            is_loading: self.in_flight.is_some(),
            preview_pending: self
                .selected
                .as_ref()
                .is_some_and(|s| s.preview.is_none() && !s.preview_failed),
            dragging: self.dropzone.is_dragging(),
        }
    }
}
