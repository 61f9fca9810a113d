//! Runs the controller's side effects: preview derivation and analysis requests
//! execute as tokio tasks and report back through a single transition each.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{AnalysisClient, AnalysisRequest};
use crate::encoding;
use crate::intake::{DragEvent, ImageFile, Preview, UploadSource};
use crate::state::{Controller, View};

/// One page's worth of state plus the client used to analyze its images.
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<Controller>>,
    client: Arc<dyn AnalysisClient>,
}

impl Session {
    pub fn new(client: Arc<dyn AnalysisClient>) -> Self {
        Self {
            state: Arc::new(Mutex::new(Controller::new())),
            client,
        }
    }

    pub fn view(&self) -> View {
        self.state.lock().view()
    }

    pub fn drag(&self, event: DragEvent) {
        self.state.lock().drag(event);
    }

    /// Record the file now; its preview is derived in the background.
    pub fn select_image(&self, file: ImageFile, source: UploadSource) -> JoinHandle<()> {
        let id = self.state.lock().upload(file.clone(), source);
        info!(name = file.name(), mime = file.mime_type(), "Image selected");

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            match Preview::derive(&file).await {
                Ok(preview) => {
                    if !state.lock().preview_ready(id, preview) {
                        debug!(name = file.name(), "Discarded preview for replaced image");
                    }
                }
                Err(e) => {
                    warn!(name = file.name(), error = %e, "Could not derive preview");
                    state.lock().preview_failed(id);
                }
            }
        })
    }

    /// Start an analysis of the current image. Returns `None` when nothing was
    /// dispatched (no image, or a request is already in flight).
    pub fn analyze(&self) -> Option<JoinHandle<()>> {
        let Some(dispatch) = self.state.lock().analyze() else {
            debug!("Analyze ignored");
            return None;
        };
        info!(
            generation = dispatch.generation,
            name = dispatch.file.name(),
            "Dispatching analysis"
        );

        let state = Arc::clone(&self.state);
        let client = Arc::clone(&self.client);
        Some(tokio::spawn(async move {
            let outcome = match encoding::encode(&dispatch.file).await {
                Ok(image) => client.analyze(AnalysisRequest::new(image)).await,
                Err(e) => Err(e),
            };
            match &outcome {
                Ok(text) => info!(generation = dispatch.generation, chars = text.chars().count(), "Analysis finished"),
                Err(e) => warn!(generation = dispatch.generation, error = %e, "Analysis failed"),
            }
            if !state.lock().finish(dispatch.generation, outcome) {
                info!(generation = dispatch.generation, "Discarded stale analysis result");
            }
        }))
    }
}
