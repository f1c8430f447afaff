//! Camera list and the single selected stream source.

use crate::types::CameraId;

#[derive(Debug, Default, Clone)]
pub struct CameraRegistry {
    cameras: Vec<CameraId>,
    selected: Option<CameraId>,
    streaming: bool,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the camera list, keeping backend order and dropping duplicates.
    ///
    /// Auto-selects the first camera. An empty list clears the selection.
    pub fn replace(&mut self, cameras: Vec<CameraId>) {
        let mut deduped: Vec<CameraId> = Vec::with_capacity(cameras.len());
        for cam in cameras {
            if !cam.is_empty() && !deduped.contains(&cam) {
                deduped.push(cam);
            }
        }
        self.cameras = deduped;
        let first = self.cameras.first().cloned();
        self.select(first.as_deref());
    }

    /// Clear the list after a failed refresh.
    pub fn clear(&mut self) {
        self.cameras.clear();
        self.select(None);
    }

    /// Select `id` as the sole stream source. `None` or an empty id clears
    /// the selection and stops streaming.
    pub fn select(&mut self, id: Option<&str>) {
        match id {
            Some(id) if !id.is_empty() => {
                if self.selected.as_deref() != Some(id) {
                    tracing::debug!(camera = id, "camera selected");
                }
                self.selected = Some(id.to_string());
                self.streaming = true;
            }
            _ => {
                self.selected = None;
                self.streaming = false;
            }
        }
    }

    /// Resume streaming the selected camera. Returns false with nothing selected.
    pub fn start_streaming(&mut self) -> bool {
        self.streaming = self.selected.is_some();
        self.streaming
    }

    pub fn stop_streaming(&mut self) {
        self.streaming = false;
    }

    pub fn cameras(&self) -> &[CameraId] {
        &self.cameras
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}
