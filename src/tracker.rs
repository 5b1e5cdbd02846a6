use tracing::debug;

use crate::config::TrackingConfig;
use crate::detection::DetectionBatch;
use crate::error::Error;
use crate::scene::Scene;
use crate::{Detection, Track, TrackUpdater};

/// Confidence-split association tracker: confident detections start and extend
/// tracks, weak ones only keep already tracked objects alive.
pub struct ByteTracker {
    scene: Scene,
}

impl ByteTracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            scene: Scene::new(config),
        }
    }

    #[inline]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}

impl Default for ByteTracker {
    fn default() -> Self {
        Self::new(TrackingConfig::default())
    }
}

impl TrackUpdater for ByteTracker {
    fn update(&mut self, detections: &[Detection]) -> Result<Vec<Track>, Error> {
        self.scene.update(detections)?;

        Ok(self.scene.tracks())
    }
}

/// Feeds detector output to a [`TrackUpdater`] and hands back the live tracks.
pub struct TrackingAdapter<U> {
    updater: U,
}

impl<U: TrackUpdater> TrackingAdapter<U> {
    pub fn new(updater: U) -> Self {
        Self { updater }
    }

    #[inline]
    pub fn updater(&self) -> &U {
        &self.updater
    }

    #[inline]
    pub fn into_inner(self) -> U {
        self.updater
    }

    pub fn update(&mut self, batch: &DetectionBatch) -> Result<Vec<Track>, Error> {
        let mut detections = batch.to_detections()?;

        let total = detections.len();
        detections.retain(Detection::is_valid);
        if detections.len() < total {
            debug!(
                dropped = total - detections.len(),
                "malformed detections dropped"
            );
        }

        let mut tracks = self.updater.update(&detections)?;
        tracks.retain(|t| t.track_id > 0 && t.bbox.is_valid());

        Ok(tracks)
    }
}

impl TrackingAdapter<ByteTracker> {
    pub fn with_config(config: TrackingConfig) -> Self {
        Self::new(ByteTracker::new(config))
    }
}
