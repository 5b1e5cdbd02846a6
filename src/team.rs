//! Two-team assignment from jersey colors.
//!
//! The classifier collects mean jersey colors until `max_samples` are seen,
//! fits a 2-means model once, and from then on only predicts. The fitted model
//! never changes.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::color;
use crate::config::TeamClassifierConfig;
use crate::error::Error;
use crate::frame::VideoFrame;
use crate::kmeans::{self, KMeansModel, KMeansParams};
use crate::Track;

pub const NUM_TEAMS: usize = 2;

pub type ColorFeature = [f64; 3];

#[derive(Debug, Clone)]
pub enum ClassifierState {
    Collecting(Vec<ColorFeature>),
    Fitted(KMeansModel<3>),
}

#[derive(Debug, Clone)]
pub struct TeamColorClassifier {
    config: TeamClassifierConfig,
    state: ClassifierState,
    track_teams: HashMap<u32, u8>,
}

impl TeamColorClassifier {
    pub fn new(config: TeamClassifierConfig) -> Self {
        let capacity = config.max_samples.min(4096);

        Self {
            config,
            state: ClassifierState::Collecting(Vec::with_capacity(capacity)),
            track_teams: HashMap::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    #[inline]
    pub fn is_fitted(&self) -> bool {
        matches!(self.state, ClassifierState::Fitted(_))
    }

    pub fn sample_count(&self) -> usize {
        match &self.state {
            ClassifierState::Collecting(samples) => samples.len(),
            ClassifierState::Fitted(_) => 0,
        }
    }

    #[inline]
    fn is_person(&self, track: &Track) -> bool {
        self.config.person_classes.contains(&track.class)
    }

    /// Records the jersey color of a person track; fits once the buffer is full.
    /// Does nothing after the fit.
    pub fn add_sample(&mut self, frame: &VideoFrame, track: &Track) -> Result<(), Error> {
        if !self.is_person(track) {
            return Ok(());
        }

        let samples = match &mut self.state {
            ClassifierState::Collecting(samples) => samples,
            ClassifierState::Fitted(_) => return Ok(()),
        };

        match color::jersey_feature(&frame.image, &track.bbox) {
            Some(feature) => samples.push(feature),
            None => return Ok(()),
        }

        if samples.len() >= self.config.max_samples.max(1) {
            self.fit()?;
        }

        Ok(())
    }

    pub fn add_samples(&mut self, frame: &VideoFrame, tracks: &[Track]) -> Result<(), Error> {
        for track in tracks {
            if self.is_fitted() {
                break;
            }

            self.add_sample(frame, track)?;
        }

        Ok(())
    }

    /// Fits the model from the collected samples. A fitted classifier is left as is.
    pub fn fit(&mut self) -> Result<(), Error> {
        let samples = match &self.state {
            ClassifierState::Collecting(samples) => samples,
            ClassifierState::Fitted(_) => return Ok(()),
        };

        if samples.is_empty() {
            return Err(Error::InsufficientData);
        }

        let params = KMeansParams {
            k: NUM_TEAMS,
            n_init: self.config.n_init,
            max_iter: self.config.max_iter,
            tolerance: self.config.tolerance,
            seed: self.config.seed,
        };

        let model = kmeans::fit(samples, &params)?;

        info!(
            samples = samples.len(),
            inertia = model.inertia,
            centroids = ?model.centroids,
            "team color model fitted"
        );

        self.state = ClassifierState::Fitted(model);

        Ok(())
    }

    /// Team of the track in `{0, 1}`; `None` before the fit, for non-person
    /// tracks and for boxes outside the frame.
    pub fn predict(&mut self, frame: &VideoFrame, track: &Track) -> Option<u8> {
        let model = match &self.state {
            ClassifierState::Fitted(model) => model,
            ClassifierState::Collecting(_) => return None,
        };

        if !self.is_person(track) {
            return None;
        }

        let feature = match color::jersey_feature(&frame.image, &track.bbox) {
            Some(feature) => feature,
            None => {
                debug!(track_id = track.track_id, "empty jersey crop");
                return None;
            }
        };

        let team = model.predict(&feature) as u8;
        self.track_teams.insert(track.track_id, team);

        Some(team)
    }

    /// Last team predicted for the track.
    #[inline]
    pub fn team_of(&self, track_id: u32) -> Option<u8> {
        self.track_teams.get(&track_id).copied()
    }
}

impl Default for TeamColorClassifier {
    fn default() -> Self {
        Self::new(TeamClassifierConfig::default())
    }
}
