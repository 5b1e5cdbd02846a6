use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::TrackingConfig;
use crate::error::Error;
use crate::predictor::Predictor;
use crate::Detection;

use munkres::{solve_assignment, WeightMatrix};

// largest `1 - IoU` accepted when rescuing tracks with low confidence detections
const LOW_SCORE_MAX_COST: f32 = 0.5;
// largest `1 - IoU` accepted when extending tentative candidates
const TENTATIVE_MAX_COST: f32 = 0.7;
const PADDING_COST: f32 = 100000.0;
const MAX_ASSIGNMENT_SIZE: usize = 1024;
const VELOCITY_SMOOTHING: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    /// seen, not yet confirmed, has no id
    Tentative,
    /// confirmed and matched recently
    Tracked,
    /// confirmed, unmatched, still inside the buffer window
    Lost,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub id: u32,
    pub status: TrackStatus,
    pub hits: u32,
    pub frames_since_update: u32,
    pub last_detection: Detection,
    pub predictor: Predictor,
    pub class_votes: BTreeMap<i32, u32>,
}

impl Participant {
    pub fn new(det: &Detection) -> Self {
        let mut class_votes = BTreeMap::new();
        class_votes.insert(det.class, 1);

        Self {
            id: 0,
            status: TrackStatus::Tentative,
            hits: 1,
            frames_since_update: 0,
            last_detection: *det,
            predictor: Predictor::new(&det.bbox, VELOCITY_SMOOTHING),
            class_votes,
        }
    }

    pub fn upgrade(&mut self, id: u32) {
        self.id = id;
        self.status = TrackStatus::Tracked;
    }

    pub fn update(&mut self, det: &Detection) {
        self.predictor
            .update(&det.bbox, self.frames_since_update + 1);
        *self.class_votes.entry(det.class).or_insert(0) += 1;

        self.last_detection = *det;
        self.hits += 1;
        self.frames_since_update = 0;

        if self.status == TrackStatus::Lost {
            self.status = TrackStatus::Tracked;
        }
    }

    pub fn mark_missed(&mut self) {
        self.frames_since_update += 1;

        if self.status == TrackStatus::Tracked {
            self.status = TrackStatus::Lost;
        }
    }

    #[inline]
    pub fn prediction(&self) -> crate::bbox::BBox<crate::bbox::Ltrb> {
        self.predictor.predict(self.frames_since_update + 1)
    }

    /// Most voted class, ties resolved towards the lower id.
    pub fn class(&self) -> i32 {
        self.class_votes
            .iter()
            .fold(None, |best: Option<(i32, u32)>, (&c, &n)| match best {
                Some((_, bn)) if bn >= n => best,
                _ => Some((c, n)),
            })
            .map(|(c, _)| c)
            .unwrap_or(self.last_detection.class)
    }
}

impl From<&Participant> for crate::Track {
    fn from(p: &Participant) -> crate::Track {
        crate::Track {
            track_id: p.id,
            bbox: p.last_detection.bbox,
            confidence: p.last_detection.confidence,
            class: p.class(),
        }
    }
}

#[derive(Debug, Default)]
struct Matching {
    matches: Vec<(usize, usize, f32)>,
    unmatched_tracks: Vec<usize>,
    unmatched_dets: Vec<usize>,
}

pub struct Scene {
    pub config: TrackingConfig,
    pub participants: Vec<Participant>,
    frame_id: u64,
    next_id: u32,
}

impl Scene {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            participants: Vec::with_capacity(64),
            frame_id: 0,
            next_id: 1,
        }
    }

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Optimal one-to-one matching of `tracks` to `dets` on `1 - IoU` against
    /// the predicted boxes; pairs costing more than `max_cost` stay unmatched.
    fn assignment(
        &self,
        max_cost: f32,
        dets: &[Detection],
        tracks: &[usize],
        det_idxs: &[usize],
    ) -> Result<Matching, Error> {
        if tracks.is_empty() || det_idxs.is_empty() {
            return Ok(Matching {
                matches: Vec::new(),
                unmatched_tracks: tracks.to_vec(),
                unmatched_dets: det_idxs.to_vec(),
            });
        }

        let n = tracks.len().max(det_idxs.len());
        if n > MAX_ASSIGNMENT_SIZE {
            return Err(Error::Tracking(format!(
                "assignment of {} tracks to {} detections is too big",
                tracks.len(),
                det_idxs.len()
            )));
        }

        let predictions: Vec<_> = tracks
            .iter()
            .map(|&t| self.participants[t].prediction())
            .collect();

        let mut costs = vec![PADDING_COST; n * n];
        for (r, prediction) in predictions.iter().enumerate() {
            for (c, &d) in det_idxs.iter().enumerate() {
                costs[r * n + c] = 1.0 - prediction.iou(&dets[d].bbox);
            }
        }

        let mut mat = WeightMatrix::from_fn(n, |(r, c)| costs[r * n + c]);
        let mut matching = Matching::default();
        let mut track_used = vec![false; tracks.len()];
        let mut det_used = vec![false; det_idxs.len()];

        match solve_assignment(&mut mat) {
            Ok(positions) => {
                for pos in positions {
                    if pos.row < tracks.len() && pos.column < det_idxs.len() {
                        let cost = costs[pos.row * n + pos.column];

                        if cost <= max_cost && cost < 1.0 {
                            track_used[pos.row] = true;
                            det_used[pos.column] = true;
                            matching
                                .matches
                                .push((tracks[pos.row], det_idxs[pos.column], 1.0 - cost));
                        }
                    }
                }
            }
            Err(_) => {
                warn!(
                    frame_id = self.frame_id,
                    "assignment could not be solved, leaving everything unmatched"
                );
            }
        }

        matching.unmatched_tracks = tracks
            .iter()
            .zip(&track_used)
            .filter(|(_, used)| !**used)
            .map(|(&t, _)| t)
            .collect();

        matching.unmatched_dets = det_idxs
            .iter()
            .zip(&det_used)
            .filter(|(_, used)| !**used)
            .map(|(&d, _)| d)
            .collect();

        Ok(matching)
    }

    fn confirm(&mut self, idx: usize) {
        let id = self.next_id;
        self.next_id += 1;
        self.participants[idx].upgrade(id);

        debug!(track_id = id, frame_id = self.frame_id, "track confirmed");
    }

    pub fn update(&mut self, detections: &[Detection]) -> Result<(), Error> {
        self.frame_id += 1;

        let mut high = Vec::new();
        let mut low = Vec::new();
        for (idx, d) in detections.iter().enumerate() {
            if d.confidence >= self.config.track_thresh {
                high.push(idx);
            } else if d.confidence >= self.config.low_thresh {
                low.push(idx);
            }
        }

        let mut confirmed = Vec::new();
        let mut tentative = Vec::new();
        for (idx, p) in self.participants.iter().enumerate() {
            if p.status == TrackStatus::Tentative {
                tentative.push(idx);
            } else {
                confirmed.push(idx);
            }
        }

        // confirmed and lost tracks against confident detections
        let first = self.assignment(self.config.match_thresh, detections, &confirmed, &high)?;

        // tracks that were matched last frame get a second chance with weak detections
        let rescuable: Vec<_> = first
            .unmatched_tracks
            .iter()
            .copied()
            .filter(|&t| self.participants[t].status == TrackStatus::Tracked)
            .collect();
        let second = self.assignment(LOW_SCORE_MAX_COST, detections, &rescuable, &low)?;

        // candidates against what is left of the confident detections
        let third = self.assignment(
            TENTATIVE_MAX_COST,
            detections,
            &tentative,
            &first.unmatched_dets,
        )?;

        let mut matched = vec![false; self.participants.len()];
        for &(t, d, _) in first
            .matches
            .iter()
            .chain(&second.matches)
            .chain(&third.matches)
        {
            matched[t] = true;
            self.participants[t].update(&detections[d]);
        }

        for (p, _) in self
            .participants
            .iter_mut()
            .zip(&matched)
            .filter(|(_, m)| !**m)
        {
            p.mark_missed();
        }

        let buffer = self.config.track_buffer;
        let before = self.participants.len();
        self.participants.retain(|p| match p.status {
            TrackStatus::Tentative => p.frames_since_update == 0,
            TrackStatus::Tracked => true,
            TrackStatus::Lost => p.frames_since_update <= buffer,
        });

        if self.participants.len() < before {
            debug!(
                frame_id = self.frame_id,
                removed = before - self.participants.len(),
                "tracks removed"
            );
        }

        for det in third.unmatched_dets.iter().map(|&d| &detections[d]) {
            self.participants.push(Participant::new(det));
        }

        let min_hits = self.config.min_hits.max(1);
        for idx in 0..self.participants.len() {
            let p = &self.participants[idx];
            if p.status == TrackStatus::Tentative && p.hits >= min_hits {
                self.confirm(idx);
            }
        }

        Ok(())
    }

    /// Confirmed tracks matched in the latest frame.
    pub fn tracks(&self) -> Vec<crate::Track> {
        self.participants
            .iter()
            .filter(|p| p.id > 0 && p.status == TrackStatus::Tracked && p.frames_since_update == 0)
            .map(Into::into)
            .collect()
    }
}
