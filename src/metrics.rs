//! Per-track movement accumulation in pitch coordinates.

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::MetricsConfig;
use crate::error::Error;
use crate::math;
use crate::rating::{RatingDefaults, RatingInputs};

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMetrics {
    pub track_id: u32,
    pub team_id: Option<u8>,
    pub positions_m: Vec<na::Point2<f64>>,
    pub timestamps_s: Vec<f64>,
    pub distances_m: Vec<f64>,
    pub speeds_mps: Vec<f64>,
}

impl PlayerMetrics {
    fn new(track_id: u32, team_id: Option<u8>) -> Self {
        Self {
            track_id,
            team_id,
            positions_m: Vec::new(),
            timestamps_s: Vec::new(),
            distances_m: Vec::new(),
            speeds_mps: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions_m.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions_m.is_empty()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.distances_m.iter().sum()
    }

    pub fn latest_speed_mps(&self) -> f64 {
        self.speeds_mps.last().copied().unwrap_or(0.0)
    }

    pub fn top_speed_mps(&self) -> f64 {
        math::max_or_zero(self.speeds_mps.iter().copied())
    }

    /// Mean step speed; the leading synthetic zero is skipped once there are real steps.
    pub fn avg_speed_mps(&self) -> f64 {
        match self.speeds_mps.len() {
            0 | 1 => 0.0,
            _ => math::mean(self.speeds_mps[1..].iter().copied()),
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            team_id: self.team_id,
            total_distance_m: self.total_distance_m(),
            latest_speed_mps: self.latest_speed_mps(),
            top_speed_mps: self.top_speed_mps(),
            avg_speed_mps: self.avg_speed_mps(),
            samples: self.len(),
        }
    }

    fn record(&self) -> MetricsRecord {
        MetricsRecord {
            team_id: self.team_id,
            total_distance_m: self.total_distance_m(),
            latest_speed_mps: self.latest_speed_mps(),
            top_speed_mps: self.top_speed_mps(),
            avg_speed_mps: self.avg_speed_mps(),
            positions_m: self.positions_m.iter().map(|p| [p.x, p.y]).collect(),
            timestamps_s: self.timestamps_s.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MetricsSummary {
    pub team_id: Option<u8>,
    pub total_distance_m: f64,
    pub latest_speed_mps: f64,
    pub top_speed_mps: f64,
    pub avg_speed_mps: f64,
    pub samples: usize,
}

/// One entry of the persisted metrics JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    pub team_id: Option<u8>,
    pub total_distance_m: f64,
    pub latest_speed_mps: f64,
    pub top_speed_mps: f64,
    pub avg_speed_mps: f64,
    pub positions_m: Vec<[f64; 2]>,
    pub timestamps_s: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    config: MetricsConfig,
    players: BTreeMap<u32, PlayerMetrics>,
}

impl MetricsAccumulator {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            players: BTreeMap::new(),
        }
    }

    pub fn update(
        &mut self,
        track_id: u32,
        position_m: na::Point2<f64>,
        timestamp_s: f64,
        team_id: Option<u8>,
    ) -> &PlayerMetrics {
        let min_dt = self.config.min_dt_s;
        let player = self
            .players
            .entry(track_id)
            .or_insert_with(|| PlayerMetrics::new(track_id, team_id));

        if team_id.is_some() {
            player.team_id = team_id;
        }

        let step = player
            .positions_m
            .last()
            .zip(player.timestamps_s.last())
            .map(|(prev_pos, &prev_ts)| {
                let dt = timestamp_s - prev_ts;
                if !(dt > 0.0) {
                    warn!(
                        track_id,
                        prev_ts, timestamp_s, "non-increasing timestamp, clamping time step"
                    );
                }

                let dist = na::distance(prev_pos, &position_m);
                (dist, dist / dt.max(min_dt))
            });

        let (dist, speed) = step.unwrap_or((0.0, 0.0));

        player.distances_m.push(dist);
        player.speeds_mps.push(speed);
        player.positions_m.push(position_m);
        player.timestamps_s.push(timestamp_s);

        player
    }

    #[inline]
    pub fn get(&self, track_id: u32) -> Option<&PlayerMetrics> {
        self.players.get(&track_id)
    }

    #[inline]
    pub fn players(&self) -> impl Iterator<Item = &PlayerMetrics> {
        self.players.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn summarize(&self) -> BTreeMap<u32, MetricsSummary> {
        self.players
            .iter()
            .map(|(&id, p)| (id, p.summary()))
            .collect()
    }

    /// Rating inputs per player. Pass accuracy, shots on target and tackles won
    /// are not measured here and come from `defaults`.
    pub fn to_rating_inputs(&self, defaults: &RatingDefaults) -> BTreeMap<String, RatingInputs> {
        self.players
            .iter()
            .map(|(id, p)| {
                let inputs = RatingInputs {
                    top_speed_mps: p.top_speed_mps(),
                    avg_speed_mps: p.avg_speed_mps(),
                    pass_accuracy: defaults.pass_accuracy,
                    shots_on_target: defaults.shots_on_target,
                    tackles_won: defaults.tackles_won,
                    distance_m: p.total_distance_m(),
                };

                (id.to_string(), inputs)
            })
            .collect()
    }

    pub fn to_records(&self) -> BTreeMap<String, MetricsRecord> {
        self.players
            .iter()
            .map(|(id, p)| (id.to_string(), p.record()))
            .collect()
    }

    pub fn to_json(&self) -> Result<Value, Error> {
        Ok(serde_json::to_value(self.to_records())?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let path = path.as_ref();
        std::fs::write(path, serde_json::to_string_pretty(&self.to_records())?)?;

        Ok(path.to_path_buf())
    }
}
