//! Metrics to 0-99 ratings.
//!
//! Every raw metric is rescaled linearly from a fixed anchor range into
//! `[0, 99]` and the five sub-ratings are combined by a weighted mean.

use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::math;

pub const MAX_RATING: f64 = 99.0;
pub const ZERO_RANGE_RATING: f64 = 50.0;
pub const DEFAULT_WEIGHT: f64 = 0.2;

const RANGE_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub min: f64,
    pub max: f64,
}

impl Anchor {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn scale(&self, value: f64) -> f64 {
        min_max_scale(value, self.min, self.max)
    }
}

pub const PAC_ANCHOR: Anchor = Anchor::new(3.0, 10.0);
pub const SHO_ANCHOR: Anchor = Anchor::new(0.0, 5.0);
pub const PAS_ANCHOR: Anchor = Anchor::new(0.5, 0.95);
pub const DEF_ANCHOR: Anchor = Anchor::new(0.0, 8.0);
// meters per match
pub const PHY_ANCHOR: Anchor = Anchor::new(5000.0, 13000.0);

/// Raw per-player inputs of the rating engine.
///
/// Missing keys read as zero. `distance_m` also accepts `total_distance_m`,
/// so a metrics JSON file can be rated directly.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct RatingInputs {
    pub top_speed_mps: f64,
    pub avg_speed_mps: f64,
    pub pass_accuracy: f64,
    pub shots_on_target: f64,
    pub tackles_won: f64,
    #[serde(alias = "total_distance_m")]
    pub distance_m: f64,
}

/// Placeholder values for the inputs that are not measured from tracking.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct RatingDefaults {
    pub pass_accuracy: f64,
    pub shots_on_target: f64,
    pub tackles_won: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SubRatings {
    #[serde(rename = "PAC")]
    pub pac: f64,
    #[serde(rename = "SHO")]
    pub sho: f64,
    #[serde(rename = "PAS")]
    pub pas: f64,
    #[serde(rename = "DEF")]
    pub def: f64,
    #[serde(rename = "PHY")]
    pub phy: f64,
}

impl SubRatings {
    #[inline]
    pub fn as_array(&self) -> [f64; 5] {
        [self.pac, self.sho, self.pas, self.def, self.phy]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct RatingWeights {
    #[serde(rename = "PAC")]
    pub pac: f64,
    #[serde(rename = "SHO")]
    pub sho: f64,
    #[serde(rename = "PAS")]
    pub pas: f64,
    #[serde(rename = "DEF")]
    pub def: f64,
    #[serde(rename = "PHY")]
    pub phy: f64,
}

impl Default for RatingWeights {
    fn default() -> Self {
        Self {
            pac: DEFAULT_WEIGHT,
            sho: DEFAULT_WEIGHT,
            pas: DEFAULT_WEIGHT,
            def: DEFAULT_WEIGHT,
            phy: DEFAULT_WEIGHT,
        }
    }
}

impl RatingWeights {
    /// Keys are `PAC`, `SHO`, `PAS`, `DEF`, `PHY`; missing ones take the default weight.
    pub fn from_map(map: &HashMap<String, f64>) -> Result<Self, Error> {
        let get = |k: &str| map.get(k).copied().unwrap_or(DEFAULT_WEIGHT);

        if let Some(key) = map
            .keys()
            .find(|k| !matches!(k.as_str(), "PAC" | "SHO" | "PAS" | "DEF" | "PHY"))
        {
            return Err(Error::InvalidWeights(format!("unknown rating key `{}`", key)));
        }

        let weights = Self {
            pac: get("PAC"),
            sho: get("SHO"),
            pas: get("PAS"),
            def: get("DEF"),
            phy: get("PHY"),
        };
        weights.validate()?;

        Ok(weights)
    }

    #[inline]
    pub fn as_array(&self) -> [f64; 5] {
        [self.pac, self.sho, self.pas, self.def, self.phy]
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidWeights(format!(
                "weights must be finite and non-negative, got {:?}",
                self.as_array()
            )));
        }

        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PlayerRating {
    pub overall: f64,
    pub subratings: SubRatings,
}

/// Linear rescale of `[min_val, max_val]` into `[0, 99]`, clamped.
/// A zero-width range scores 50, NaN scores 0.
pub fn min_max_scale(value: f64, min_val: f64, max_val: f64) -> f64 {
    if !(max_val - min_val > RANGE_EPS) {
        return ZERO_RANGE_RATING;
    }

    if value.is_nan() {
        return 0.0;
    }

    let scaled = MAX_RATING * (value - min_val) / (max_val - min_val);
    if scaled.is_nan() {
        return 0.0;
    }

    scaled.clamp(0.0, MAX_RATING)
}

pub fn compute_subratings(inputs: &RatingInputs) -> SubRatings {
    let pace = 0.7 * inputs.top_speed_mps + 0.3 * inputs.avg_speed_mps;

    SubRatings {
        pac: PAC_ANCHOR.scale(pace),
        sho: SHO_ANCHOR.scale(inputs.shots_on_target),
        pas: PAS_ANCHOR.scale(inputs.pass_accuracy),
        def: DEF_ANCHOR.scale(inputs.tackles_won),
        phy: PHY_ANCHOR.scale(inputs.distance_m),
    }
}

/// Weighted mean of the sub-ratings, rounded to 2 decimals; 0 when all weights are zero.
pub fn compute_overall(subratings: &SubRatings, weights: &RatingWeights) -> f64 {
    let w = weights.as_array();
    let total: f64 = w.iter().sum();

    if !(total > RANGE_EPS) {
        return 0.0;
    }

    let weighted: f64 = subratings
        .as_array()
        .iter()
        .zip(w.iter())
        .map(|(s, w)| s * w)
        .sum();

    math::round_to(weighted / total, 2).clamp(0.0, MAX_RATING)
}

pub fn rate_player(inputs: &RatingInputs, weights: &RatingWeights) -> PlayerRating {
    let subratings = compute_subratings(inputs);

    PlayerRating {
        overall: compute_overall(&subratings, weights),
        subratings,
    }
}

pub fn rate_players_from_metrics(
    metrics: &BTreeMap<String, RatingInputs>,
    weights: &RatingWeights,
) -> Result<BTreeMap<String, PlayerRating>, Error> {
    weights.validate()?;

    Ok(metrics
        .iter()
        .map(|(id, inputs)| (id.clone(), rate_player(inputs, weights)))
        .collect())
}

/// Rates a JSON file of `{player_id: {metric: value}}`; metrics JSON files are accepted too.
pub fn rate_players_from_file(
    path: impl AsRef<Path>,
    weights: &RatingWeights,
) -> Result<BTreeMap<String, PlayerRating>, Error> {
    let data = std::fs::read_to_string(path)?;
    let metrics: BTreeMap<String, RatingInputs> = serde_json::from_str(&data)?;

    rate_players_from_metrics(&metrics, weights)
}

pub fn save_ratings(
    ratings: &BTreeMap<String, PlayerRating>,
    path: impl AsRef<Path>,
) -> Result<PathBuf, Error> {
    let path = path.as_ref();
    std::fs::write(path, serde_json::to_string_pretty(ratings)?)?;

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_inputs() -> RatingInputs {
        RatingInputs {
            top_speed_mps: 8.0,
            avg_speed_mps: 5.0,
            pass_accuracy: 0.8,
            shots_on_target: 2.0,
            tackles_won: 4.0,
            distance_m: 9000.0,
        }
    }

    #[test]
    fn sample_player_is_deterministic() {
        let inputs = sample_inputs();
        let weights = RatingWeights::default();

        let first = rate_player(&inputs, &weights);
        let second = rate_player(&inputs, &weights);
        assert_eq!(first, second);

        // PAC: (0.7*8 + 0.3*5 - 3) / 7 * 99 = 57.9857...
        assert!((first.subratings.pac - 99.0 * 4.1 / 7.0).abs() < 1e-9);
        assert!((first.subratings.sho - 39.6).abs() < 1e-9);
        assert!((first.subratings.pas - 66.0).abs() < 1e-9);
        assert!((first.subratings.def - 49.5).abs() < 1e-9);
        assert!((first.subratings.phy - 49.5).abs() < 1e-9);

        // (57.9857 + 39.6 + 66 + 49.5 + 49.5) / 5
        assert_eq!(first.overall, 52.52);
    }

    #[test]
    fn values_outside_anchor_are_clamped() {
        assert_eq!(min_max_scale(-10.0, 0.0, 5.0), 0.0);
        assert_eq!(min_max_scale(100.0, 0.0, 5.0), 99.0);
        assert_eq!(min_max_scale(f64::INFINITY, 0.0, 5.0), 99.0);
        assert_eq!(min_max_scale(f64::NAN, 0.0, 5.0), 0.0);
    }

    #[test]
    fn zero_range_anchor_scores_midpoint() {
        assert_eq!(min_max_scale(0.0, 3.0, 3.0), 50.0);
        assert_eq!(min_max_scale(1e9, 3.0, 3.0), 50.0);
        assert_eq!(min_max_scale(f64::NAN, 3.0, 3.0), 50.0);
    }

    #[test]
    fn zero_weights_give_zero_overall() {
        let weights = RatingWeights {
            pac: 0.0,
            sho: 0.0,
            pas: 0.0,
            def: 0.0,
            phy: 0.0,
        };

        let rating = rate_player(&sample_inputs(), &weights);
        assert_eq!(rating.overall, 0.0);
    }

    #[test]
    fn weights_are_normalized() {
        let sub = SubRatings {
            pac: 90.0,
            sho: 10.0,
            pas: 10.0,
            def: 10.0,
            phy: 10.0,
        };
        let pace_only = RatingWeights {
            pac: 7.0,
            sho: 0.0,
            pas: 0.0,
            def: 0.0,
            phy: 0.0,
        };

        assert_eq!(compute_overall(&sub, &pace_only), 90.0);
    }

    #[test]
    fn weights_from_map() {
        let mut map = HashMap::new();
        map.insert("PAC".to_string(), 1.0);

        let weights = RatingWeights::from_map(&map).unwrap();
        assert_eq!(weights.pac, 1.0);
        assert_eq!(weights.phy, DEFAULT_WEIGHT);

        map.insert("SPD".to_string(), 1.0);
        assert!(matches!(
            RatingWeights::from_map(&map),
            Err(Error::InvalidWeights(_))
        ));
    }

    #[test]
    fn negative_weights_are_rejected() {
        let weights = RatingWeights {
            def: -1.0,
            ..Default::default()
        };

        let mut metrics = BTreeMap::new();
        metrics.insert("1".to_string(), sample_inputs());

        assert!(matches!(
            rate_players_from_metrics(&metrics, &weights),
            Err(Error::InvalidWeights(_))
        ));
    }

    #[test]
    fn ratings_json_shape() {
        let mut metrics = BTreeMap::new();
        metrics.insert("7".to_string(), sample_inputs());

        let ratings = rate_players_from_metrics(&metrics, &RatingWeights::default()).unwrap();
        let json = serde_json::to_value(&ratings).unwrap();

        assert_eq!(json["7"]["overall"], 52.52);
        assert_eq!(json["7"]["subratings"]["SHO"], 39.6);
        assert!(json["7"]["subratings"]["PHY"].is_number());
    }

    #[test]
    fn rates_a_metrics_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player_metrics.json");
        std::fs::write(
            &path,
            r#"{"3": {"team_id": 1, "total_distance_m": 13000.0, "latest_speed_mps": 2.0,
                      "top_speed_mps": 10.0, "avg_speed_mps": 10.0,
                      "positions_m": [[0.0, 0.0]], "timestamps_s": [0.0]}}"#,
        )
        .unwrap();

        let ratings = rate_players_from_file(&path, &RatingWeights::default()).unwrap();
        let rating = ratings["3"];

        assert_eq!(rating.subratings.pac, 99.0);
        assert_eq!(rating.subratings.phy, 99.0);
        assert_eq!(rating.subratings.pas, 0.0);

        let out = save_ratings(&ratings, dir.path().join("player_ratings.json")).unwrap();
        let back: BTreeMap<String, PlayerRating> =
            serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(back, ratings);
    }

    proptest! {
        #[test]
        fn prop_ratings_stay_in_scale(
            top in any::<f64>(),
            avg in any::<f64>(),
            pass in any::<f64>(),
            shots in any::<f64>(),
            tackles in any::<f64>(),
            distance in any::<f64>(),
            w in prop::array::uniform5(0.0f64..10.0),
        ) {
            let inputs = RatingInputs {
                top_speed_mps: top,
                avg_speed_mps: avg,
                pass_accuracy: pass,
                shots_on_target: shots,
                tackles_won: tackles,
                distance_m: distance,
            };
            let weights = RatingWeights { pac: w[0], sho: w[1], pas: w[2], def: w[3], phy: w[4] };
            let rating = rate_player(&inputs, &weights);

            for s in rating.subratings.as_array() {
                prop_assert!((0.0..=99.0).contains(&s));
            }
            prop_assert!((0.0..=99.0).contains(&rating.overall));
        }

        #[test]
        fn prop_zero_range_is_midpoint(value in any::<f64>(), anchor in -1e6f64..1e6) {
            prop_assert_eq!(min_max_scale(value, anchor, anchor), 50.0);
        }
    }
}
