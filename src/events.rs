//! Sliding-window match event detection.
//!
//! Frames are pushed one at a time into a window of `num_frames`. On every
//! frame index divisible by `stride`, once the window is full, the window is
//! handed to a [`ClipClassifier`] and the best label is reported when its
//! probability reaches `threshold`.

use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::circular_queue::CircularQueue;
use crate::config::EventScannerConfig;
use crate::error::Error;
use crate::frame::VideoFrame;
use crate::rating::RatingDefaults;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventLabel {
    Pass,
    Shot,
    Tackle,
}

impl EventLabel {
    pub const ALL: [EventLabel; 3] = [EventLabel::Pass, EventLabel::Shot, EventLabel::Tackle];
}

/// Per-label probabilities for one clip.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct EventProbabilities {
    pub pass: f32,
    pub shot: f32,
    pub tackle: f32,
}

impl EventProbabilities {
    #[inline]
    pub fn get(&self, label: EventLabel) -> f32 {
        match label {
            EventLabel::Pass => self.pass,
            EventLabel::Shot => self.shot,
            EventLabel::Tackle => self.tackle,
        }
    }

    /// Most probable label; ties go to the label listed first.
    pub fn best(&self) -> (EventLabel, f32) {
        let mut best = (EventLabel::Pass, self.pass);
        for label in &EventLabel::ALL[1..] {
            let p = self.get(*label);
            if p > best.1 {
                best = (*label, p);
            }
        }

        best
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MatchEvent {
    pub label: EventLabel,
    pub timestamp_s: f64,
    pub confidence: f32,
}

/// Video clip classifier collaborator.
pub trait ClipClassifier {
    fn classify(&mut self, clip: &[&VideoFrame]) -> Result<EventProbabilities, Error>;
}

impl<C: ClipClassifier + ?Sized> ClipClassifier for Box<C> {
    #[inline]
    fn classify(&mut self, clip: &[&VideoFrame]) -> Result<EventProbabilities, Error> {
        (**self).classify(clip)
    }
}

/// Picks exactly `n` frames: evenly spaced indices (rounded down) when there
/// are enough frames, otherwise every frame followed by copies of the last.
pub fn sample_clip<'a>(frames: &[&'a VideoFrame], n: usize) -> Vec<&'a VideoFrame> {
    let last = match frames.last() {
        Some(last) if n > 0 => *last,
        _ => return Vec::new(),
    };

    if frames.len() >= n {
        if n == 1 {
            return vec![frames[0]];
        }

        let span = (frames.len() - 1) as f64;
        let step = span / (n - 1) as f64;

        (0..n)
            .map(|i| {
                let idx = ((i as f64 * step).floor() as usize).min(frames.len() - 1);
                frames[idx]
            })
            .collect()
    } else {
        let mut clip = frames.to_vec();
        clip.resize(n, last);
        clip
    }
}

pub struct EventScanner<C> {
    config: EventScannerConfig,
    classifier: C,
    window: CircularQueue<VideoFrame>,
    events: Vec<MatchEvent>,
}

impl<C: ClipClassifier> EventScanner<C> {
    /// A window of zero frames is widened to one.
    pub fn new(mut config: EventScannerConfig, classifier: C) -> Self {
        config.num_frames = config.num_frames.max(1);
        let window = CircularQueue::with_capacity(config.num_frames);

        Self {
            config,
            classifier,
            window,
            events: Vec::new(),
        }
    }

    #[inline]
    pub fn events(&self) -> &[MatchEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<MatchEvent> {
        self.events
    }

    /// Adds a frame; returns the event detected at this frame, if any.
    pub fn push(&mut self, frame: VideoFrame, frame_idx: u64) -> Result<Option<MatchEvent>, Error> {
        self.window.push(frame);

        let stride = self.config.stride.max(1);
        if !self.window.is_full() || frame_idx % stride != 0 {
            return Ok(None);
        }

        let frames: Vec<&VideoFrame> = self.window.iter().collect();
        let clip = sample_clip(&frames, self.config.num_frames);
        let probs = self.classifier.classify(&clip)?;

        let (label, confidence) = probs.best();
        if confidence < self.config.threshold {
            return Ok(None);
        }

        let fps = if self.config.fps > 0.0 { self.config.fps } else { 25.0 };
        let event = MatchEvent {
            label,
            timestamp_s: frame_idx as f64 / fps,
            confidence,
        };

        debug!(?label, confidence, frame_idx, "match event");
        self.events.push(event);

        Ok(Some(event))
    }

    pub fn scan<I>(&mut self, frames: I) -> Result<&[MatchEvent], Error>
    where
        I: IntoIterator<Item = VideoFrame>,
    {
        for (idx, frame) in frames.into_iter().enumerate() {
            self.push(frame, idx as u64)?;
        }

        Ok(&self.events)
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.events.clear();
    }
}

/// Event counts over a whole match.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventTally {
    pub passes: usize,
    pub shots: usize,
    pub tackles: usize,
}

impl EventTally {
    pub fn from_events(events: &[MatchEvent]) -> Self {
        let mut tally = Self::default();
        for event in events {
            match event.label {
                EventLabel::Pass => tally.passes += 1,
                EventLabel::Shot => tally.shots += 1,
                EventLabel::Tackle => tally.tackles += 1,
            }
        }

        tally
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.passes + self.shots + self.tackles
    }
}

impl RatingDefaults {
    /// Spreads match-level shot and tackle counts evenly over `players`.
    /// Events carry no completion outcome, so pass accuracy is left unchanged.
    pub fn with_tally(self, tally: &EventTally, players: usize) -> Self {
        if players == 0 {
            return self;
        }

        let n = players as f64;

        Self {
            shots_on_target: tally.shots as f64 / n,
            tackles_won: tally.tackles as f64 / n,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize) -> Vec<VideoFrame> {
        (0..n)
            .map(|i| VideoFrame::filled(4, 4, [0, 0, 0], i as f64))
            .collect()
    }

    struct Scripted {
        probs: EventProbabilities,
        calls: Vec<usize>,
    }

    impl ClipClassifier for Scripted {
        fn classify(&mut self, clip: &[&VideoFrame]) -> Result<EventProbabilities, Error> {
            self.calls.push(clip.len());
            Ok(self.probs)
        }
    }

    #[test]
    fn sample_clip_spreads_indices() {
        let frames = frames(31);
        let refs: Vec<&VideoFrame> = frames.iter().collect();

        let clip = sample_clip(&refs, 16);
        let stamps: Vec<f64> = clip.iter().map(|f| f.timestamp).collect();

        assert_eq!(clip.len(), 16);
        assert_eq!(stamps[0], 0.0);
        assert_eq!(stamps[1], 2.0);
        assert_eq!(stamps[15], 30.0);
    }

    #[test]
    fn sample_clip_pads_with_last_frame() {
        let frames = frames(3);
        let refs: Vec<&VideoFrame> = frames.iter().collect();

        let stamps: Vec<f64> = sample_clip(&refs, 5).iter().map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![0.0, 1.0, 2.0, 2.0, 2.0]);

        assert!(sample_clip(&[], 5).is_empty());
        assert!(sample_clip(&refs, 0).is_empty());
    }

    #[test]
    fn empty_window_config_classifies_single_frames() {
        let classifier = Scripted {
            probs: EventProbabilities {
                pass: 0.9,
                shot: 0.05,
                tackle: 0.05,
            },
            calls: Vec::new(),
        };
        let config = EventScannerConfig {
            num_frames: 0,
            ..Default::default()
        };

        let mut scanner = EventScanner::new(config, classifier);
        let events = scanner.scan(frames(9)).unwrap().to_vec();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].label, EventLabel::Pass);
        assert_eq!(events[1].timestamp_s, 8.0 / 25.0);
        assert_eq!(scanner.classifier.calls, vec![1, 1]);
    }

    #[test]
    fn scanner_fires_on_stride_once_window_is_full() {
        let classifier = Scripted {
            probs: EventProbabilities {
                pass: 0.1,
                shot: 0.8,
                tackle: 0.1,
            },
            calls: Vec::new(),
        };

        let mut scanner = EventScanner::new(EventScannerConfig::default(), classifier);
        let events = scanner.scan(frames(40)).unwrap().to_vec();

        // window fills at index 15; 16, 24 and 32 are stride hits
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].label, EventLabel::Shot);
        assert_eq!(events[0].timestamp_s, 16.0 / 25.0);
        assert_eq!(events[2].timestamp_s, 32.0 / 25.0);
        assert_eq!(scanner.classifier.calls, vec![16, 16, 16]);
    }

    #[test]
    fn scanner_ignores_low_confidence() {
        let classifier = Scripted {
            probs: EventProbabilities {
                pass: 0.4,
                shot: 0.3,
                tackle: 0.3,
            },
            calls: Vec::new(),
        };

        let mut scanner = EventScanner::new(EventScannerConfig::default(), classifier);
        assert!(scanner.scan(frames(40)).unwrap().is_empty());
        assert_eq!(scanner.classifier.calls.len(), 3);
    }

    #[test]
    fn best_prefers_first_label_on_ties() {
        let probs = EventProbabilities {
            pass: 0.5,
            shot: 0.5,
            tackle: 0.0,
        };
        assert_eq!(probs.best(), (EventLabel::Pass, 0.5));
    }

    #[test]
    fn tally_feeds_rating_defaults() {
        let event = |label| MatchEvent {
            label,
            timestamp_s: 0.0,
            confidence: 0.9,
        };
        let tally = EventTally::from_events(&[
            event(EventLabel::Shot),
            event(EventLabel::Shot),
            event(EventLabel::Tackle),
            event(EventLabel::Pass),
        ]);

        assert_eq!(tally.total(), 4);

        let defaults = RatingDefaults {
            pass_accuracy: 0.75,
            ..Default::default()
        }
        .with_tally(&tally, 2);

        assert_eq!(defaults.pass_accuracy, 0.75);
        assert_eq!(defaults.shots_on_target, 1.0);
        assert_eq!(defaults.tackles_won, 0.5);
    }
}
