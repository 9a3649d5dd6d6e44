//! Frame-by-frame identity continuity for the swap target.
//!
//! The tracker decides which detected face(s) in each frame belong to the
//! person the user picked. State is an explicit [`TrackState`] value that
//! [`IdentityTracker::step`] consumes and returns, so one frame transition can
//! be exercised in isolation.
//!
//! Cold start picks the target from the selector (or the first face when
//! there is none). Once warm, a face continues the track when its embedding
//! matches any accepted embedding *and* it either covers the last known
//! center or has the last known gender.

use crate::detection::domain::embedding_history::EmbeddingHistory;
use crate::detection::domain::frame_selection::FrameSelection;
use crate::shared::constants::{DEFAULT_SIMILARITY_THRESHOLD, FALLBACK_DISTANCE_RATIO};
use crate::shared::face::{FaceDescriptor, Gender, Point};
use crate::shared::target_selector::TargetSelector;

/// How faces are chosen for swapping across a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FaceSelectionPolicy {
    /// Follow the selected identity with [`IdentityTracker`].
    #[default]
    Track,
    /// Swap every detected face in every frame; no tracking.
    EveryFace,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackerConfig {
    /// Exclusive lower bound on cosine similarity, in `(0, 1]`.
    pub similarity_threshold: f64,
    /// Accept every matching face in a frame instead of the first one.
    pub allow_multiple_per_frame: bool,
    /// Ring-buffer cap on the embedding history; `None` keeps every entry.
    pub history_capacity: Option<usize>,
    /// Frame-0 fallback radius as a fraction of the frame diagonal.
    pub fallback_distance_ratio: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            allow_multiple_per_frame: false,
            history_capacity: None,
            fallback_distance_ratio: FALLBACK_DISTANCE_RATIO,
        }
    }
}

/// What the tracker knows about the target after an accepted face.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackLock {
    pub center: Point,
    pub gender: Gender,
    pub history: EmbeddingHistory,
}

impl TrackLock {
    fn seed(face: &FaceDescriptor, capacity: Option<usize>) -> Self {
        Self {
            center: face.center(),
            gender: face.gender,
            history: EmbeddingHistory::seeded(face.embedding.clone(), capacity),
        }
    }

    fn absorb(&mut self, face: &FaceDescriptor) {
        self.center = face.center();
        self.gender = face.gender;
        self.history.push(face.embedding.clone());
    }

    /// Continuation signals of `face` relative to this lock.
    ///
    /// An unknown gender never counts as a match, so without a gender model
    /// only position can pair with similarity.
    pub fn signals(&self, face: &FaceDescriptor, threshold: f64) -> MatchSignals {
        MatchSignals {
            is_centered: face.bbox.contains(&self.center),
            is_same_gender: face.gender != Gender::Unknown && face.gender == self.gender,
            is_similar: self.history.matches(&face.embedding, threshold),
        }
    }
}

/// Per-run tracking state. Exactly one exists per run and it never leaves
/// the detection phase.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TrackState {
    /// No face accepted yet.
    #[default]
    Cold,
    Warm(TrackLock),
}

impl TrackState {
    pub fn lock(&self) -> Option<&TrackLock> {
        match self {
            TrackState::Cold => None,
            TrackState::Warm(lock) => Some(lock),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchSignals {
    pub is_centered: bool,
    pub is_same_gender: bool,
    pub is_similar: bool,
}

impl MatchSignals {
    pub fn accepts(&self) -> bool {
        self.is_similar && (self.is_centered || self.is_same_gender)
    }
}

pub struct IdentityTracker {
    config: TrackerConfig,
    initial_center: Option<Point>,
    fallback_budget: f64,
}

impl IdentityTracker {
    /// `first_width` x `first_height` are the dimensions of the first frame
    /// of the run: the selector is mapped into that frame's pixel space and
    /// the cold-start fallback radius is derived from its diagonal.
    pub fn new(
        config: TrackerConfig,
        selector: &TargetSelector,
        first_width: u32,
        first_height: u32,
    ) -> Self {
        let diagonal = (first_width as f64).hypot(first_height as f64);
        Self {
            initial_center: selector.center_in(first_width, first_height),
            fallback_budget: diagonal * config.fallback_distance_ratio,
            config,
        }
    }

    pub fn initial_center(&self) -> Option<Point> {
        self.initial_center
    }

    pub fn fallback_budget(&self) -> f64 {
        self.fallback_budget
    }

    /// Advances the track by one frame.
    ///
    /// `frame_offset` is the frame's position within the run; the nearest-face
    /// fallback only applies at offset 0.
    pub fn step(
        &self,
        state: TrackState,
        frame_offset: usize,
        faces: &[FaceDescriptor],
    ) -> (TrackState, FrameSelection) {
        if faces.is_empty() {
            return (state, FrameSelection::empty());
        }
        match state {
            TrackState::Cold => match self.cold_start(frame_offset, faces) {
                Some(face) => {
                    let lock = TrackLock::seed(face, self.config.history_capacity);
                    (
                        TrackState::Warm(lock),
                        FrameSelection::new(vec![face.clone()]),
                    )
                }
                None => (TrackState::Cold, FrameSelection::empty()),
            },
            TrackState::Warm(lock) => self.continue_track(lock, faces),
        }
    }

    /// Runs a whole sequence of per-frame detections through [`step`](Self::step)
    /// from a cold state.
    pub fn track<I, F>(&self, frames: I) -> Vec<FrameSelection>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[FaceDescriptor]>,
    {
        let mut state = TrackState::Cold;
        frames
            .into_iter()
            .enumerate()
            .map(|(offset, faces)| {
                let (next, selection) = self.step(std::mem::take(&mut state), offset, faces.as_ref());
                state = next;
                selection
            })
            .collect()
    }

    fn cold_start<'a>(
        &self,
        frame_offset: usize,
        faces: &'a [FaceDescriptor],
    ) -> Option<&'a FaceDescriptor> {
        let Some(anchor) = self.initial_center else {
            return faces.first();
        };
        if let Some(face) = faces.iter().find(|f| f.bbox.contains(&anchor)) {
            return Some(face);
        }
        if frame_offset != 0 {
            return None;
        }
        nearest_within(faces, &anchor, self.fallback_budget)
    }

    fn continue_track(
        &self,
        mut lock: TrackLock,
        faces: &[FaceDescriptor],
    ) -> (TrackState, FrameSelection) {
        // Signals are taken against the lock as it stood when the frame began.
        let signals: Vec<MatchSignals> = faces
            .iter()
            .map(|f| lock.signals(f, self.config.similarity_threshold))
            .collect();

        let mut selected = Vec::new();
        for (face, signal) in faces.iter().zip(&signals) {
            if !signal.accepts() {
                continue;
            }
            lock.absorb(face);
            selected.push(face.clone());
            if !self.config.allow_multiple_per_frame {
                break;
            }
        }

        (TrackState::Warm(lock), FrameSelection::new(selected))
    }
}

/// Face whose center is nearest `anchor`, strictly closer than `budget`.
/// Ties keep the lower index.
fn nearest_within<'a>(
    faces: &'a [FaceDescriptor],
    anchor: &Point,
    budget: f64,
) -> Option<&'a FaceDescriptor> {
    let mut best: Option<(&FaceDescriptor, f64)> = None;
    for face in faces {
        let distance = face.center().distance(anchor);
        let limit = best.map_or(budget, |(_, d)| d);
        if distance < limit {
            best = Some((face, distance));
        }
    }
    best.map(|(face, _)| face)
}
