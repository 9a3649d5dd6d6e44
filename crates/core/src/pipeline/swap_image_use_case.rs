use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::frame_selection::FrameSelection;
use crate::detection::domain::identity_tracker::{
    FaceSelectionPolicy, IdentityTracker, TrackState, TrackerConfig,
};
use crate::safety::domain::content_gate::ContentGate;
use crate::shared::error::{BoxError, FaceSwapError};
use crate::shared::face::{FaceDescriptor, SourceFace};
use crate::shared::frame::Frame;
use crate::shared::target_selector::TargetSelector;
use crate::swapping::domain::swap_executor::{SwapExecutor, SwapJob};
use crate::video::domain::frame_source::FrameSource;
use crate::video::domain::image_writer::ImageWriter;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SwapImageOptions {
    pub policy: FaceSelectionPolicy,
    pub tracker: TrackerConfig,
    pub selector: TargetSelector,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapImageOutcome {
    Swapped { faces: usize },
    /// The content gate refused the image; the original was written.
    Blocked,
}

/// Single-image swap: read → gate → detect → select → swap → write.
///
/// Every call starts from a cold tracker, so running it twice on the same
/// input gives the same result.
pub struct SwapImageUseCase {
    detector: Box<dyn FaceDetector>,
    gate: ContentGate,
    swap_executor: SwapExecutor,
    image_writer: Box<dyn ImageWriter>,
    options: SwapImageOptions,
}

impl SwapImageUseCase {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        gate: ContentGate,
        swap_executor: SwapExecutor,
        image_writer: Box<dyn ImageWriter>,
        options: SwapImageOptions,
    ) -> Self {
        Self {
            detector,
            gate,
            swap_executor,
            image_writer,
            options,
        }
    }

    /// Swaps the first frame of `input` and writes the result to
    /// `output_path`.
    pub fn execute(
        &mut self,
        input: &dyn FrameSource,
        source_face: &SourceFace,
        output_path: &Path,
    ) -> Result<SwapImageOutcome, BoxError> {
        let frame = input.read(0)?;

        if !self.gate.check(&frame)? {
            self.image_writer.write(output_path, &frame)?;
            return Ok(SwapImageOutcome::Blocked);
        }

        let faces = self.detector.detect(&frame)?;
        if faces.is_empty() {
            return Err(
                FaceSwapError::FaceNotFound("no face detected in the target image".into()).into(),
            );
        }

        let selection = self.select(&frame, faces)?;
        let swapped = self.swap_executor.run(SwapJob {
            frame_index: frame.index(),
            frame,
            selection: &selection,
            source: source_face,
        })?;
        self.image_writer.write(output_path, &swapped)?;

        log::info!(
            "Swapped {} face(s) into {}",
            selection.len(),
            output_path.display()
        );
        Ok(SwapImageOutcome::Swapped {
            faces: selection.len(),
        })
    }

    fn select(
        &self,
        frame: &Frame,
        faces: Vec<FaceDescriptor>,
    ) -> Result<FrameSelection, FaceSwapError> {
        if self.options.policy == FaceSelectionPolicy::EveryFace
            || self.options.tracker.allow_multiple_per_frame
        {
            return Ok(FrameSelection::new(faces));
        }

        let tracker = IdentityTracker::new(
            self.options.tracker.clone(),
            &self.options.selector,
            frame.width(),
            frame.height(),
        );
        let (_, selection) = tracker.step(TrackState::Cold, 0, &faces);
        if selection.is_empty() {
            return Err(FaceSwapError::FaceNotFound(
                "no detected face matches the selected region".into(),
            ));
        }
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::domain::content_filter::ContentFilter;
    use crate::shared::embedding::Embedding;
    use crate::shared::face::{BoundingBox, Gender};
    use crate::shared::target_selector::CanvasRect;
    use crate::swapping::domain::face_swapper::FaceSwapper;
    use rstest::rstest;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    struct StubSource;

    impl FrameSource for StubSource {
        fn len(&self) -> usize {
            1
        }

        fn read(&self, _index: usize) -> Result<Frame, BoxError> {
            Ok(Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3, 0))
        }
    }

    struct StubDetector {
        faces: Vec<FaceDescriptor>,
        calls: Arc<Mutex<usize>>,
    }

    impl FaceDetector for StubDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<FaceDescriptor>, BoxError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.faces.clone())
        }
    }

    struct StubFilter(bool);

    impl ContentFilter for StubFilter {
        fn is_safe(&self, _frame: &Frame) -> Result<bool, BoxError> {
            Ok(self.0)
        }
    }

    /// Writes the target's x1 into byte 0 and logs it.
    struct MarkingSwapper {
        targets: Arc<Mutex<Vec<f64>>>,
    }

    impl FaceSwapper for MarkingSwapper {
        fn swap(
            &self,
            frame: &Frame,
            target: &FaceDescriptor,
            _source: &SourceFace,
        ) -> Result<Frame, BoxError> {
            self.targets.lock().unwrap().push(target.bbox.x1);
            let mut out = frame.clone();
            out.data_mut()[0] = target.bbox.x1 as u8;
            Ok(out)
        }
    }

    #[derive(Default)]
    struct StubImageWriter {
        written: Arc<Mutex<Vec<(PathBuf, Frame)>>>,
    }

    impl ImageWriter for StubImageWriter {
        fn write(&self, path: &Path, frame: &Frame) -> Result<(), BoxError> {
            self.written
                .lock()
                .unwrap()
                .push((path.to_path_buf(), frame.clone()));
            Ok(())
        }
    }

    // --- Helpers ---

    fn face_at(x: f64) -> FaceDescriptor {
        FaceDescriptor::new(
            BoundingBox::new(x, 10.0, x + 20.0, 30.0),
            Embedding::new(vec![1.0, 0.0]),
            Gender::Unknown,
        )
    }

    struct Harness {
        detect_calls: Arc<Mutex<usize>>,
        targets: Arc<Mutex<Vec<f64>>>,
        written: Arc<Mutex<Vec<(PathBuf, Frame)>>>,
    }

    fn build(
        faces: Vec<FaceDescriptor>,
        safe: bool,
        options: SwapImageOptions,
    ) -> (SwapImageUseCase, Harness) {
        let detect_calls = Arc::new(Mutex::new(0));
        let targets = Arc::new(Mutex::new(Vec::new()));
        let writer = StubImageWriter::default();
        let harness = Harness {
            detect_calls: Arc::clone(&detect_calls),
            targets: Arc::clone(&targets),
            written: Arc::clone(&writer.written),
        };
        let use_case = SwapImageUseCase::new(
            Box::new(StubDetector {
                faces,
                calls: detect_calls,
            }),
            ContentGate::new(Box::new(StubFilter(safe))),
            SwapExecutor::new(Box::new(MarkingSwapper { targets })),
            Box::new(writer),
            options,
        );
        (use_case, harness)
    }

    fn selector_at(x: f64, y: f64) -> TargetSelector {
        TargetSelector::Region(CanvasRect {
            x,
            y,
            width: 0.0,
            height: 0.0,
            canvas_width: 100.0,
            canvas_height: 100.0,
        })
    }

    fn run(use_case: &mut SwapImageUseCase) -> Result<SwapImageOutcome, BoxError> {
        use_case.execute(
            &StubSource,
            &SourceFace::new(Embedding::new(vec![0.0, 1.0])),
            Path::new("out.png"),
        )
    }

    // --- Tests ---

    #[test]
    fn test_swaps_first_face_without_selector() {
        let (mut use_case, h) =
            build(vec![face_at(10.0), face_at(50.0)], true, SwapImageOptions::default());

        let outcome = run(&mut use_case).unwrap();

        assert_eq!(outcome, SwapImageOutcome::Swapped { faces: 1 });
        assert_eq!(*h.targets.lock().unwrap(), vec![10.0]);
        let written = h.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, PathBuf::from("out.png"));
        assert_eq!(written[0].1.data()[0], 10);
    }

    #[test]
    fn test_selector_picks_containing_face() {
        let options = SwapImageOptions {
            selector: selector_at(60.0, 20.0),
            ..SwapImageOptions::default()
        };
        let (mut use_case, h) = build(vec![face_at(10.0), face_at(50.0)], true, options);

        run(&mut use_case).unwrap();

        assert_eq!(*h.targets.lock().unwrap(), vec![50.0]);
    }

    #[test]
    fn test_selector_far_from_every_face_is_not_found() {
        let options = SwapImageOptions {
            selector: selector_at(95.0, 95.0),
            tracker: TrackerConfig {
                fallback_distance_ratio: 0.01,
                ..TrackerConfig::default()
            },
            ..SwapImageOptions::default()
        };
        let (mut use_case, h) = build(vec![face_at(10.0)], true, options);

        let err = run(&mut use_case).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FaceSwapError>(),
            Some(FaceSwapError::FaceNotFound(_))
        ));
        assert!(h.written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_faces_is_not_found() {
        let (mut use_case, h) = build(Vec::new(), true, SwapImageOptions::default());

        let err = run(&mut use_case).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FaceSwapError>(),
            Some(FaceSwapError::FaceNotFound(_))
        ));
        assert!(h.written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsafe_image_written_unchanged_without_detection() {
        let (mut use_case, h) = build(vec![face_at(10.0)], false, SwapImageOptions::default());

        let outcome = run(&mut use_case).unwrap();

        assert_eq!(outcome, SwapImageOutcome::Blocked);
        assert_eq!(*h.detect_calls.lock().unwrap(), 0);
        assert!(h.targets.lock().unwrap().is_empty());
        assert_eq!(h.written.lock().unwrap()[0].1, StubSource.read(0).unwrap());
    }

    #[rstest]
    #[case::every_face(FaceSelectionPolicy::EveryFace, false)]
    #[case::multiple_per_frame(FaceSelectionPolicy::Track, true)]
    fn test_multi_modes_swap_every_face(
        #[case] policy: FaceSelectionPolicy,
        #[case] allow_multiple_per_frame: bool,
    ) {
        let options = SwapImageOptions {
            policy,
            tracker: TrackerConfig {
                allow_multiple_per_frame,
                ..TrackerConfig::default()
            },
            ..SwapImageOptions::default()
        };
        let (mut use_case, h) = build(vec![face_at(10.0), face_at(50.0)], true, options);

        let outcome = run(&mut use_case).unwrap();

        assert_eq!(outcome, SwapImageOutcome::Swapped { faces: 2 });
        assert_eq!(*h.targets.lock().unwrap(), vec![10.0, 50.0]);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let options = SwapImageOptions {
            selector: selector_at(60.0, 20.0),
            ..SwapImageOptions::default()
        };
        let (mut use_case, h) = build(vec![face_at(10.0), face_at(50.0)], true, options);

        run(&mut use_case).unwrap();
        run(&mut use_case).unwrap();

        assert_eq!(*h.targets.lock().unwrap(), vec![50.0, 50.0]);
        let written = h.written.lock().unwrap();
        assert_eq!(written[0].1, written[1].1);
    }
}
