//! The per-frame control loop and the collaborator seams it drives.
//!
//! One frame is in flight at a time: acquire, detect hands, classify each
//! hand, smooth, spell, render, then poll the quit signal. History and message
//! state live in a [`SignContext`] owned by the loop.

use anyhow::Result;

use crate::{
    features::{self, FeatureVector},
    message::{Message, MessageBuilder},
    stability::StabilityFilter,
    types::{Frame, HandLandmarks, HandOverlay, Label, Overlay},
};

/// Outcome of one blocking frame read.
#[derive(Debug)]
pub enum Acquired {
    Frame(Frame),
    /// The read failed this time; try again next iteration.
    Unavailable,
    /// The source will not produce further frames.
    Closed,
}

pub trait FrameSource {
    fn read_frame(&mut self) -> Acquired;

    fn release(&mut self) {}
}

pub trait LandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>>;
}

pub trait SignClassifier {
    fn classify(&mut self, features: &FeatureVector) -> Result<Label>;
}

pub trait Renderer {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()>;

    fn close(&mut self) {}
}

pub trait QuitSignal {
    /// Non-blocking poll.
    fn quit_requested(&mut self) -> bool;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn read_frame(&mut self) -> Acquired {
        (**self).read_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

impl<T: LandmarkDetector + ?Sized> LandmarkDetector for Box<T> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>> {
        (**self).detect(frame)
    }
}

impl<T: SignClassifier + ?Sized> SignClassifier for Box<T> {
    fn classify(&mut self, features: &FeatureVector) -> Result<Label> {
        (**self).classify(features)
    }
}

impl<T: Renderer + ?Sized> Renderer for Box<T> {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()> {
        (**self).present(frame, overlay)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

impl<T: QuitSignal + ?Sized> QuitSignal for Box<T> {
    fn quit_requested(&mut self) -> bool {
        (**self).quit_requested()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationReason {
    UserQuit,
    SourceClosed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminated(TerminationReason),
}

/// Whether hands in the same frame share one history and message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistoryScope {
    #[default]
    Shared,
    /// One history and message per detection slot (first hand, second hand, ...).
    PerHand,
}

#[derive(Clone, Debug)]
pub struct SignStream {
    filter: StabilityFilter,
    builder: MessageBuilder,
}

impl SignStream {
    fn new(capacity: usize) -> Self {
        Self {
            filter: StabilityFilter::new(capacity),
            builder: MessageBuilder::new(),
        }
    }

    /// Feeds one prediction through the filter and the builder, returning the
    /// stable label.
    pub fn push(&mut self, label: Label) -> Label {
        let stable = self.filter.observe(label);
        if self.builder.update(&stable) {
            log::debug!(
                "appended {stable} -> {} ({} symbols, history {}/{})",
                self.builder.message(),
                self.builder.message().len(),
                self.filter.len(),
                self.filter.capacity()
            );
        }
        stable
    }

    #[cfg(test)]
    pub fn filter(&self) -> &StabilityFilter {
        &self.filter
    }

    pub fn message(&self) -> &Message {
        self.builder.message()
    }
}

#[derive(Clone, Debug)]
pub struct SignContext {
    scope: HistoryScope,
    capacity: usize,
    streams: Vec<SignStream>,
}

impl SignContext {
    pub fn new(scope: HistoryScope, capacity: usize) -> Self {
        Self {
            scope,
            capacity,
            streams: vec![SignStream::new(capacity)],
        }
    }

    pub fn scope(&self) -> HistoryScope {
        self.scope
    }

    #[cfg(test)]
    pub fn streams(&self) -> &[SignStream] {
        &self.streams
    }

    fn stream_mut(&mut self, slot: usize) -> &mut SignStream {
        let index = match self.scope {
            HistoryScope::Shared => 0,
            HistoryScope::PerHand => slot,
        };
        while self.streams.len() <= index {
            self.streams.push(SignStream::new(self.capacity));
        }
        &mut self.streams[index]
    }

    pub fn messages(&self) -> Vec<Message> {
        self.streams.iter().map(|s| s.message().clone()).collect()
    }

    fn message_text(&self) -> String {
        self.streams
            .iter()
            .map(|s| s.message().to_string())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub unavailable: u64,
    pub hands_classified: u64,
    pub hands_skipped: u64,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub reason: TerminationReason,
    pub scope: HistoryScope,
    pub stats: LoopStats,
    pub messages: Vec<Message>,
}

pub struct FrameLoop<S, D, C, R, Q> {
    source: S,
    detector: D,
    classifier: C,
    renderer: R,
    quit: Q,
    context: SignContext,
    state: LoopState,
    stats: LoopStats,
}

impl<S, D, C, R, Q> FrameLoop<S, D, C, R, Q>
where
    S: FrameSource,
    D: LandmarkDetector,
    C: SignClassifier,
    R: Renderer,
    Q: QuitSignal,
{
    pub fn new(
        source: S,
        detector: D,
        classifier: C,
        renderer: R,
        quit: Q,
        context: SignContext,
    ) -> Self {
        Self {
            source,
            detector,
            classifier,
            renderer,
            quit,
            context,
            state: LoopState::Running,
            stats: LoopStats::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> LoopState {
        self.state
    }

    #[cfg(test)]
    pub fn context(&self) -> &SignContext {
        &self.context
    }

    #[cfg(test)]
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Runs one iteration. Does nothing once terminated.
    pub fn step(&mut self) -> LoopState {
        if let LoopState::Terminated(_) = self.state {
            return self.state;
        }

        match self.source.read_frame() {
            Acquired::Frame(frame) => self.process_frame(&frame),
            Acquired::Unavailable => {
                self.stats.unavailable += 1;
                log::trace!("frame unavailable, retrying");
            }
            Acquired::Closed => {
                self.state = LoopState::Terminated(TerminationReason::SourceClosed);
                return self.state;
            }
        }

        if self.quit.quit_requested() {
            self.state = LoopState::Terminated(TerminationReason::UserQuit);
        }
        self.state
    }

    /// Steps until a terminal state, then releases the source and closes the
    /// renderer.
    pub fn run(mut self) -> RunSummary {
        let reason = loop {
            if let LoopState::Terminated(reason) = self.step() {
                break reason;
            }
        };
        self.finish(reason)
    }

    fn finish(mut self, reason: TerminationReason) -> RunSummary {
        log::info!(
            "frame loop stopped ({reason:?}) after {} frames",
            self.stats.frames
        );
        self.source.release();
        self.renderer.close();

        RunSummary {
            reason,
            scope: self.context.scope(),
            stats: self.stats,
            messages: self.context.messages(),
        }
    }

    fn process_frame(&mut self, frame: &Frame) {
        self.stats.frames += 1;

        let hands = self.detector.detect(frame).unwrap_or_else(|err| {
            log::debug!("hand detection failed, skipping frame: {err:?}");
            Vec::new()
        });

        let mut overlay = Overlay::default();
        for (slot, hand) in hands.iter().enumerate() {
            let stable = self.process_hand(slot, hand);
            if stable.is_some() {
                overlay.stable = stable.clone();
            }
            overlay.hands.push(HandOverlay {
                keypoints: hand.keypoints.clone(),
                stable,
            });
        }
        overlay.message = self.context.message_text();

        if let Err(err) = self.renderer.present(frame, &overlay) {
            log::warn!("failed to render frame: {err:?}");
        }
    }

    fn process_hand(&mut self, slot: usize, hand: &HandLandmarks) -> Option<Label> {
        let features = match features::normalize(&hand.keypoints) {
            Ok(features) => features,
            Err(err) => {
                log::debug!("skipping hand {slot}: {err}");
                self.stats.hands_skipped += 1;
                return None;
            }
        };

        let label = match self.classifier.classify(&features) {
            Ok(label) => label,
            Err(err) => {
                log::debug!("skipping hand {slot}, classification failed: {err:?}");
                self.stats.hands_skipped += 1;
                return None;
            }
        };

        log::trace!(
            "hand {slot} (score {:.2}, handedness {:.2}) classified as {label}",
            hand.score,
            hand.handedness
        );
        self.stats.hands_classified += 1;
        Some(self.context.stream_mut(slot).push(label))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
        rc::Rc,
    };

    use anyhow::anyhow;

    use super::*;
    use crate::{stability::DEFAULT_HISTORY_CAPACITY, types::Keypoint};

    const SIGNS: &[&str] = &["A", "B", "C", "D"];

    /// A hand whose index-finger base encodes which sign the fake classifier
    /// reports, placed at `offset` in the frame.
    fn hand(sign: usize, offset: f32) -> HandLandmarks {
        let mut keypoints = vec![Keypoint::new(offset, offset, 0.0); 21];
        keypoints[1].x = offset + sign as f32 * 0.1;
        HandLandmarks::new(keypoints)
    }

    fn blank_frame() -> Frame {
        Frame::new(vec![0; 4], 1, 1)
    }

    struct ScriptedSource {
        reads: VecDeque<Acquired>,
        released: Rc<Cell<bool>>,
    }

    impl ScriptedSource {
        fn frames(count: usize) -> Self {
            Self::new((0..count).map(|_| Acquired::Frame(blank_frame())).collect())
        }

        fn new(reads: VecDeque<Acquired>) -> Self {
            Self {
                reads,
                released: Rc::new(Cell::new(false)),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Acquired {
            self.reads.pop_front().unwrap_or(Acquired::Closed)
        }

        fn release(&mut self) {
            self.released.set(true);
        }
    }

    /// One entry per acquired frame; `None` makes detection fail.
    struct ScriptedDetector(VecDeque<Option<Vec<HandLandmarks>>>);

    impl ScriptedDetector {
        fn one_hand_per_frame(signs: &[usize]) -> Self {
            Self(
                signs
                    .iter()
                    .enumerate()
                    .map(|(i, &s)| Some(vec![hand(s, 0.1 + 0.05 * i as f32)]))
                    .collect(),
            )
        }
    }

    impl LandmarkDetector for ScriptedDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<HandLandmarks>> {
            match self.0.pop_front() {
                Some(Some(hands)) => Ok(hands),
                Some(None) => Err(anyhow!("detector failed")),
                None => Ok(Vec::new()),
            }
        }
    }

    struct OffsetClassifier;

    impl SignClassifier for OffsetClassifier {
        fn classify(&mut self, features: &FeatureVector) -> Result<Label> {
            let index = (features.as_slice()[3] * 10.0).round() as usize;
            SIGNS
                .get(index)
                .map(|s| Label::new(s))
                .ok_or_else(|| anyhow!("class {index} outside label table"))
        }
    }

    #[derive(Default)]
    struct RecordingRenderer {
        captions: Rc<RefCell<Vec<String>>>,
        closed: Rc<Cell<bool>>,
    }

    impl Renderer for RecordingRenderer {
        fn present(&mut self, _frame: &Frame, overlay: &Overlay) -> Result<()> {
            self.captions.borrow_mut().push(overlay.caption());
            Ok(())
        }

        fn close(&mut self) {
            self.closed.set(true);
        }
    }

    struct QuitAfter(usize);

    impl QuitSignal for QuitAfter {
        fn quit_requested(&mut self) -> bool {
            if self.0 == 0 {
                return true;
            }
            self.0 -= 1;
            self.0 == 0
        }
    }

    struct NeverQuit;

    impl QuitSignal for NeverQuit {
        fn quit_requested(&mut self) -> bool {
            false
        }
    }

    fn shared(capacity: usize) -> SignContext {
        SignContext::new(HistoryScope::Shared, capacity)
    }

    fn spell(signs: &[usize], capacity: usize) -> RunSummary {
        FrameLoop::new(
            ScriptedSource::frames(signs.len()),
            ScriptedDetector::one_hand_per_frame(signs),
            OffsetClassifier,
            RecordingRenderer::default(),
            NeverQuit,
            shared(capacity),
        )
        .run()
    }

    #[test]
    fn test_edge_trigger_through_pipeline() {
        // A A A B B A A C, no smoothing.
        let summary = spell(&[0, 0, 0, 1, 1, 0, 0, 2], 1);
        assert_eq!(summary.messages.len(), 1);
        assert_eq!(summary.messages[0].to_string(), "ABAC");
        assert_eq!(summary.reason, TerminationReason::SourceClosed);
        assert_eq!(summary.stats.frames, 8);
        assert_eq!(summary.stats.hands_classified, 8);
    }

    #[test]
    fn test_smoothing_suppresses_flicker() {
        // A single stray C inside a run of A never becomes stable.
        let mut signs = vec![0; 6];
        signs.push(2);
        signs.extend([0; 3]);
        signs.extend([1; 9]);
        let summary = spell(&signs, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(summary.messages[0].to_string(), "AB");
    }

    #[test]
    fn test_identical_runs_produce_identical_messages() {
        let signs = [0, 1, 1, 2, 0, 3, 3, 3, 1, 2, 2, 0, 1, 1, 3];
        let first = spell(&signs, 4);
        let second = spell(&signs, 4);
        assert_eq!(first.messages, second.messages);
        assert!(!first.messages[0].is_empty());
    }

    #[test]
    fn test_zero_hand_frame_leaves_state_unchanged() {
        let mut frame_loop = FrameLoop::new(
            ScriptedSource::frames(2),
            ScriptedDetector(VecDeque::from([Some(vec![hand(1, 0.3)]), Some(Vec::new())])),
            OffsetClassifier,
            RecordingRenderer::default(),
            NeverQuit,
            shared(DEFAULT_HISTORY_CAPACITY),
        );

        assert_eq!(frame_loop.step(), LoopState::Running);
        let before = frame_loop.context().streams()[0].clone();

        assert_eq!(frame_loop.step(), LoopState::Running);
        let after = &frame_loop.context().streams()[0];
        assert_eq!(
            before.filter().history().collect::<Vec<_>>(),
            after.filter().history().collect::<Vec<_>>()
        );
        assert_eq!(before.message(), after.message());
        assert_eq!(frame_loop.stats().frames, 2);
    }

    #[test]
    fn test_unavailable_frames_are_retried() {
        let reads = VecDeque::from([
            Acquired::Unavailable,
            Acquired::Unavailable,
            Acquired::Frame(blank_frame()),
            Acquired::Unavailable,
        ]);
        let captions = Rc::new(RefCell::new(Vec::new()));
        let renderer = RecordingRenderer {
            captions: captions.clone(),
            ..Default::default()
        };
        let summary = FrameLoop::new(
            ScriptedSource::new(reads),
            ScriptedDetector::one_hand_per_frame(&[3]),
            OffsetClassifier,
            renderer,
            NeverQuit,
            shared(DEFAULT_HISTORY_CAPACITY),
        )
        .run();

        assert_eq!(summary.stats.unavailable, 3);
        assert_eq!(summary.stats.frames, 1);
        assert_eq!(summary.messages[0].to_string(), "D");
        assert_eq!(*captions.borrow(), vec!["Prediction: D | Message: D"]);
    }

    #[test]
    fn test_quit_signal_terminates_and_cleans_up() {
        let source = ScriptedSource::frames(10);
        let released = source.released.clone();
        let renderer = RecordingRenderer::default();
        let closed = renderer.closed.clone();

        let summary = FrameLoop::new(
            source,
            ScriptedDetector::one_hand_per_frame(&[0, 1, 2, 3, 0, 1, 2, 3, 0, 1]),
            OffsetClassifier,
            renderer,
            QuitAfter(3),
            shared(1),
        )
        .run();

        assert_eq!(summary.reason, TerminationReason::UserQuit);
        assert_eq!(summary.stats.frames, 3);
        assert_eq!(summary.messages[0].to_string(), "ABC");
        assert!(released.get());
        assert!(closed.get());
    }

    #[test]
    fn test_step_after_termination_is_inert() {
        let mut frame_loop = FrameLoop::new(
            ScriptedSource::frames(0),
            ScriptedDetector(VecDeque::new()),
            OffsetClassifier,
            RecordingRenderer::default(),
            NeverQuit,
            shared(1),
        );
        let closed = LoopState::Terminated(TerminationReason::SourceClosed);
        assert_eq!(frame_loop.step(), closed);
        assert_eq!(frame_loop.step(), closed);
        assert_eq!(frame_loop.stats().frames, 0);
    }

    #[test]
    fn test_quit_reaches_loop_while_frames_are_unavailable() {
        let source = ScriptedSource::new((0..10).map(|_| Acquired::Unavailable).collect());
        let released = source.released.clone();
        let renderer = RecordingRenderer::default();
        let closed = renderer.closed.clone();

        let summary = FrameLoop::new(
            source,
            ScriptedDetector(VecDeque::new()),
            OffsetClassifier,
            renderer,
            QuitAfter(3),
            shared(DEFAULT_HISTORY_CAPACITY),
        )
        .run();

        assert_eq!(summary.reason, TerminationReason::UserQuit);
        assert_eq!(summary.stats.frames, 0);
        assert_eq!(summary.stats.unavailable, 3);
        assert!(summary.messages[0].is_empty());
        assert!(released.get());
        assert!(closed.get());
    }

    #[test]
    fn test_malformed_hand_is_skipped_but_others_count() {
        let mut short = hand(2, 0.2);
        short.keypoints.truncate(20);
        let detector = ScriptedDetector(VecDeque::from([Some(vec![short, hand(1, 0.4)])]));

        let summary = FrameLoop::new(
            ScriptedSource::frames(1),
            detector,
            OffsetClassifier,
            RecordingRenderer::default(),
            NeverQuit,
            shared(DEFAULT_HISTORY_CAPACITY),
        )
        .run();

        assert_eq!(summary.stats.hands_skipped, 1);
        assert_eq!(summary.stats.hands_classified, 1);
        assert_eq!(summary.messages[0].to_string(), "B");
    }

    #[test]
    fn test_classifier_and_detector_errors_skip_work() {
        // Sign 7 is outside the four-entry label table.
        let detector = ScriptedDetector(VecDeque::from([
            Some(vec![hand(7, 0.2)]),
            None,
            Some(vec![hand(0, 0.2)]),
        ]));

        let summary = FrameLoop::new(
            ScriptedSource::frames(3),
            detector,
            OffsetClassifier,
            RecordingRenderer::default(),
            NeverQuit,
            shared(DEFAULT_HISTORY_CAPACITY),
        )
        .run();

        assert_eq!(summary.stats.frames, 3);
        assert_eq!(summary.stats.hands_skipped, 1);
        assert_eq!(summary.messages[0].to_string(), "A");
    }

    #[test]
    fn test_history_scope_controls_hand_mixing() {
        let frames = 4;
        let two_hands = || {
            ScriptedDetector(
                (0..frames)
                    .map(|_| Some(vec![hand(0, 0.2), hand(1, 0.6)]))
                    .collect(),
            )
        };

        let mixed = FrameLoop::new(
            ScriptedSource::frames(frames),
            two_hands(),
            OffsetClassifier,
            RecordingRenderer::default(),
            NeverQuit,
            shared(DEFAULT_HISTORY_CAPACITY),
        )
        .run();
        assert_eq!(mixed.messages.len(), 1);
        assert_eq!(mixed.messages[0].to_string(), "ABABABAB");

        let separate = FrameLoop::new(
            ScriptedSource::frames(frames),
            two_hands(),
            OffsetClassifier,
            RecordingRenderer::default(),
            NeverQuit,
            SignContext::new(HistoryScope::PerHand, DEFAULT_HISTORY_CAPACITY),
        )
        .run();
        let texts: Vec<String> = separate.messages.iter().map(|m| m.to_string()).collect();
        assert_eq!(texts, ["A", "B"]);
        assert_eq!(separate.scope, HistoryScope::PerHand);
    }

    #[test]
    fn test_every_frame_is_rendered() {
        let captions = Rc::new(RefCell::new(Vec::new()));
        let renderer = RecordingRenderer {
            captions: captions.clone(),
            ..Default::default()
        };
        let detector = ScriptedDetector(VecDeque::from([Some(Vec::new()), Some(vec![hand(2, 0.5)])]));

        FrameLoop::new(
            ScriptedSource::frames(2),
            detector,
            OffsetClassifier,
            renderer,
            NeverQuit,
            shared(DEFAULT_HISTORY_CAPACITY),
        )
        .run();

        assert_eq!(
            *captions.borrow(),
            vec!["Message: ", "Prediction: C | Message: C"]
        );
    }
}
