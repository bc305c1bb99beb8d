//! Deadline-bounded calls into collaborators that may stall.
//!
//! The wrapped collaborator lives on its own thread; each call sends one
//! request and waits for the matching reply until the deadline passes.

use std::{
    thread,
    time::{Duration, Instant},
};

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use thiserror::Error;

use crate::{
    controller::{LandmarkDetector, SignClassifier},
    features::FeatureVector,
    types::{Frame, HandLandmarks, Label},
};

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("worker is still busy with an earlier request")]
    Busy,
    #[error("no reply within {0:?}")]
    TimedOut(Duration),
    #[error("worker thread has stopped")]
    Stopped,
}

pub struct TimedWorker<I, O> {
    request_tx: Sender<(u64, I)>,
    reply_rx: Receiver<(u64, O)>,
    timeout: Duration,
    next_seq: u64,
}

impl<I, O> TimedWorker<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn spawn<F>(name: &str, timeout: Duration, mut work: F) -> Result<Self>
    where
        F: FnMut(I) -> O + Send + 'static,
    {
        let (request_tx, request_rx) = bounded::<(u64, I)>(1);
        let (reply_tx, reply_rx) = bounded::<(u64, O)>(1);

        // Detached: a stalled collaborator must not block shutdown.
        thread::Builder::new().name(name.to_string()).spawn(move || {
            while let Ok((seq, input)) = request_rx.recv() {
                if reply_tx.send((seq, work(input))).is_err() {
                    break;
                }
            }
        })?;

        Ok(Self {
            request_tx,
            reply_rx,
            timeout,
            next_seq: 0,
        })
    }

    pub fn call(&mut self, input: I) -> Result<O, CallError> {
        // Replies to requests that already timed out.
        while self.reply_rx.try_recv().is_ok() {}

        self.next_seq += 1;
        let seq = self.next_seq;
        match self.request_tx.try_send((seq, input)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Err(CallError::Busy),
            Err(TrySendError::Disconnected(_)) => return Err(CallError::Stopped),
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            match self.reply_rx.recv_deadline(deadline) {
                Ok((reply_seq, output)) if reply_seq == seq => return Ok(output),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return Err(CallError::TimedOut(self.timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(CallError::Stopped),
            }
        }
    }
}

pub struct TimedDetector(TimedWorker<Frame, Result<Vec<HandLandmarks>>>);

impl TimedDetector {
    pub fn spawn<D>(mut detector: D, timeout: Duration) -> Result<Self>
    where
        D: LandmarkDetector + Send + 'static,
    {
        let worker = TimedWorker::spawn("hand-detector", timeout, move |frame: Frame| {
            detector.detect(&frame)
        })?;
        Ok(Self(worker))
    }
}

impl LandmarkDetector for TimedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>> {
        self.0.call(frame.clone())?
    }
}

pub struct TimedClassifier(TimedWorker<FeatureVector, Result<Label>>);

impl TimedClassifier {
    pub fn spawn<C>(mut classifier: C, timeout: Duration) -> Result<Self>
    where
        C: SignClassifier + Send + 'static,
    {
        let worker = TimedWorker::spawn(
            "sign-classifier",
            timeout,
            move |features: FeatureVector| classifier.classify(&features),
        )?;
        Ok(Self(worker))
    }
}

impl SignClassifier for TimedClassifier {
    fn classify(&mut self, features: &FeatureVector) -> Result<Label> {
        self.0.call(features.clone())?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeper(timeout_ms: u64) -> TimedWorker<u64, u64> {
        TimedWorker::spawn("sleeper", Duration::from_millis(timeout_ms), |ms: u64| {
            thread::sleep(Duration::from_millis(ms));
            ms
        })
        .unwrap()
    }

    #[test]
    fn test_fast_call_returns_reply() {
        let mut worker = sleeper(1_000);
        assert_eq!(worker.call(0), Ok(0));
        assert_eq!(worker.call(1), Ok(1));
    }

    #[test]
    fn test_slow_call_times_out_and_late_reply_is_discarded() {
        let mut worker = sleeper(50);
        assert_eq!(
            worker.call(300),
            Err(CallError::TimedOut(Duration::from_millis(50)))
        );

        thread::sleep(Duration::from_millis(400));
        assert_eq!(worker.call(0), Ok(0));
    }

    #[test]
    fn test_requests_behind_a_stall_are_skipped() {
        let mut worker = sleeper(50);
        assert!(matches!(worker.call(400), Err(CallError::TimedOut(_))));
        // Queued behind the stalled request, then times out itself.
        assert!(matches!(worker.call(400), Err(CallError::TimedOut(_))));
        assert_eq!(worker.call(0), Err(CallError::Busy));
    }

    struct Echo;

    impl SignClassifier for Echo {
        fn classify(&mut self, features: &FeatureVector) -> Result<Label> {
            Ok(Label::new(&format!("{:.1}", features.as_slice()[3])))
        }
    }

    #[test]
    fn test_timed_classifier_forwards() {
        let mut classifier = TimedClassifier::spawn(Echo, Duration::from_secs(1)).unwrap();
        let mut values = vec![0.0; 63];
        values[3] = 0.5;
        let features = FeatureVector::try_from(values).unwrap();
        assert_eq!(classifier.classify(&features).unwrap(), Label::new("0.5"));
    }
}
