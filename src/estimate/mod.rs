//! The estimation workflow as an explicit state machine.
//!
//! [`Estimation::step`] maps `(state, event)` to `(state, command)` without
//! doing any IO. Callers run the returned [`Command`] and feed the outcome
//! back as [`Event::Completed`].

pub mod error;
pub mod results;

pub use error::EstimateError;
pub use results::MeasurementResult;

use crate::picker::{ImageFile, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Front,
    Side,
    Standing,
}

impl View {
    pub const ALL: [View; 3] = [View::Front, View::Side, View::Standing];

    /// Multipart part name.
    pub fn field_name(self) -> &'static str {
        match self {
            View::Front => "front",
            View::Side => "side",
            View::Standing => "standing",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            View::Front => "Front View Image",
            View::Side => "Side View Image",
            View::Standing => "Standing View Image",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            View::Front => "Full body, facing camera",
            View::Side => "Profile view, full body",
            View::Standing => "Neutral pose, full body",
        }
    }

    pub fn index(self) -> usize {
        match self {
            View::Front => 0,
            View::Side => 1,
            View::Standing => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Submitting(RequestId),
    Success(MeasurementResult),
    Failure(EstimateError),
}

/// The three payloads of one submission, owned by the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSet {
    pub front: ImageFile,
    pub side: ImageFile,
    pub standing: ImageFile,
}

impl ImageSet {
    pub fn parts(&self) -> [(View, &ImageFile); 3] {
        [
            (View::Front, &self.front),
            (View::Side, &self.side),
            (View::Standing, &self.standing),
        ]
    }
}

#[derive(Debug)]
pub enum Event {
    Select(View, Selection),
    Clear(View),
    Estimate,
    Cancel,
    Completed {
        request: RequestId,
        outcome: Result<MeasurementResult, EstimateError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Submit { request: RequestId, images: ImageSet },
    Abort { request: RequestId },
}

#[derive(Debug, Default)]
pub struct Estimation {
    slots: [Option<Selection>; 3],
    phase: Phase,
    next_request: u64,
}

impl Estimation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, event: Event) -> (Self, Option<Command>) {
        let command = match event {
            Event::Select(view, selection) => {
                self.slots[view.index()] = Some(selection);
                None
            }
            Event::Clear(view) => {
                self.slots[view.index()] = None;
                None
            }
            Event::Estimate => self.start(),
            Event::Cancel => match self.phase {
                Phase::Submitting(request) => {
                    tracing::info!("Estimation {} cancelled", request);
                    self.phase = Phase::Idle;
                    Some(Command::Abort { request })
                }
                _ => None,
            },
            Event::Completed { request, outcome } => {
                self.settle(request, outcome);
                None
            }
        };
        (self, command)
    }

    fn start(&mut self) -> Option<Command> {
        if let Phase::Submitting(request) = self.phase {
            tracing::debug!("Estimation {} already in flight; ignoring trigger", request);
            return None;
        }

        match self.image_set() {
            None => {
                let filled = self.filled_count();
                tracing::debug!("Estimation rejected: {} of 3 views selected", filled);
                self.phase = Phase::Failure(EstimateError::MissingImages(filled));
                None
            }
            Some(images) => {
                let request = RequestId(self.next_request);
                self.next_request += 1;
                self.phase = Phase::Submitting(request);
                tracing::info!("Submitting estimation {}", request);
                Some(Command::Submit { request, images })
            }
        }
    }

    fn settle(&mut self, request: RequestId, outcome: Result<MeasurementResult, EstimateError>) {
        if self.phase != Phase::Submitting(request) {
            tracing::debug!("Dropping stale completion for estimation {}", request);
            return;
        }

        self.phase = match outcome {
            Ok(result) => {
                tracing::info!(
                    "Estimation {} succeeded ({} views used)",
                    request,
                    result.views_used
                );
                Phase::Success(result)
            }
            Err(e) => {
                tracing::warn!("Estimation {} failed: {}", request, e);
                Phase::Failure(e)
            }
        };
    }

    fn image_set(&self) -> Option<ImageSet> {
        let [front, side, standing] = &self.slots;
        Some(ImageSet {
            front: front.as_ref()?.file.clone(),
            side: side.as_ref()?.file.clone(),
            standing: standing.as_ref()?.file.clone(),
        })
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn slot(&self, view: View) -> Option<&Selection> {
        self.slots[view.index()].as_ref()
    }

    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.phase, Phase::Submitting(_))
    }

    /// Whether the trigger is enabled.
    pub fn can_estimate(&self) -> bool {
        self.filled_count() == View::ALL.len() && !self.is_submitting()
    }

    pub fn result(&self) -> Option<&MeasurementResult> {
        match &self.phase {
            Phase::Success(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&EstimateError> {
        match &self.phase {
            Phase::Failure(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::estimate::results::Measurements;
    use std::path::PathBuf;

    pub(crate) fn selection(name: &str, bytes: &[u8]) -> Selection {
        Selection {
            file: ImageFile {
                name: name.to_string(),
                mime: "image/jpeg".to_string(),
                bytes: bytes.to_vec(),
                path: PathBuf::from(format!("/photos/{name}")),
            },
            preview: None,
        }
    }

    fn sample_result() -> MeasurementResult {
        MeasurementResult {
            measurements: Measurements {
                estimated_height_cm: 170.2,
                shoulder_width_cm: 45.0,
                arm_length_cm: 60.5,
                leg_length_cm: 95.3,
            },
            views_used: 3,
            accuracy_note: "high".to_string(),
        }
    }

    fn filled() -> Estimation {
        let mut state = Estimation::new();
        for view in View::ALL {
            let (next, cmd) = state.step(Event::Select(view, selection(view.field_name(), view.field_name().as_bytes())));
            assert!(cmd.is_none());
            state = next;
        }
        state
    }

    fn submit(state: Estimation) -> (Estimation, RequestId) {
        match state.step(Event::Estimate) {
            (state, Some(Command::Submit { request, .. })) => (state, request),
            other => panic!("expected submit, got {:?}", other.1),
        }
    }

    #[test]
    fn test_missing_images_never_submits() {
        for count in 0..3 {
            let mut state = Estimation::new();
            for view in View::ALL.into_iter().take(count) {
                state = state.step(Event::Select(view, selection("x.jpg", b"x"))).0;
            }
            assert!(!state.can_estimate());

            let (state, cmd) = state.step(Event::Estimate);
            assert!(cmd.is_none());
            assert_eq!(state.error(), Some(&EstimateError::MissingImages(count)));
            assert_eq!(state.error().unwrap().user_message(), error::MISSING_IMAGES_MESSAGE);
        }
    }

    #[test]
    fn test_submit_carries_each_slot_payload() {
        let (state, cmd) = filled().step(Event::Estimate);
        let Some(Command::Submit { images, .. }) = cmd else {
            panic!("expected submit");
        };
        for (view, file) in images.parts() {
            assert_eq!(file.bytes, view.field_name().as_bytes());
        }
        assert!(state.is_submitting());
        assert!(!state.can_estimate());
    }

    #[test]
    fn test_second_trigger_while_in_flight_is_ignored() {
        let (state, _) = submit(filled());
        let (state, cmd) = state.step(Event::Estimate);
        assert!(cmd.is_none());
        assert!(state.is_submitting());
    }

    #[test]
    fn test_success_then_failure_discards_result() {
        let (state, request) = submit(filled());
        let (state, _) = state.step(Event::Completed { request, outcome: Ok(sample_result()) });
        assert_eq!(state.result(), Some(&sample_result()));

        let (state, request) = submit(state);
        assert!(state.result().is_none(), "new request clears the previous result");

        let (state, _) = state.step(Event::Completed {
            request,
            outcome: Err(EstimateError::RemoteStatus(500)),
        });
        assert!(state.result().is_none());
        assert_eq!(state.error().and_then(EstimateError::status), Some(500));
        assert_eq!(state.error().unwrap().user_message(), error::GENERIC_FAILURE_MESSAGE);
        assert!(state.can_estimate());
    }

    #[test]
    fn test_repeat_submissions_get_fresh_ids() {
        let (state, first) = submit(filled());
        let (state, _) = state.step(Event::Completed { request: first, outcome: Ok(sample_result()) });
        let (_, second) = submit(state);
        assert_ne!(first, second);
    }

    #[test]
    fn test_cancel_aborts_and_ignores_late_completion() {
        let (state, request) = submit(filled());
        let (state, cmd) = state.step(Event::Cancel);
        assert_eq!(cmd, Some(Command::Abort { request }));
        assert_eq!(state.phase(), &Phase::Idle);

        let (state, _) = state.step(Event::Completed { request, outcome: Ok(sample_result()) });
        assert_eq!(state.phase(), &Phase::Idle);

        let (_, cmd) = state.step(Event::Cancel);
        assert!(cmd.is_none());
    }

    #[test]
    fn test_clear_empties_slot_and_disables_trigger() {
        let (state, _) = filled().step(Event::Clear(View::Side));
        assert!(state.slot(View::Side).is_none());
        assert_eq!(state.filled_count(), 2);
        assert!(!state.can_estimate());
    }

    #[test]
    fn test_replacing_a_slot_drops_old_selection() {
        let state = filled();
        let (state, _) = state.step(Event::Select(View::Front, selection("new.jpg", b"new")));
        assert_eq!(state.slot(View::Front).unwrap().file.name, "new.jpg");
        let (_, cmd) = state.step(Event::Estimate);
        let Some(Command::Submit { images, .. }) = cmd else {
            panic!("expected submit");
        };
        assert_eq!(images.front.bytes, b"new");
    }
}
