//! Prediction workflow state machine.
//!
//! `Select -> {ManualForm, DocumentUpload} -> Result`, cycling back to
//! `Select` on reset. Every transition takes the current snapshot and
//! returns a new one; nothing here performs I/O except [`submit_with`],
//! which drives one submission through a [`PredictionService`].

use chrono::NaiveDate;

use crate::{
    api::PredictionResult,
    error::ClientError,
    features::FeatureDeriver,
    presenter::{ResultView, present},
    request::{Document, FeatureVector, PredictionInputs, PredictionMode, SubmissionPayload},
    traits::PredictionService,
};

/// Method picked on the selection screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Daily,
    Hourly,
    Document,
}

/// Where a displayed result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOrigin {
    ManualForm,
    DocumentUpload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Select,
    ManualForm {
        mode: PredictionMode,
    },
    /// Mode stays unbound until picked inside the upload step.
    DocumentUpload {
        mode: Option<PredictionMode>,
    },
    Result {
        origin: ResultOrigin,
    },
}

/// A single form field change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEdit {
    Date(NaiveDate),
    WeatherSituation(u8),
    Temperature(f64),
    Humidity(f64),
    Windspeed(f64),
    WorkingDay(bool),
    Holiday(bool),
    Hour(u8),
}

/// User actions that do not start a submission.
#[derive(Debug, Clone)]
pub enum Event {
    ChooseMethod(Method),
    Edit(InputEdit),
    ChooseDocumentMode(PredictionMode),
    /// Document already checked by [`Document::new`]
    AttachDocument(Document),
    /// "New prediction" / "Change method"
    Reset,
}

/// Identifies one in-flight submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone)]
pub struct Submission {
    pub ticket: Ticket,
    pub payload: SubmissionPayload,
}

/// Outcome of a submit action.
#[derive(Debug, Clone)]
pub enum SubmitAction {
    /// The workflow is now submitting; send the payload.
    Started {
        workflow: Workflow,
        submission: Submission,
    },
    /// Nothing to do: a submission is in flight or the step has no form.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    step: Step,
    inputs: PredictionInputs,
    document: Option<Document>,
    result: Option<PredictionResult>,
    last_error: Option<ClientError>,
    in_flight: Option<Ticket>,
    next_ticket: u64,
    today: NaiveDate,
    deriver: FeatureDeriver,
}

impl Workflow {
    /// Initial state; form defaults are dated `today`.
    pub fn new(today: NaiveDate, deriver: FeatureDeriver) -> Self {
        Self {
            step: Step::Select,
            inputs: PredictionInputs::defaults_for(today),
            document: None,
            result: None,
            last_error: None,
            in_flight: None,
            next_ticket: 0,
            today,
            deriver,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn inputs(&self) -> &PredictionInputs {
        &self.inputs
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Mode bound in the current step, if any.
    pub fn mode(&self) -> Option<PredictionMode> {
        match self.step {
            Step::ManualForm { mode } => Some(mode),
            Step::DocumentUpload { mode } => mode,
            Step::Result { .. } => self.result.as_ref().map(|r| r.mode),
            Step::Select => None,
        }
    }

    /// Display fields for the current result.
    pub fn result_view(&self) -> Option<ResultView> {
        let Step::Result { origin } = self.step else {
            return None;
        };
        let result = self.result.as_ref()?;
        let inputs = match origin {
            ResultOrigin::ManualForm => Some(&self.inputs),
            ResultOrigin::DocumentUpload => None,
        };
        Some(present(result, inputs))
    }

    /// Apply a non-submitting user action. Actions that do not apply to the
    /// current step leave the snapshot unchanged, and only `Reset` applies
    /// while a submission is in flight.
    pub fn update(&self, event: Event) -> Self {
        if let Event::Reset = event {
            // Ticket numbering survives so the abandoned submission stays stale.
            let mut fresh = Self::new(self.today, self.deriver);
            fresh.next_ticket = self.next_ticket;
            return fresh;
        }
        if self.in_flight.is_some() {
            tracing::debug!("Submission in flight, ignoring {:?}", event);
            return self.clone();
        }

        let mut next = self.clone();
        match (self.step, event) {
            (Step::Select, Event::ChooseMethod(method)) => {
                next.step = match method {
                    Method::Daily => Step::ManualForm {
                        mode: PredictionMode::Daily,
                    },
                    Method::Hourly => Step::ManualForm {
                        mode: PredictionMode::Hourly,
                    },
                    Method::Document => Step::DocumentUpload { mode: None },
                };
            }
            (Step::ManualForm { .. }, Event::Edit(edit)) => {
                next.apply_edit(edit);
                next.last_error = None;
            }
            (Step::DocumentUpload { .. }, Event::ChooseDocumentMode(mode)) => {
                next.step = Step::DocumentUpload { mode: Some(mode) };
            }
            (Step::DocumentUpload { .. }, Event::AttachDocument(document)) => {
                tracing::debug!("{} selected", document.file_name());
                next.document = Some(document);
                next.last_error = None;
            }
            (step, event) => {
                tracing::debug!("Ignoring {:?} in step {:?}", event, step);
            }
        }
        next
    }

    fn apply_edit(&mut self, edit: InputEdit) {
        let inputs = &mut self.inputs;
        match edit {
            InputEdit::Date(date) => inputs.date = date,
            InputEdit::WeatherSituation(value) => inputs.weather_situation = value,
            InputEdit::Temperature(value) => inputs.temperature = value,
            InputEdit::Humidity(value) => inputs.humidity = value,
            InputEdit::Windspeed(value) => inputs.windspeed = value,
            InputEdit::WorkingDay(value) => inputs.working_day = value,
            InputEdit::Holiday(value) => inputs.holiday = value,
            InputEdit::Hour(value) => inputs.hour = value,
        }
    }

    /// Start a submission from the current form.
    ///
    /// Returns an error, leaving this snapshot as it is, when the inputs are
    /// invalid or incomplete.
    pub fn submit(&self) -> Result<SubmitAction, ClientError> {
        if self.in_flight.is_some() {
            tracing::debug!("Submission already in flight, ignoring");
            return Ok(SubmitAction::Ignored);
        }

        let payload = match self.step {
            Step::ManualForm { mode } => SubmissionPayload::Features {
                mode,
                vector: FeatureVector::build(&self.inputs, mode, &self.deriver)?,
            },
            Step::DocumentUpload { mode } => {
                let document = self
                    .document
                    .clone()
                    .ok_or(ClientError::MissingInput("document"))?;
                let mode = mode.ok_or(ClientError::MissingInput("prediction type"))?;
                SubmissionPayload::Document { mode, document }
            }
            Step::Select | Step::Result { .. } => return Ok(SubmitAction::Ignored),
        };

        let ticket = Ticket(self.next_ticket);
        let mut workflow = self.clone();
        workflow.next_ticket += 1;
        workflow.in_flight = Some(ticket);
        workflow.result = None;
        workflow.last_error = None;

        tracing::info!("Submitting {} prediction via {}", payload.mode(), payload.endpoint());
        Ok(SubmitAction::Started {
            workflow,
            submission: Submission { ticket, payload },
        })
    }

    /// Apply the outcome of a submission.
    ///
    /// Outcomes for a ticket that is no longer in flight (the workflow was
    /// reset meanwhile) are discarded.
    pub fn settle(&self, ticket: Ticket, outcome: Result<PredictionResult, ClientError>) -> Self {
        if self.in_flight != Some(ticket) {
            tracing::debug!("Discarding stale submission outcome {:?}", ticket);
            return self.clone();
        }

        let mut next = self.clone();
        next.in_flight = None;
        match outcome {
            Ok(result) => {
                let origin = match self.step {
                    Step::DocumentUpload { .. } => ResultOrigin::DocumentUpload,
                    _ => ResultOrigin::ManualForm,
                };
                tracing::info!("Prediction received: {:.0} ({})", result.prediction, result.mode);
                next.step = Step::Result { origin };
                next.result = Some(result);
            }
            Err(err) => {
                tracing::warn!("Prediction failed: {}", err);
                next.last_error = Some(err);
            }
        }
        next
    }
}

/// Submit the current form through `service` and return the settled state.
///
/// Local validation errors are returned without contacting the service.
/// Service failures are recorded in the returned snapshot's `last_error`.
pub async fn submit_with<S: PredictionService>(
    workflow: &Workflow,
    service: &S,
) -> Result<Workflow, ClientError> {
    match workflow.submit()? {
        SubmitAction::Ignored => Ok(workflow.clone()),
        SubmitAction::Started {
            workflow: pending,
            submission,
        } => {
            let outcome = service.submit(&submission.payload).await;
            Ok(pending.settle(submission.ticket, outcome))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    fn workflow() -> Workflow {
        Workflow::new(today(), FeatureDeriver::default())
    }

    fn pdf() -> Document {
        Document::new("weather.pdf", b"%PDF-1.4 test".to_vec()).unwrap()
    }

    fn ok(mode: PredictionMode) -> Result<PredictionResult, ClientError> {
        Ok(PredictionResult {
            prediction: 321.6,
            mode,
            extracted_data: None,
        })
    }

    fn started(action: SubmitAction) -> (Workflow, Submission) {
        match action {
            SubmitAction::Started {
                workflow,
                submission,
            } => (workflow, submission),
            SubmitAction::Ignored => panic!("expected a started submission"),
        }
    }

    #[test]
    fn test_initial_state() {
        let wf = workflow();
        assert_eq!(wf.step(), Step::Select);
        assert_eq!(wf.inputs(), &PredictionInputs::defaults_for(today()));
        assert!(wf.result().is_none());
        assert!(!wf.is_submitting());
        assert_eq!(wf.mode(), None);
    }

    #[test]
    fn test_choose_methods() {
        let daily = workflow().update(Event::ChooseMethod(Method::Daily));
        assert_eq!(
            daily.step(),
            Step::ManualForm {
                mode: PredictionMode::Daily
            }
        );

        let hourly = workflow().update(Event::ChooseMethod(Method::Hourly));
        assert_eq!(hourly.mode(), Some(PredictionMode::Hourly));

        let doc = workflow().update(Event::ChooseMethod(Method::Document));
        assert_eq!(doc.step(), Step::DocumentUpload { mode: None });
        assert_eq!(doc.mode(), None);
    }

    #[test]
    fn test_update_returns_new_snapshot() {
        let wf = workflow();
        let next = wf.update(Event::ChooseMethod(Method::Daily));
        assert_eq!(wf.step(), Step::Select, "original snapshot is untouched");
        assert_ne!(next.step(), wf.step());
    }

    #[test]
    fn test_edits_only_apply_in_manual_form() {
        let wf = workflow().update(Event::Edit(InputEdit::Hour(3)));
        assert_eq!(wf.inputs().hour, 12);

        let wf = wf
            .update(Event::ChooseMethod(Method::Hourly))
            .update(Event::Edit(InputEdit::Hour(3)))
            .update(Event::Edit(InputEdit::Holiday(true)));
        assert_eq!(wf.inputs().hour, 3);
        assert!(wf.inputs().holiday);
    }

    #[test]
    fn test_choose_method_ignored_outside_select() {
        let wf = workflow()
            .update(Event::ChooseMethod(Method::Daily))
            .update(Event::ChooseMethod(Method::Document));
        assert_eq!(wf.mode(), Some(PredictionMode::Daily));
    }

    #[test]
    fn test_invalid_input_rejected_before_submission() {
        let wf = workflow()
            .update(Event::ChooseMethod(Method::Daily))
            .update(Event::Edit(InputEdit::WeatherSituation(5)));

        let err = wf.submit().unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(!wf.is_submitting());
    }

    #[test]
    fn test_submission_guard_ignores_second_submit() {
        let wf = workflow().update(Event::ChooseMethod(Method::Daily));
        let (pending, _) = started(wf.submit().unwrap());
        assert!(pending.is_submitting());
        assert!(matches!(pending.submit().unwrap(), SubmitAction::Ignored));
    }

    #[test]
    fn test_success_moves_to_result() {
        let wf = workflow().update(Event::ChooseMethod(Method::Hourly));
        let (pending, submission) = started(wf.submit().unwrap());
        assert_eq!(submission.payload.endpoint(), "/predictions/hourly");

        let done = pending.settle(submission.ticket, ok(PredictionMode::Hourly));
        assert_eq!(
            done.step(),
            Step::Result {
                origin: ResultOrigin::ManualForm
            }
        );
        assert!(!done.is_submitting());

        let view = done.result_view().unwrap();
        assert_eq!(view.count, 322);
        assert_eq!(view.time_label.as_deref(), Some("12:00"));
        assert_eq!(view.date_label.as_deref(), Some("Monday, July 15, 2024"));
    }

    #[test]
    fn test_failure_keeps_step_and_values() {
        let wf = workflow()
            .update(Event::ChooseMethod(Method::Daily))
            .update(Event::Edit(InputEdit::Temperature(0.33)));
        let (pending, submission) = started(wf.submit().unwrap());

        let failed = pending.settle(
            submission.ticket,
            Err(ClientError::Service {
                status: 500,
                message: "Prediction failed".into(),
            }),
        );
        assert_eq!(failed.step(), wf.step());
        assert_eq!(failed.inputs(), wf.inputs());
        assert!(!failed.is_submitting(), "guard released on failure");
        assert!(failed.last_error().is_some());

        // Retry is a fresh submission
        assert!(matches!(failed.submit().unwrap(), SubmitAction::Started { .. }));
    }

    #[test]
    fn test_stale_outcome_after_reset_is_discarded() {
        let wf = workflow().update(Event::ChooseMethod(Method::Daily));
        let (pending, submission) = started(wf.submit().unwrap());

        let reset = pending.update(Event::Reset);
        let after = reset.settle(submission.ticket, ok(PredictionMode::Daily));
        assert_eq!(after.step(), Step::Select);
        assert!(after.result().is_none());
    }

    #[test]
    fn test_tickets_are_unique_across_retries() {
        let wf = workflow().update(Event::ChooseMethod(Method::Daily));
        let (pending, first) = started(wf.submit().unwrap());
        let failed = pending.settle(first.ticket, Err(ClientError::Network("x".into())));
        let (_, second) = started(failed.submit().unwrap());
        assert_ne!(first.ticket, second.ticket);
    }

    #[test]
    fn test_old_outcome_ignored_after_reset_and_resubmit() {
        let wf = workflow().update(Event::ChooseMethod(Method::Daily));
        let (pending, old) = started(wf.submit().unwrap());

        let resubmitted = pending
            .update(Event::Reset)
            .update(Event::ChooseMethod(Method::Hourly));
        let (live, new) = started(resubmitted.submit().unwrap());
        assert_ne!(old.ticket, new.ticket);

        let after = live.settle(
            old.ticket,
            Ok(PredictionResult {
                prediction: 999.0,
                mode: PredictionMode::Daily,
                extracted_data: None,
            }),
        );
        assert_eq!(
            after.step(),
            Step::ManualForm {
                mode: PredictionMode::Hourly
            }
        );
        assert!(after.result().is_none());
        assert!(after.is_submitting(), "live submission keeps the guard");

        let done = after.settle(new.ticket, ok(PredictionMode::Hourly));
        assert_eq!(done.result().unwrap().prediction, 321.6);
    }

    #[test]
    fn test_edits_ignored_while_in_flight() {
        let wf = workflow().update(Event::ChooseMethod(Method::Daily));
        let (pending, submission) = started(wf.submit().unwrap());

        let edited = pending
            .update(Event::Edit(InputEdit::Date(
                NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            )))
            .update(Event::Edit(InputEdit::Temperature(0.1)));
        assert_eq!(edited.inputs(), wf.inputs());

        let done = edited.settle(submission.ticket, ok(PredictionMode::Daily));
        assert_eq!(
            done.result_view().unwrap().date_label.as_deref(),
            Some("Monday, July 15, 2024")
        );
    }

    #[test]
    fn test_document_changes_ignored_while_in_flight() {
        let wf = workflow()
            .update(Event::ChooseMethod(Method::Document))
            .update(Event::AttachDocument(pdf()))
            .update(Event::ChooseDocumentMode(PredictionMode::Daily));
        let (pending, _) = started(wf.submit().unwrap());

        let other = Document::new("other.pdf", b"%PDF-1.5".to_vec()).unwrap();
        let changed = pending
            .update(Event::ChooseDocumentMode(PredictionMode::Hourly))
            .update(Event::AttachDocument(other));
        assert_eq!(changed.mode(), Some(PredictionMode::Daily));
        assert_eq!(changed.document().unwrap().file_name(), "weather.pdf");
    }

    #[test]
    fn test_document_requires_file_and_mode() {
        let wf = workflow().update(Event::ChooseMethod(Method::Document));
        assert_eq!(wf.submit().unwrap_err(), ClientError::MissingInput("document"));

        let wf = wf.update(Event::AttachDocument(pdf()));
        assert_eq!(
            wf.submit().unwrap_err(),
            ClientError::MissingInput("prediction type")
        );

        let wf = wf.update(Event::ChooseDocumentMode(PredictionMode::Hourly));
        let (_, submission) = started(wf.submit().unwrap());
        assert_eq!(submission.payload.endpoint(), "/predictions/upload-pdf");
        assert_eq!(submission.payload.mode(), PredictionMode::Hourly);
    }

    #[test]
    fn test_document_result_origin() {
        let wf = workflow()
            .update(Event::ChooseMethod(Method::Document))
            .update(Event::ChooseDocumentMode(PredictionMode::Daily))
            .update(Event::AttachDocument(pdf()));
        let (pending, submission) = started(wf.submit().unwrap());
        let done = pending.settle(submission.ticket, ok(PredictionMode::Daily));

        assert_eq!(
            done.step(),
            Step::Result {
                origin: ResultOrigin::DocumentUpload
            }
        );
        // No extracted data and no manual inputs: no date to show
        assert_eq!(done.result_view().unwrap().date_label, None);
    }

    #[test]
    fn test_reset_clears_everything() {
        let wf = workflow()
            .update(Event::ChooseMethod(Method::Document))
            .update(Event::ChooseDocumentMode(PredictionMode::Daily))
            .update(Event::AttachDocument(pdf()));
        let (pending, submission) = started(wf.submit().unwrap());
        let done = pending.settle(submission.ticket, ok(PredictionMode::Daily));

        let reset = done.update(Event::Reset);
        assert_eq!(reset.step(), Step::Select);
        assert!(reset.document().is_none());
        assert!(reset.result().is_none());
        assert!(reset.last_error().is_none());
        assert_eq!(reset.inputs(), &PredictionInputs::defaults_for(today()));
    }

    #[test]
    fn test_submit_ignored_outside_forms() {
        assert!(matches!(workflow().submit().unwrap(), SubmitAction::Ignored));
    }
}
