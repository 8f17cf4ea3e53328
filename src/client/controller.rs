use chrono::Local;
use serde_json::Value;

use crate::client::{
    AnalyzeTransport, ClientError, ImageFile, Report, ServerReply, Submission,
    DEFAULT_FAILURE_MESSAGE,
};
use crate::models::VehicleAssessment;

/// The mutually exclusive modes of the analysis form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Idle,
    Loading,
    Results(RenderedResult),
    Error(String),
}

/// The four text fields shown in the results view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResult {
    pub vehicle: String,
    pub color: String,
    pub damage_summary: String,
    pub repair_cost_estimate: String,
}

impl From<&VehicleAssessment> for RenderedResult {
    fn from(a: &VehicleAssessment) -> Self {
        Self {
            vehicle: a.vehicle(),
            color: a.color.clone(),
            damage_summary: a.damage_summary.clone(),
            repair_cost_estimate: a.repair_cost_estimate.clone(),
        }
    }
}

/// A submission that has left the form and awaits its response.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub generation: u64,
    pub submission: Submission,
}

/// Drives one analysis form: owns its inputs, its view state and the last
/// successful result. Each controller is independent, so concurrent sessions
/// never share a result slot.
pub struct FormController<T> {
    transport: T,
    file: Option<ImageFile>,
    url: Option<String>,
    view: ViewState,
    last_result: Option<VehicleAssessment>,
    generation: u64,
}

impl<T: AnalyzeTransport> FormController<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            file: None,
            url: None,
            view: ViewState::Idle,
            last_result: None,
            generation: 0,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn last_result(&self) -> Option<&VehicleAssessment> {
        self.last_result.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.view == ViewState::Loading
    }

    pub fn file(&self) -> Option<&ImageFile> {
        self.file.as_ref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn select_file(&mut self, file: ImageFile) {
        self.url = None;
        self.file = Some(file);
    }

    pub fn select_url(&mut self, url: impl Into<String>) {
        self.file = None;
        self.url = Some(url.into());
    }

    /// Loads both form fields as-is, e.g. from command-line arguments.
    /// Unlike the `select_*` methods this keeps whatever the other field holds,
    /// leaving conflicting input to be caught at submit time.
    pub fn fill(&mut self, file: Option<ImageFile>, url: Option<String>) {
        self.file = file;
        self.url = url;
    }

    pub fn clear_inputs(&mut self) {
        self.file = None;
        self.url = None;
    }

    /// Validates the inputs and starts a new submission. Validation failures
    /// move the form to the error view and return the error; nothing is sent.
    ///
    /// Every attempt, valid or not, supersedes submissions still in flight,
    /// so a late response never replaces a newer validation error.
    pub fn begin_submit(&mut self) -> Result<PendingSubmission, ClientError> {
        self.generation += 1;
        let submission = match Submission::from_inputs(self.file.clone(), self.url.as_deref()) {
            Ok(submission) => submission,
            Err(e) => {
                self.view = ViewState::Error(e.to_string());
                return Err(e);
            }
        };

        self.view = ViewState::Loading;
        tracing::debug!(generation = self.generation, "submission started");
        Ok(PendingSubmission {
            generation: self.generation,
            submission,
        })
    }

    /// Applies the outcome of `pending`. Outcomes of superseded submissions
    /// are dropped and leave the form untouched.
    pub fn complete(
        &mut self,
        pending: &PendingSubmission,
        outcome: Result<ServerReply, String>,
    ) -> Result<&VehicleAssessment, ClientError> {
        if pending.generation != self.generation {
            tracing::debug!(
                stale = pending.generation,
                current = self.generation,
                "discarding superseded response"
            );
            return Err(ClientError::Superseded);
        }

        match interpret(outcome) {
            Ok(assessment) => {
                self.view = ViewState::Results(RenderedResult::from(&assessment));
                Ok(self.last_result.insert(assessment))
            }
            Err(e) => {
                tracing::warn!(error = %e, "analysis failed");
                self.view = ViewState::Error(e.to_string());
                Err(e)
            }
        }
    }

    /// Validates, sends and applies one submission.
    pub async fn submit(&mut self) -> Result<&VehicleAssessment, ClientError> {
        if self.is_busy() {
            return Err(ClientError::Busy);
        }
        let pending = self.begin_submit()?;
        let outcome = self.transport.analyze(&pending.submission).await;
        self.complete(&pending, outcome)
    }

    /// Renders the last successful result as a plain-text report.
    pub fn download_report(&self) -> Result<Report, ClientError> {
        let assessment = self.last_result.as_ref().ok_or(ClientError::NoResult)?;
        Ok(Report::render(assessment, Local::now()))
    }
}

fn interpret(outcome: Result<ServerReply, String>) -> Result<VehicleAssessment, ClientError> {
    let reply = outcome.map_err(ClientError::Network)?;
    let succeeded = reply.body.get("success").and_then(Value::as_bool) == Some(true);

    if !reply.is_success() || !succeeded {
        return Err(ClientError::Server {
            status: reply.status,
            message: failure_message(&reply.body),
        });
    }

    serde_json::from_value(reply.body).map_err(|e| ClientError::Server {
        status: reply.status,
        message: format!("Unexpected response: {}", e),
    })
}

fn failure_message(body: &Value) -> String {
    ["detail", "error"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NETWORK_FAILURE_MESSAGE;
    use crate::models::UNKNOWN;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeTransport {
        outcome: Result<ServerReply, String>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeTransport {
        fn replying(status: u16, body: Value) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let transport = Self {
                outcome: Ok(ServerReply { status, body }),
                calls: calls.clone(),
            };
            (transport, calls)
        }
    }

    #[async_trait]
    impl AnalyzeTransport for FakeTransport {
        async fn analyze(&self, _submission: &Submission) -> Result<ServerReply, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn full_body() -> Value {
        json!({
            "success": true,
            "make": "Subaru",
            "model": "Outback",
            "color": "Green",
            "damage_summary": "Rear quarter panel dented.",
            "repair_cost_estimate": "$900 - $1,400"
        })
    }

    fn jpeg() -> ImageFile {
        ImageFile::new("car.jpg", "image/jpeg", vec![0xff, 0xd8])
    }

    #[tokio::test]
    async fn neither_input_fails_without_request() {
        let (transport, calls) = FakeTransport::replying(200, full_body());
        let mut form = FormController::new(transport);

        let err = form.submit().await.unwrap_err();
        assert_eq!(err, ClientError::MissingInput);
        assert!(matches!(form.view(), ViewState::Error(msg) if msg.starts_with("Please provide")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn both_inputs_fail_without_request() {
        let (transport, calls) = FakeTransport::replying(200, full_body());
        let mut form = FormController::new(transport);
        form.fill(Some(jpeg()), Some("https://example.com/car.jpg".into()));

        let err = form.submit().await.unwrap_err();
        assert_eq!(err, ClientError::BothInputs);
        assert!(matches!(form.view(), ViewState::Error(msg) if msg.contains("not both")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn selecting_one_input_clears_the_other() {
        let (transport, _) = FakeTransport::replying(200, full_body());
        let mut form = FormController::new(transport);

        form.select_file(jpeg());
        form.select_url("https://example.com/car.jpg");
        assert!(form.file().is_none());
        assert_eq!(form.url(), Some("https://example.com/car.jpg"));

        form.select_file(jpeg());
        assert!(form.url().is_none());
        assert!(form.file().is_some());
    }

    #[tokio::test]
    async fn success_renders_all_fields() {
        let (transport, calls) = FakeTransport::replying(200, full_body());
        let mut form = FormController::new(transport);
        form.select_file(jpeg());

        let result = form.submit().await.unwrap().clone();
        assert_eq!(result.make, "Subaru");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            form.view(),
            &ViewState::Results(RenderedResult {
                vehicle: "Subaru Outback".into(),
                color: "Green".into(),
                damage_summary: "Rear quarter panel dented.".into(),
                repair_cost_estimate: "$900 - $1,400".into(),
            })
        );
    }

    #[tokio::test]
    async fn missing_vehicle_fields_render_unknown() {
        let (transport, _) = FakeTransport::replying(
            200,
            json!({
                "success": true,
                "damage_summary": "Broken mirror.",
                "repair_cost_estimate": "$150"
            }),
        );
        let mut form = FormController::new(transport);
        form.select_url("https://example.com/car.jpg");
        form.submit().await.unwrap();

        let ViewState::Results(rendered) = form.view() else {
            panic!("expected results view, got {:?}", form.view());
        };
        assert_eq!(rendered.vehicle, format!("{} {}", UNKNOWN, UNKNOWN));
        assert_eq!(rendered.color, UNKNOWN);
        assert_eq!(rendered.damage_summary, "Broken mirror.");
    }

    #[tokio::test]
    async fn server_error_surfaces_detail() {
        let (transport, _) = FakeTransport::replying(
            400,
            json!({"detail": "Failed to download image: upstream returned 404 Not Found"}),
        );
        let mut form = FormController::new(transport);
        form.select_url("https://example.com/missing.jpg");

        let err = form.submit().await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Server {
                status: 400,
                message: "Failed to download image: upstream returned 404 Not Found".into()
            }
        );
        assert!(matches!(form.view(), ViewState::Error(msg) if msg.contains("404")));
        assert!(form.last_result().is_none());
    }

    #[tokio::test]
    async fn unsuccessful_body_uses_error_field_then_default() {
        let (transport, _) = FakeTransport::replying(
            200,
            json!({"success": false, "error": "OpenAI API key not configured"}),
        );
        let mut form = FormController::new(transport);
        form.select_file(jpeg());
        form.submit().await.unwrap_err();
        assert_eq!(
            form.view(),
            &ViewState::Error("OpenAI API key not configured".into())
        );

        let (transport, _) = FakeTransport::replying(502, Value::Null);
        let mut form = FormController::new(transport);
        form.select_file(jpeg());
        form.submit().await.unwrap_err();
        assert_eq!(form.view(), &ViewState::Error(DEFAULT_FAILURE_MESSAGE.into()));
    }

    #[tokio::test]
    async fn transport_failure_shows_network_message() {
        let transport = FakeTransport {
            outcome: Err("connection refused".into()),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let mut form = FormController::new(transport);
        form.select_file(jpeg());

        let err = form.submit().await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
        assert_eq!(form.view(), &ViewState::Error(NETWORK_FAILURE_MESSAGE.into()));
    }

    #[tokio::test]
    async fn report_requires_a_result() {
        let (transport, _) = FakeTransport::replying(200, full_body());
        let mut form = FormController::new(transport);
        assert_eq!(form.download_report().unwrap_err(), ClientError::NoResult);

        form.select_file(jpeg());
        form.submit().await.unwrap();
        let report = form.download_report().unwrap();
        for field in [
            "Subaru",
            "Outback",
            "Green",
            "Rear quarter panel dented.",
            "$900 - $1,400",
        ] {
            assert!(report.contents.contains(field), "missing {field}");
        }
        assert!(report.file_name.starts_with("car-damage-report-"));
    }

    #[tokio::test]
    async fn failed_analysis_keeps_previous_result() {
        let (transport, _) = FakeTransport::replying(200, full_body());
        let mut form = FormController::new(transport);
        form.select_file(jpeg());
        form.submit().await.unwrap();

        let pending = form.begin_submit().unwrap();
        form.complete(&pending, Err("reset".into())).unwrap_err();
        assert_eq!(form.last_result().unwrap().make, "Subaru");
        assert!(form.download_report().is_ok());
    }

    #[test]
    fn superseded_response_is_ignored() {
        let (transport, _) = FakeTransport::replying(200, full_body());
        let mut form = FormController::new(transport);
        form.select_url("https://example.com/first.jpg");
        let first = form.begin_submit().unwrap();
        form.select_url("https://example.com/second.jpg");
        let second = form.begin_submit().unwrap();

        let newer = json!({"success": true, "make": "Mazda", "model": "CX-5"});
        form.complete(&second, Ok(ServerReply { status: 200, body: newer }))
            .unwrap();

        let late = form.complete(&first, Ok(ServerReply { status: 200, body: full_body() }));
        assert_eq!(late.unwrap_err(), ClientError::Superseded);
        assert_eq!(form.last_result().unwrap().make, "Mazda");
        assert!(matches!(form.view(), ViewState::Results(r) if r.vehicle == "Mazda CX-5"));
    }

    #[test]
    fn late_response_does_not_replace_validation_error() {
        let (transport, _) = FakeTransport::replying(200, full_body());
        let mut form = FormController::new(transport);
        form.select_url("https://example.com/first.jpg");
        let first = form.begin_submit().unwrap();

        form.fill(Some(jpeg()), Some("https://example.com/second.jpg".into()));
        assert_eq!(form.begin_submit().unwrap_err(), ClientError::BothInputs);

        let late = form.complete(&first, Ok(ServerReply { status: 200, body: full_body() }));
        assert_eq!(late.unwrap_err(), ClientError::Superseded);
        assert!(matches!(form.view(), ViewState::Error(msg) if msg.contains("not both")));
        assert!(form.last_result().is_none());
    }

    #[tokio::test]
    async fn loading_blocks_resubmission() {
        let (transport, calls) = FakeTransport::replying(200, full_body());
        let mut form = FormController::new(transport);
        form.select_file(jpeg());
        form.begin_submit().unwrap();
        assert!(form.is_busy());

        assert_eq!(form.submit().await.unwrap_err(), ClientError::Busy);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
