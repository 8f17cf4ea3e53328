use serde::{Deserialize, Deserializer, Serialize};

pub const SERVICE_NAME: &str = "ClaimCompass API";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const UNKNOWN: &str = "Unknown";
pub const NO_DAMAGE_SUMMARY: &str = "Unable to assess damage";
pub const NO_COST_ESTIMATE: &str = "Unable to estimate";

/// Vehicle identification plus damage assessment, as produced by the vision
/// model and relayed to clients.
///
/// Missing, `null` or blank fields deserialize to their documented defaults,
/// so both the service (reading model output) and the client (reading the
/// service response) see the same normalised values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleAssessment {
    #[serde(default = "unknown", deserialize_with = "unknown_if_blank")]
    pub make: String,
    #[serde(default = "unknown", deserialize_with = "unknown_if_blank")]
    pub model: String,
    #[serde(default = "unknown", deserialize_with = "unknown_if_blank")]
    pub color: String,
    #[serde(default = "no_damage_summary", deserialize_with = "damage_summary_if_blank")]
    pub damage_summary: String,
    #[serde(default = "no_cost_estimate", deserialize_with = "cost_estimate_if_blank")]
    pub repair_cost_estimate: String,
}

impl VehicleAssessment {
    /// "Make Model" as shown in the vehicle field of the results view.
    pub fn vehicle(&self) -> String {
        format!("{} {}", self.make, self.model)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    #[serde(flatten)]
    pub assessment: VehicleAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResponse {
    pub fn success(assessment: VehicleAssessment) -> Self {
        Self {
            success: true,
            assessment,
            error: None,
        }
    }

    /// Returned with `200` when no model credentials are configured.
    pub fn analysis_unavailable() -> Self {
        Self {
            success: false,
            assessment: VehicleAssessment {
                make: unknown(),
                model: unknown(),
                color: unknown(),
                damage_summary: "OpenAI API key not configured. Please set OPENAI_API_KEY environment variable.".to_string(),
                repair_cost_estimate: "Unable to estimate without API key".to_string(),
            },
            error: Some("OpenAI API key not configured".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiEndpoints {
    pub analyze: &'static str,
    pub health: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApiInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub endpoints: ApiEndpoints,
}

impl ApiInfo {
    pub fn current() -> Self {
        Self {
            service: SERVICE_NAME,
            version: SERVICE_VERSION,
            status: "healthy",
            endpoints: ApiEndpoints {
                analyze: "/api/analyze",
                health: "/health",
            },
        }
    }
}

// ── Field defaults ───────────────────────────────────────────────────────────

fn unknown() -> String {
    UNKNOWN.to_string()
}

fn no_damage_summary() -> String {
    NO_DAMAGE_SUMMARY.to_string()
}

fn no_cost_estimate() -> String {
    NO_COST_ESTIMATE.to_string()
}

fn non_blank_or<'de, D>(deserializer: D, fallback: fn() -> String) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(fallback))
}

fn unknown_if_blank<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    non_blank_or(d, unknown)
}

fn damage_summary_if_blank<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    non_blank_or(d, no_damage_summary)
}

fn cost_estimate_if_blank<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    non_blank_or(d, no_cost_estimate)
}
