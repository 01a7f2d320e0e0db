use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::provider::ScormError;

/// Backend field holding the serialized suspend data
pub const SUSPEND_DATA_FIELD: &str = "cmi.suspend_data";

/// Suspend data mirror: a JSON object keyed by consumer-chosen names
pub type SuspendData = Map<String, Value>;

/// Protocol version spoken with the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScormVersion {
    /// SCORM 1.2, the legacy field-path set (`cmi.core.*`)
    Scorm12,
    /// SCORM 2004, any edition
    Scorm2004,
}

impl ScormVersion {
    /// Version string as the backend expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scorm12 => "1.2",
            Self::Scorm2004 => "2004",
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Scorm12)
    }

    /// Field holding the learner's display name
    pub fn learner_name_field(&self) -> &'static str {
        match self {
            Self::Scorm12 => "cmi.core.student_name",
            Self::Scorm2004 => "cmi.learner_name",
        }
    }

    /// Field the backend stores the completion status under
    pub fn status_field(&self) -> &'static str {
        match self {
            Self::Scorm12 => "cmi.core.lesson_status",
            Self::Scorm2004 => "cmi.completion_status",
        }
    }

    /// Field the backend writes the exit mode to on quit
    pub fn exit_field(&self) -> &'static str {
        match self {
            Self::Scorm12 => "cmi.core.exit",
            Self::Scorm2004 => "cmi.exit",
        }
    }

    /// Score field path (`raw`, `min` or `max`); legacy paths insert `.core`
    pub fn score_field(&self, part: &str) -> String {
        let core = if self.is_legacy() { ".core" } else { "" };
        format!("cmi{}.score.{}", core, part)
    }
}

impl FromStr for ScormVersion {
    type Err = ScormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "1.2" {
            Ok(Self::Scorm12)
        } else if s.starts_with("2004") {
            Ok(Self::Scorm2004)
        } else {
            Err(ScormError::UnsupportedVersion(s.to_string()))
        }
    }
}

impl fmt::Display for ScormVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Learner progress for the current content unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Passed,
    Completed,
    Failed,
    Incomplete,
    Browsed,
    #[serde(rename = "not attempted")]
    NotAttempted,
    #[default]
    Unknown,
}

impl CompletionStatus {
    pub const ALL: [CompletionStatus; 7] = [
        Self::Passed,
        Self::Completed,
        Self::Failed,
        Self::Incomplete,
        Self::Browsed,
        Self::NotAttempted,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Incomplete => "incomplete",
            Self::Browsed => "browsed",
            Self::NotAttempted => "not attempted",
            Self::Unknown => "unknown",
        }
    }

    /// Map a value read back from the backend; anything unrecognised is `Unknown`
    pub fn from_backend(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }

    /// Whether the learner is done with the unit
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Passed | Self::Completed)
    }
}

impl FromStr for CompletionStatus {
    type Err = ScormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ScormError::InvalidStatus(s.to_string()))
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locally mirrored session state handed to consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScormState {
    pub api_connected: bool,
    pub learner_name: String,
    pub completion_status: CompletionStatus,
    pub suspend_data: SuspendData,
    pub scorm_version: String,
}

/// Score submission; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Score {
    /// Numeric parts paired with their field suffix, in write order
    pub fn numeric_parts(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        [("raw", self.value), ("min", self.min), ("max", self.max)]
            .into_iter()
            .filter_map(|(part, v)| v.map(|v| (part, v)))
    }
}

/// Decode the backend's suspend data field
pub fn decode_suspend_data(raw: Option<&str>) -> Result<SuspendData, ScormError> {
    match raw {
        None => Ok(SuspendData::new()),
        Some(s) if s.trim().is_empty() => Ok(SuspendData::new()),
        Some(s) => match serde_json::from_str::<Value>(s)? {
            Value::Object(map) => Ok(map),
            other => Err(ScormError::SuspendDataNotObject(type_name(&other))),
        },
    }
}

/// Encode the suspend data mirror for the backend
pub fn encode_suspend_data(data: &SuspendData) -> Result<String, ScormError> {
    serde_json::to_string(data).map_err(ScormError::SuspendDataEncode)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_parsing() {
        assert_eq!("1.2".parse::<ScormVersion>().unwrap(), ScormVersion::Scorm12);
        assert_eq!("2004".parse::<ScormVersion>().unwrap(), ScormVersion::Scorm2004);
        assert_eq!(
            "2004 4th Edition".parse::<ScormVersion>().unwrap(),
            ScormVersion::Scorm2004
        );
        assert!(matches!(
            "1.1".parse::<ScormVersion>(),
            Err(ScormError::UnsupportedVersion(v)) if v == "1.1"
        ));
    }

    #[test]
    fn test_field_paths_per_version() {
        assert_eq!(ScormVersion::Scorm12.learner_name_field(), "cmi.core.student_name");
        assert_eq!(ScormVersion::Scorm2004.learner_name_field(), "cmi.learner_name");
        assert_eq!(ScormVersion::Scorm12.score_field("raw"), "cmi.core.score.raw");
        assert_eq!(ScormVersion::Scorm2004.score_field("max"), "cmi.score.max");
    }

    #[test]
    fn test_status_accepts_exactly_seven_values() {
        for status in CompletionStatus::ALL {
            assert_eq!(status.as_str().parse::<CompletionStatus>().unwrap(), status);
        }
        for bad in ["", "done", "Passed", "not_attempted"] {
            assert!(bad.parse::<CompletionStatus>().is_err(), "{bad:?} must be rejected");
        }
    }

    #[test]
    fn test_status_serde_uses_backend_strings() {
        let json = serde_json::to_string(&CompletionStatus::NotAttempted).unwrap();
        assert_eq!(json, "\"not attempted\"");
        assert_eq!(CompletionStatus::from_backend(Some("garbage")), CompletionStatus::Unknown);
        assert_eq!(CompletionStatus::from_backend(None), CompletionStatus::Unknown);
    }

    #[test]
    fn test_decode_suspend_data() {
        assert!(decode_suspend_data(None).unwrap().is_empty());
        assert!(decode_suspend_data(Some("")).unwrap().is_empty());

        let data = decode_suspend_data(Some(r#"{"page":3,"seen":[1,2]}"#)).unwrap();
        assert_eq!(data["page"], json!(3));

        assert!(matches!(
            decode_suspend_data(Some("[1,2]")),
            Err(ScormError::SuspendDataNotObject("array"))
        ));
        assert!(matches!(
            decode_suspend_data(Some("{not json")),
            Err(ScormError::SuspendDataDecode(_))
        ));
    }

    #[test]
    fn test_score_numeric_parts_skip_absent_fields() {
        let score = Score {
            value: Some(80.0),
            max: Some(100.0),
            ..Default::default()
        };
        let parts: Vec<_> = score.numeric_parts().collect();
        assert_eq!(parts, vec![("raw", 80.0), ("max", 100.0)]);
    }
}
