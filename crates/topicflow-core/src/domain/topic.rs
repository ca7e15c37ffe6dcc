//! Topic configuration: the resolved, immutable description of one onboarding run.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::{OnboardError, OnboardResult};

/// Suffix appended to every derived raw table name.
pub const RAW_TABLE_SUFFIX: &str = "__raw";

/// Encoding of the topic's message values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    Json,
    Protobuf,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Json => "json",
            ValueType::Protobuf => "protobuf",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = OnboardError;

    fn from_str(s: &str) -> OnboardResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ValueType::Json),
            "protobuf" => Ok(ValueType::Protobuf),
            other => Err(OnboardError::Validation(format!(
                "unknown value type '{other}' (expected json or protobuf)"
            ))),
        }
    }
}

/// Destination pathway for topic data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Streamed into the warehouse load pipeline.
    #[default]
    Realtime,
    /// Landed in object storage and exposed as an external source.
    S3,
}

impl SinkType {
    pub const ALL: [SinkType; 2] = [SinkType::Realtime, SinkType::S3];

    pub fn as_str(&self) -> &'static str {
        match self {
            SinkType::Realtime => "realtime",
            SinkType::S3 => "s3",
        }
    }
}

impl fmt::Display for SinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkType {
    type Err = OnboardError;

    /// Unknown names are a configuration problem, not an input typo the
    /// caller can fix per run, so this reports [`OnboardError::Configuration`].
    fn from_str(s: &str) -> OnboardResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "realtime" => Ok(SinkType::Realtime),
            "s3" => Ok(SinkType::S3),
            other => Err(OnboardError::Configuration(format!(
                "unknown sink type '{other}' (expected realtime or s3)"
            ))),
        }
    }
}

/// Unvalidated input as it arrives from the CLI or environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTopicInput {
    pub topic: Option<String>,
    pub value_type: Option<String>,
    pub sink_type: Option<String>,
}

impl RawTopicInput {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Default::default()
        }
    }

    pub fn with_value_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }

    pub fn with_sink_type(mut self, sink_type: impl Into<String>) -> Self {
        self.sink_type = Some(sink_type.into());
        self
    }
}

/// Validated topic configuration shared read-only by every step of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    topic: String,
    value_type: ValueType,
    sink_type: SinkType,
    table_name: String,
}

fn topic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)*$").expect("topic pattern is valid")
    })
}

/// Derive the warehouse table name for a topic.
///
/// `customer.action-log.v1` becomes `customer__action_log__v1__raw`. The output
/// appears in generated config across repositories, so it must stay stable.
pub fn derive_table_name(topic: &str) -> String {
    let mut name = topic.replace('.', "__").replace('-', "_");
    name.push_str(RAW_TABLE_SUFFIX);
    name
}

impl TopicConfig {
    /// Build a config from already-typed parts, validating the topic name.
    pub fn new(
        topic: impl Into<String>,
        value_type: ValueType,
        sink_type: SinkType,
    ) -> OnboardResult<Self> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(OnboardError::Validation("topic must not be empty".to_string()));
        }
        if !topic_pattern().is_match(&topic) {
            return Err(OnboardError::Validation(format!(
                "topic '{topic}' is not a dotted identifier (letters, digits, '_' and '-' separated by '.')"
            )));
        }
        let table_name = derive_table_name(&topic);
        Ok(Self {
            topic,
            value_type,
            sink_type,
            table_name,
        })
    }

    /// Validate raw input. Missing value and sink types fall back to json and
    /// realtime; any malformed field is a [`OnboardError::Validation`].
    pub fn resolve(input: &RawTopicInput) -> OnboardResult<Self> {
        let topic = input
            .topic
            .as_deref()
            .ok_or_else(|| OnboardError::Validation("missing required field: topic".to_string()))?;

        let value_type = match input.value_type.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => ValueType::default(),
        };

        let sink_type = match input.sink_type.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw
                .parse()
                .map_err(|e: OnboardError| OnboardError::Validation(e.to_string()))?,
            _ => SinkType::default(),
        };

        Self::new(topic, value_type, sink_type)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn sink_type(&self) -> SinkType {
        self.sink_type
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Topic with dots turned into dashes, suitable for branch names.
    pub fn slug(&self) -> String {
        self.topic.replace('.', "-")
    }

    /// Substitute `{topic}`, `{value_type}`, `{sink_type}` and `{table_name}`.
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{topic}", &self.topic)
            .replace("{value_type}", self.value_type.as_str())
            .replace("{sink_type}", self.sink_type.as_str())
            .replace("{table_name}", &self.table_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_for_dotted_topic() {
        assert_eq!(derive_table_name("customer.action.v1"), "customer__action__v1__raw");
        assert_eq!(derive_table_name("analytics.event.v1"), "analytics__event__v1__raw");
    }

    #[test]
    fn test_table_name_replaces_dashes() {
        assert_eq!(derive_table_name("audit.user-login.v2"), "audit__user_login__v2__raw");
    }

    #[test]
    fn test_table_name_is_deterministic() {
        let first = derive_table_name("orders.checkout-step.v3");
        let second = derive_table_name("orders.checkout-step.v3");
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let config = TopicConfig::resolve(&RawTopicInput::new("customer.action.v1")).unwrap();
        assert_eq!(config.value_type(), ValueType::Json);
        assert_eq!(config.sink_type(), SinkType::Realtime);
        assert_eq!(config.table_name(), "customer__action__v1__raw");
    }

    #[test]
    fn test_resolve_parses_explicit_types() {
        let input = RawTopicInput::new("analytics.event.v1")
            .with_value_type("PROTOBUF")
            .with_sink_type("s3");
        let config = TopicConfig::resolve(&input).unwrap();
        assert_eq!(config.value_type(), ValueType::Protobuf);
        assert_eq!(config.sink_type(), SinkType::S3);
    }

    #[test]
    fn test_resolve_rejects_missing_topic() {
        let err = TopicConfig::resolve(&RawTopicInput::default()).unwrap_err();
        assert!(matches!(err, OnboardError::Validation(_)));
    }

    #[test]
    fn test_resolve_rejects_malformed_topic() {
        for bad in ["", "   ", "customer..action", ".leading", "trailing.", "has space.v1", "slash/v1"] {
            let err = TopicConfig::resolve(&RawTopicInput::new(bad)).unwrap_err();
            assert!(matches!(err, OnboardError::Validation(_)), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_resolve_reports_bad_sink_as_validation() {
        let input = RawTopicInput::new("a.b.v1").with_sink_type("kinesis");
        let err = TopicConfig::resolve(&input).unwrap_err();
        assert!(matches!(err, OnboardError::Validation(_)));
        assert!(err.to_string().contains("kinesis"));
    }

    #[test]
    fn test_sink_type_parse_is_configuration_error() {
        let err = "kinesis".parse::<SinkType>().unwrap_err();
        assert!(matches!(err, OnboardError::Configuration(_)));
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let config = TopicConfig::new("customer.action.v1", ValueType::Json, SinkType::S3).unwrap();
        let rendered = config.render("{topic}|{value_type}|{sink_type}|{table_name}");
        assert_eq!(rendered, "customer.action.v1|json|s3|customer__action__v1__raw");
    }

    #[test]
    fn test_slug_replaces_dots() {
        let config = TopicConfig::new("customer.action.v1", ValueType::Json, SinkType::Realtime).unwrap();
        assert_eq!(config.slug(), "customer-action-v1");
    }
}
