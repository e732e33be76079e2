use chrono::{DateTime, Utc};
use serde::Deserialize;
use threshd_common::types::{CollectionResource, Sample};

/// One line of the sample stream.
///
/// ```text
/// {"resource":"node-1","instance":"eth0","ds":"ifInOctets","value":1200.0}
/// {"remove_resource":"node-1"}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InputRecord {
    Sample(SampleLine),
    RemoveResource { remove_resource: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SampleLine {
    pub resource: String,
    #[serde(default)]
    pub instance: Option<String>,
    pub ds: String,
    pub value: f64,
    /// Collection time; the time the line is read when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SampleLine {
    pub fn resource(&self) -> CollectionResource {
        CollectionResource {
            id: self.resource.clone(),
            instance: self.instance.clone(),
        }
    }

    pub fn sample(&self) -> Sample {
        match self.timestamp {
            Some(ts) => Sample::new(ts, self.value),
            None => Sample::now(self.value),
        }
    }
}

/// Parses one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> serde_json::Result<Option<InputRecord>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sample_with_defaults() {
        let record = parse_line(r#"{"resource":"node-1","ds":"cpu","value":42}"#)
            .unwrap()
            .unwrap();
        let InputRecord::Sample(line) = record else {
            panic!("expected a sample");
        };
        assert_eq!(line.value, 42.0);
        assert_eq!(line.resource().instance, None);
        assert!(line.timestamp.is_none());
    }

    #[test]
    fn keeps_explicit_timestamp() {
        let record = parse_line(
            r#"{"resource":"node-1","instance":"eth0","ds":"ifInOctets","value":1.5,"timestamp":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap()
        .unwrap();
        let InputRecord::Sample(line) = record else {
            panic!("expected a sample");
        };
        let sample = line.sample();
        assert_eq!(sample.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!(line.resource().instance.as_deref(), Some("eth0"));
    }

    #[test]
    fn parses_remove_resource() {
        let record = parse_line(r#"{"remove_resource":"node-9"}"#).unwrap();
        assert_eq!(
            record,
            Some(InputRecord::RemoveResource {
                remove_resource: "node-9".to_string()
            })
        );
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# warmup samples").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("not json").is_err());
        assert!(parse_line(r#"{"resource":"node-1","ds":"cpu"}"#).is_err());
        assert!(parse_line(r#"{"resource":"node-1","ds":"cpu","value":"high"}"#).is_err());
    }
}
