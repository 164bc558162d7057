use std::path::Path;

use serde::Deserialize;
use serprims_graph::GraphConfig;
use serprims_transport::{ByteOrder, SplitterConfig};

use crate::exit::{io_error, CliError, CliResult, CONFIG_INVALID};

/// Effective settings for one CLI run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    pub graph: GraphConfig,
    pub splitter: SplitterConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ByteOrderSetting {
    Big,
    Little,
}

/// JSON config file. Every field is optional; absent fields keep defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    byte_order: Option<ByteOrderSetting>,
    buffer_size: Option<usize>,
    scalar_buffer_bytes: Option<usize>,
    small_array_threshold: Option<usize>,
    initial_table_capacity: Option<usize>,
    remove_on_error: Option<bool>,
    max_in_flight: Option<usize>,
}

impl ConfigFile {
    fn apply(self, settings: &mut Settings) {
        let batch = &mut settings.graph.batch;
        if let Some(order) = self.byte_order {
            batch.transport.byte_order = match order {
                ByteOrderSetting::Big => ByteOrder::Big,
                ByteOrderSetting::Little => ByteOrder::Little,
            };
        }
        if let Some(size) = self.buffer_size {
            batch.transport.buffer_size = size;
        }
        if let Some(bytes) = self.scalar_buffer_bytes {
            batch.scalar_buffer_bytes = bytes;
        }
        if let Some(threshold) = self.small_array_threshold {
            batch.small_array_threshold = threshold;
        }
        if let Some(capacity) = self.initial_table_capacity {
            settings.graph.initial_table_capacity = capacity;
        }
        if let Some(enabled) = self.remove_on_error {
            settings.splitter.remove_on_error = enabled;
        }
        if let Some(max) = self.max_in_flight {
            settings.splitter.max_in_flight = max;
        }
    }
}

pub fn parse_settings(json: &str) -> CliResult<Settings> {
    let file: ConfigFile = serde_json::from_str(json)
        .map_err(|err| CliError::new(CONFIG_INVALID, format!("invalid config: {err}")))?;
    let mut settings = Settings::default();
    file.apply(&mut settings);
    if settings.graph.batch.small_array_threshold == 0 {
        return Err(CliError::new(
            CONFIG_INVALID,
            "invalid config: small_array_threshold must be greater than zero",
        ));
    }
    Ok(settings)
}

pub fn load_settings(path: Option<&Path>) -> CliResult<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("read config {}", path.display()), err))?;
    let settings = parse_settings(&json)?;
    tracing::debug!(path = %path.display(), ?settings, "config loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_keeps_defaults() {
        assert_eq!(parse_settings("{}").unwrap(), Settings::default());
    }

    #[test]
    fn fields_override_defaults() {
        let settings = parse_settings(
            r#"{"byte_order":"little","small_array_threshold":8,"max_in_flight":2,"remove_on_error":true}"#,
        )
        .unwrap();
        assert_eq!(settings.graph.batch.transport.byte_order, ByteOrder::Little);
        assert_eq!(settings.graph.batch.small_array_threshold, 8);
        assert_eq!(settings.splitter.max_in_flight, 2);
        assert!(settings.splitter.remove_on_error);
        assert_eq!(
            settings.graph.initial_table_capacity,
            GraphConfig::default().initial_table_capacity
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_settings(r#"{"buffer":1}"#).unwrap_err();
        assert_eq!(err.code, CONFIG_INVALID);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let err = parse_settings(r#"{"small_array_threshold":0}"#).unwrap_err();
        assert_eq!(err.code, CONFIG_INVALID);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_settings(Some(Path::new("/nonexistent/serprims.json"))).unwrap_err();
        assert!(err.message.contains("read config"));
    }
}
