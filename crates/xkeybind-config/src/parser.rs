//! KDL configuration parser
//!
//! ```kdl
//! global {
//!     log-level "info"
//!     display ":1"
//!     refresh-timeout-ms 2000
//! }
//!
//! bind "Mod4-j"
//! bind "shift-control-Return" "XF86Sleep"
//! ```

use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, SourceLocation};
use crate::model::*;

/// Extract source location from a KDL node's name span
fn get_node_location(node: &kdl::KdlNode, source: &str) -> SourceLocation {
    let span = node.name().span();
    location_at(source, span.offset(), span.len())
}

/// Extract source location from a KDL entry
fn get_entry_location(entry: &kdl::KdlEntry, source: &str) -> SourceLocation {
    let span = entry.span();
    location_at(source, span.offset(), span.len())
}

fn location_at(source: &str, offset: usize, len: usize) -> SourceLocation {
    let (line, column) = offset_to_line_col(source, offset);
    SourceLocation::new(line, column, offset, len)
}

/// Convert byte offset to line and column (1-indexed)
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

fn invalid_binding(
    message: impl Into<String>,
    location: SourceLocation,
    source: &str,
) -> ConfigError {
    ConfigError::InvalidBinding {
        message: message.into(),
        location,
        src: source.to_string(),
        span: miette::SourceSpan::from((location.offset, location.len)),
    }
}

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse a configuration file, falling back to defaults if it does not exist
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!("No configuration at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    parse_config(path)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl uses an older miette version, so rebuild the span from offset/len
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node)?;
            }
            "bind" => {
                config.bindings.extend(parse_bind(node, content)?);
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "log-level" => {
                    if let Some(entry) = child.entries().first() {
                        if let Some(val) = entry.value().as_string() {
                            global.log_level = val.parse().map_err(|e| ConfigError::Invalid {
                                message: e,
                            })?;
                        }
                    }
                }
                "display" => {
                    if let Some(entry) = child.entries().first() {
                        global.display = entry.value().as_string().map(|s| s.to_string());
                    }
                }
                "refresh-timeout-ms" => {
                    if let Some(entry) = child.entries().first() {
                        let ms = entry.value().as_i64().ok_or_else(|| ConfigError::Invalid {
                            message: "refresh-timeout-ms must be an integer".to_string(),
                        })?;
                        global.refresh_timeout = match ms {
                            0 => None,
                            ms if ms > 0 => Some(Duration::from_millis(ms as u64)),
                            ms => {
                                return Err(ConfigError::Invalid {
                                    message: format!(
                                        "refresh-timeout-ms must not be negative, got {}",
                                        ms
                                    ),
                                })
                            }
                        };
                    }
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn parse_bind(node: &kdl::KdlNode, source: &str) -> Result<Vec<BindingEntry>, ConfigError> {
    if node.entries().is_empty() {
        return Err(invalid_binding(
            "`bind` needs a binding string (e.g., `bind \"Mod4-j\"`)",
            get_node_location(node, source),
            source,
        ));
    }

    let mut bindings = Vec::new();
    for entry in node.entries() {
        let location = get_entry_location(entry, source);
        let spec = entry
            .value()
            .as_string()
            .ok_or_else(|| invalid_binding("binding must be a string", location, source))?;

        if spec.trim().is_empty() {
            return Err(invalid_binding("binding string is empty", location, source));
        }

        bindings.push(BindingEntry {
            spec: spec.to_string(),
            location: Some(location),
        });
    }

    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_basic_config() {
        let config = r#"
            global {
                log-level "debug"
                display ":1"
                refresh-timeout-ms 250
            }

            bind "Mod4-j"
            bind "shift-control-Return"
        "#;

        let result = parse_config_str(config).unwrap();
        assert_eq!(result.global.log_level, LogLevel::Debug);
        assert_eq!(result.global.display.as_deref(), Some(":1"));
        assert_eq!(result.global.refresh_timeout, Some(Duration::from_millis(250)));
        assert_eq!(result.bindings.len(), 2);
        assert_eq!(result.bindings[0].spec, "Mod4-j");
        assert_eq!(result.bindings[1].spec, "shift-control-Return");
    }

    #[test]
    fn test_defaults() {
        let result = parse_config_str("").unwrap();
        assert_eq!(result.global.log_level, LogLevel::Warn);
        assert_eq!(result.global.display, None);
        assert_eq!(
            result.global.refresh_timeout,
            Some(Duration::from_millis(DEFAULT_REFRESH_TIMEOUT_MS))
        );
        assert!(result.bindings.is_empty());
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let config = r#"
            global {
                refresh-timeout-ms 0
            }
        "#;
        let result = parse_config_str(config).unwrap();
        assert_eq!(result.global.refresh_timeout, None);
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let config = r#"
            global {
                refresh-timeout-ms -5
            }
        "#;
        match parse_config_str(config) {
            Err(ConfigError::Invalid { message }) => assert!(message.contains("-5")),
            other => panic!("Expected Invalid error, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let config = r#"
            global {
                log-level "loud"
            }
        "#;
        match parse_config_str(config) {
            Err(ConfigError::Invalid { message }) => assert!(message.contains("loud")),
            other => panic!("Expected Invalid error, got: {:?}", other),
        }
    }

    #[test]
    fn test_bind_with_several_specs() {
        let config = r#"bind "Mod4-j" "Mod4-k" "XF86Sleep""#;
        let result = parse_config_str(config).unwrap();
        let specs: Vec<&str> = result.bindings.iter().map(|b| b.spec.as_str()).collect();
        assert_eq!(specs, vec!["Mod4-j", "Mod4-k", "XF86Sleep"]);
    }

    #[test]
    fn test_binding_locations() {
        let config = "bind \"Mod4-j\"\n  bind \"F1\"";
        let result = parse_config_str(config).unwrap();
        let first = result.bindings[0].location.unwrap();
        assert_eq!(first.line, 1);
        let second = result.bindings[1].location.unwrap();
        assert_eq!(second.line, 2);
        assert!(second.offset > first.offset);
    }

    #[test]
    fn test_bind_without_spec_fails() {
        let config = "global {\n}\nbind\n";
        match parse_config_str(config) {
            Err(ConfigError::InvalidBinding { location, .. }) => {
                assert_eq!(location.line, 3);
            }
            other => panic!("Expected InvalidBinding error, got: {:?}", other),
        }
    }

    #[test]
    fn test_bind_empty_string_fails() {
        let config = r#"bind "  ""#;
        assert!(matches!(
            parse_config_str(config),
            Err(ConfigError::InvalidBinding { .. })
        ));
    }

    #[test]
    fn test_bind_non_string_fails() {
        let config = "bind 42";
        match parse_config_str(config) {
            Err(ConfigError::InvalidBinding { message, .. }) => {
                assert!(message.contains("string"));
            }
            other => panic!("Expected InvalidBinding error, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_nodes_are_skipped() {
        let config = r#"
            keyboard "something"
            bind "Mod1-Tab"
        "#;
        let result = parse_config_str(config).unwrap();
        assert_eq!(result.bindings.len(), 1);
    }

    #[test]
    fn test_kdl_syntax_error() {
        let result = parse_config_str("bind \"unterminated");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_parse_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind \"Mod4-Return\"").unwrap();

        let result = parse_config(file.path()).unwrap();
        assert_eq!(result.bindings[0].spec, "Mod4-Return");
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(&dir.path().join("absent.kdl")).unwrap();
        assert!(result.bindings.is_empty());
        assert_eq!(result.global.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_parse_config_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = parse_config(&dir.path().join("absent.kdl"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
