//! Rewrites a resolved spec into the form published on ReadMe.
//!
//! Key order of the document is preserved; the ReadMe extension block is
//! placed directly after the `openapi` key.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{ResolveError, ResolveResult};
use crate::source::SpecFile;

/// Vendor extension read by ReadMe.
pub const README_EXTENSION_KEY: &str = "x-readme";

/// Publication rewrites applied to every spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Value of `x-readme.explorer-enabled`.
    pub explorer_enabled: bool,
    /// Replacement for the first server's `url`.
    pub server_url: String,
    /// Default of the `base-url` server variable.
    pub base_url_default: String,
    /// Default of the `protocol` server variable.
    pub protocol_default: String,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            explorer_enabled: false,
            server_url: "{protocol}://{base-url}".to_string(),
            base_url_default: "alation_domain".to_string(),
            protocol_default: "https".to_string(),
        }
    }
}

/// Produce the publishable variant of `spec` for `version`.
pub fn prepare_for_publish(
    spec: &SpecFile,
    version: &str,
    options: &PrepareOptions,
) -> ResolveResult<SpecFile> {
    let invalid = |reason: String| ResolveError::InvalidSpec {
        name: spec.name().to_string(),
        reason,
    };

    let doc: Value =
        serde_yaml::from_str(spec.content()).map_err(|e| invalid(format!("not YAML/JSON: {}", e)))?;
    let Value::Mapping(root) = doc else {
        return Err(invalid("top level is not a mapping".to_string()));
    };
    if !root.contains_key("openapi") {
        return Err(invalid("missing 'openapi' field".to_string()));
    }

    let mut rewritten = Mapping::with_capacity(root.len() + 1);
    for (key, value) in root {
        if key.as_str() == Some(README_EXTENSION_KEY) {
            continue;
        }
        let is_openapi = key.as_str() == Some("openapi");
        rewritten.insert(key, value);
        if is_openapi {
            rewritten.insert(
                Value::from(README_EXTENSION_KEY),
                readme_extension(options.explorer_enabled),
            );
        }
    }

    if let Some(info) = rewritten.get_mut("info").and_then(Value::as_mapping_mut) {
        info.insert(Value::from("version"), Value::from(version));
    }

    if let Some(server) = rewritten
        .get_mut("servers")
        .and_then(Value::as_sequence_mut)
        .and_then(|servers| servers.first_mut())
        .and_then(Value::as_mapping_mut)
    {
        rewrite_server(server, options);
    }

    let content = serde_yaml::to_string(&Value::Mapping(rewritten))
        .map_err(|e| invalid(format!("failed to serialize: {}", e)))?;
    debug!(spec = %spec.name(), version, "prepared spec for publication");
    Ok(spec.with_content(content))
}

fn readme_extension(explorer_enabled: bool) -> Value {
    let mut ext = Mapping::new();
    ext.insert(Value::from("explorer-enabled"), Value::from(explorer_enabled));
    Value::Mapping(ext)
}

fn rewrite_server(server: &mut Mapping, options: &PrepareOptions) {
    server.insert(Value::from("url"), Value::from(options.server_url.as_str()));

    let Some(variables) = server.get_mut("variables").and_then(Value::as_mapping_mut) else {
        return;
    };
    for (name, default) in [
        ("base-url", &options.base_url_default),
        ("protocol", &options.protocol_default),
    ] {
        if let Some(var) = variables.get_mut(name).and_then(Value::as_mapping_mut) {
            var.insert(Value::from("default"), Value::from(default.as_str()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SpecOrigin;

    const SPEC: &str = r#"openapi: 3.0.3
info:
  title: Data Products API
  version: 0.0.1
servers:
  - url: https://example.com/api
    variables:
      base-url:
        default: localhost
      protocol:
        default: http
paths: {}
"#;

    fn spec(content: &str) -> SpecFile {
        SpecFile::new("data_products", "/tmp/data_products.yaml", SpecOrigin::Local, content)
    }

    fn prepared(content: &str) -> Value {
        let out = prepare_for_publish(&spec(content), "2025.1.5", &PrepareOptions::default())
            .expect("prepare failed");
        serde_yaml::from_str(out.content()).unwrap()
    }

    #[test]
    fn test_extension_follows_openapi_key() {
        let doc = prepared(SPEC);
        let keys: Vec<&str> = doc
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, vec!["openapi", "x-readme", "info", "servers", "paths"]);
        assert_eq!(doc["x-readme"]["explorer-enabled"], Value::from(false));
    }

    #[test]
    fn test_info_version_is_set() {
        let doc = prepared(SPEC);
        assert_eq!(doc["info"]["version"], Value::from("2025.1.5"));
        assert_eq!(doc["info"]["title"], Value::from("Data Products API"));
    }

    #[test]
    fn test_first_server_rewritten() {
        let doc = prepared(SPEC);
        let server = &doc["servers"][0];
        assert_eq!(server["url"], Value::from("{protocol}://{base-url}"));
        assert_eq!(server["variables"]["base-url"]["default"], Value::from("alation_domain"));
        assert_eq!(server["variables"]["protocol"]["default"], Value::from("https"));
    }

    #[test]
    fn test_existing_extension_replaced_once() {
        let content = "openapi: 3.1.0\nx-readme:\n  explorer-enabled: true\ninfo:\n  title: T\n  version: 1\n";
        let doc = prepared(content);
        let count = doc
            .as_mapping()
            .unwrap()
            .keys()
            .filter(|k| k.as_str() == Some("x-readme"))
            .count();
        assert_eq!(count, 1);
        assert_eq!(doc["x-readme"]["explorer-enabled"], Value::from(false));
    }

    #[test]
    fn test_document_without_servers_is_accepted() {
        let doc = prepared("openapi: 3.0.0\ninfo:\n  title: T\n  version: 1\n");
        assert!(doc.get("servers").is_none());
    }

    #[test]
    fn test_json_input_is_accepted() {
        let doc = prepared(r#"{"openapi": "3.0.0", "info": {"title": "J", "version": "1"}}"#);
        assert_eq!(doc["info"]["version"], Value::from("2025.1.5"));
    }

    #[test]
    fn test_missing_openapi_is_invalid() {
        let err = prepare_for_publish(
            &spec("info:\n  title: T\n"),
            "1.0",
            &PrepareOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidSpec { .. }));
    }

    #[test]
    fn test_non_mapping_is_invalid() {
        let err =
            prepare_for_publish(&spec("- a\n- b\n"), "1.0", &PrepareOptions::default()).unwrap_err();
        assert!(err.to_string().contains("not a mapping"));
    }

    #[test]
    fn test_input_spec_untouched() {
        let input = spec(SPEC);
        let _ = prepare_for_publish(&input, "2025.1.5", &PrepareOptions::default()).unwrap();
        assert_eq!(input.content(), SPEC);
    }
}
