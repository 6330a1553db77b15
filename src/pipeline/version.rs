use log::warn;
use regex::Regex;

use super::types::{ResourceConfig, ResourceVersion};

/// Human-readable label for a resource version.
///
/// Falls back to the numeric version id when the resource type has no known
/// label rule or the expected version field is absent.
pub fn version_label(config: Option<&ResourceConfig>, version: &ResourceVersion) -> String {
    let label = config.and_then(|config| match config.type_.as_str() {
        "s3" | "iam-s3-resource" => s3_label(config, version),
        "registry-image" | "iam-registry-image" | "docker-image" => {
            version.version.get("digest").cloned()
        }
        "git" => version.version.get("ref").cloned(),
        "semver" => version.version.get("number").cloned(),
        other => {
            warn!(
                "No version label rule for resource type '{other}' ({:?})",
                version.version
            );
            None
        }
    });

    label.unwrap_or_else(|| version.id.to_string())
}

fn s3_label(config: &ResourceConfig, version: &ResourceVersion) -> Option<String> {
    let pattern = config.source.get("regexp")?.as_str()?;
    let path = version.version.get("path")?;

    let regex = Regex::new(pattern)
        .inspect_err(|e| warn!("Invalid regexp on resource '{}': {e}", config.name))
        .ok()?;

    regex
        .captures(path)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(type_: &str, source: serde_json::Value) -> ResourceConfig {
        ResourceConfig {
            name: "artifact".to_string(),
            type_: type_.to_string(),
            source: serde_json::from_value(source).unwrap(),
        }
    }

    fn version(id: u64, fields: &[(&str, &str)]) -> ResourceVersion {
        ResourceVersion {
            id,
            version: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            enabled: true,
        }
    }

    #[test]
    fn test_s3_regexp_capture() {
        let config = config("s3", json!({"regexp": "releases/app-(.*).tgz"}));
        let version = version(3, &[("path", "releases/app-1.4.2.tgz")]);

        assert_eq!(version_label(Some(&config), &version), "1.4.2");
    }

    #[test]
    fn test_s3_without_match_falls_back_to_id() {
        let config = config("iam-s3-resource", json!({"regexp": "app-(.*).tgz"}));
        let version = version(3, &[("path", "unrelated.zip")]);

        assert_eq!(version_label(Some(&config), &version), "3");
    }

    #[test]
    fn test_s3_invalid_regexp_falls_back_to_id() {
        let config = config("s3", json!({"regexp": "app-(.*"}));
        let version = version(8, &[("path", "app-1.tgz")]);

        assert_eq!(version_label(Some(&config), &version), "8");
    }

    #[test]
    fn test_registry_image_digest() {
        let config = config("registry-image", json!({"repository": "org/app"}));
        let version = version(5, &[("digest", "sha256:abc")]);

        assert_eq!(version_label(Some(&config), &version), "sha256:abc");
    }

    #[test]
    fn test_git_ref() {
        let config = config("git", json!({"uri": "https://example.com/repo.git"}));
        let version = version(5, &[("ref", "deadbeef")]);

        assert_eq!(version_label(Some(&config), &version), "deadbeef");
    }

    #[test]
    fn test_unknown_type_and_missing_config_use_id() {
        let version = version(11, &[("whatever", "x")]);

        assert_eq!(version_label(Some(&config("time", json!({}))), &version), "11");
        assert_eq!(version_label(None, &version), "11");
    }
}
