//! Strategies deriving a display name for a discovered container.

use log::warn;
use regex::Regex;

use crate::error::{Error, Result};
use crate::types::Container;

pub trait ServiceNamer: Send + Sync {
    fn service_name(&self, container: &Container) -> String;
}

/// Names a service after one of its container labels, falling back to the
/// image name when the label is missing.
#[derive(Debug, Clone)]
pub struct DockerLabelNamer {
    label: String,
}

impl DockerLabelNamer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ServiceNamer for DockerLabelNamer {
    fn service_name(&self, container: &Container) -> String {
        match container.label(&self.label) {
            Some(name) => name.to_string(),
            None => container.image.clone(),
        }
    }
}

/// Names a service after the first capture group of a pattern matched
/// against the container's name, falling back to the image name.
#[derive(Debug, Clone)]
pub struct RegexNamer {
    expression: Regex,
}

impl RegexNamer {
    pub fn new(pattern: &str) -> Result<Self> {
        let expression = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { expression })
    }
}

impl ServiceNamer for RegexNamer {
    fn service_name(&self, container: &Container) -> String {
        let Some(name) = container.names.first() else {
            warn!("Container {} has no name, using its image", container.id);
            return container.image.clone();
        };

        self.expression
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| container.image.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn container(name: &str, labels: &[(&str, &str)]) -> Container {
        Container {
            id: "0123456789abcdef".into(),
            names: vec![name.to_string()],
            image: "registry/app:1.2".into(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            ..Default::default()
        }
    }

    #[test]
    fn label_namer_uses_label() {
        let namer = DockerLabelNamer::new("ServiceName");
        let c = container("/app", &[("ServiceName", "billing")]);
        assert_eq!(namer.service_name(&c), "billing");
    }

    #[test]
    fn label_namer_falls_back_to_image() {
        let namer = DockerLabelNamer::new("ServiceName");
        assert_eq!(namer.service_name(&container("/app", &[])), "registry/app:1.2");
    }

    #[test]
    fn regex_namer_uses_first_capture() {
        let namer = RegexNamer::new("^/(.+)(-[0-9a-z]{7,14})$").unwrap();
        assert_eq!(
            namer.service_name(&container("/billing-3f2a9c1b", &[])),
            "billing"
        );
    }

    #[test]
    fn regex_namer_falls_back_to_image() {
        let namer = RegexNamer::new("^/(.+)(-[0-9a-z]{7,14})$").unwrap();
        assert_eq!(namer.service_name(&container("/plain", &[])), "registry/app:1.2");
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(matches!(
            RegexNamer::new("(unclosed"),
            Err(Error::InvalidPattern { .. })
        ));
    }
}
