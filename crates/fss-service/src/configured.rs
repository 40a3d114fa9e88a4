//! Access policies loaded from a JSON definitions file
//!
//! Each definition maps one content type to a bucket and a path template such
//! as `avatars/{user}/{filename}`. The literal part of the template before the
//! first placeholder is the policy's scope inside its bucket; scopes of
//! policies sharing a bucket must not overlap.

use crate::path::normalize_path;
use crate::policy::AccessPolicy;
use anyhow::{anyhow, bail, Context};
use fss_core::{Provider, StorageUrl, UploadLimit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

const RESOURCE: &str = "{resource}";
const USER: &str = "{user}";
const FILENAME: &str = "{filename}";

/// Who may read files stored under a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadAccess {
    /// Every user.
    #[default]
    Public,
    /// Only the user named in the `{user}` segment of the path.
    Owner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDefinition {
    pub content_type: String,
    pub provider: Provider,
    pub bucket: String,
    pub path_template: String,
    #[serde(default)]
    pub read_access: ReadAccess,
    #[serde(default)]
    pub content_addressed: bool,
    #[serde(default)]
    pub store_locally: bool,
    #[serde(default)]
    pub read_locally: bool,
    #[serde(default)]
    pub public_read: bool,
    #[serde(default)]
    pub thumbnail_parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub upload_limit: UploadLimit,
}

/// [`AccessPolicy`] driven by a [`PolicyDefinition`]. Users are identified by
/// their `Display` form.
#[derive(Debug, Clone)]
pub struct ConfiguredPolicy {
    definition: PolicyDefinition,
    template: String,
    scope: String,
    user_segment: Option<usize>,
}

impl ConfiguredPolicy {
    pub fn new(definition: PolicyDefinition) -> anyhow::Result<Self> {
        if definition.content_type.trim().is_empty() {
            bail!("Policy content type must not be empty");
        }
        if !StorageUrl::is_valid_bucket(&definition.bucket) {
            bail!(
                "Policy {}: invalid bucket name {:?}",
                definition.content_type,
                definition.bucket
            );
        }

        let template = normalize_path(&definition.path_template).to_string();
        let segments: Vec<&str> = template.split('/').collect();
        if !segments.contains(&FILENAME) {
            bail!(
                "Policy {}: path template must contain a {} segment",
                definition.content_type,
                FILENAME
            );
        }
        for placeholder in [RESOURCE, USER, FILENAME] {
            if template.matches(placeholder).count() > 1 {
                bail!(
                    "Policy {}: {} may appear only once in the path template",
                    definition.content_type,
                    placeholder
                );
            }
            if template.contains(placeholder) && !segments.contains(&placeholder) {
                bail!(
                    "Policy {}: {} must be a whole path segment",
                    definition.content_type,
                    placeholder
                );
            }
        }

        let user_segment = segments.iter().position(|s| *s == USER);
        if definition.read_access == ReadAccess::Owner && user_segment.is_none() {
            bail!(
                "Policy {}: owner read access needs a {} segment in the path template",
                definition.content_type,
                USER
            );
        }

        let scope = match template.find('{') {
            Some(index) => normalize_path(&template[..index]).to_string(),
            None => template.clone(),
        };

        Ok(Self {
            definition,
            template,
            scope,
            user_segment,
        })
    }

    pub fn definition(&self) -> &PolicyDefinition {
        &self.definition
    }

    /// Literal path prefix every file of this policy lives under.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn in_scope(&self, path: &str) -> bool {
        self.scope.is_empty()
            || path
                .strip_prefix(self.scope.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    fn owned_by(&self, user: &str, path: &str) -> bool {
        match self.user_segment {
            Some(index) => path.split('/').nth(index) == Some(user),
            None => true,
        }
    }

    fn overlaps(&self, other: &ConfiguredPolicy) -> bool {
        if self.definition.bucket != other.definition.bucket {
            return false;
        }
        let nested = |outer: &str, inner: &str| {
            outer.is_empty()
                || inner == outer
                || inner
                    .strip_prefix(outer)
                    .is_some_and(|rest| rest.starts_with('/'))
        };
        nested(&self.scope, &other.scope) || nested(&other.scope, &self.scope)
    }
}

/// A value substituted into a template segment must stay one segment.
fn valid_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains('/')
        && !value.contains('\\')
}

impl<U> AccessPolicy<String, U> for ConfiguredPolicy
where
    U: Display + Send + Sync,
{
    fn content_type(&self) -> String {
        self.definition.content_type.clone()
    }

    fn upload_limit(&self, _user: &U) -> UploadLimit {
        self.definition.upload_limit.clone()
    }

    fn path(&self, resource: &str, user: &U, filename: &str) -> Option<String> {
        let user = user.to_string();
        let mut rendered = Vec::new();
        for segment in self.template.split('/') {
            let value = match segment {
                RESOURCE => resource,
                USER => user.as_str(),
                FILENAME => filename,
                literal => literal,
            };
            if !valid_segment(value) {
                tracing::debug!(
                    content_type = %self.definition.content_type,
                    segment = %segment,
                    "Refusing path with invalid segment"
                );
                return None;
            }
            rendered.push(value);
        }
        Some(rendered.join("/"))
    }

    fn is_writable(&self, user: &U, path: &str) -> bool {
        self.in_scope(path) && self.owned_by(&user.to_string(), path)
    }

    fn is_readable(&self, user: &U, path: &str) -> bool {
        if !self.in_scope(path) {
            return false;
        }
        match self.definition.read_access {
            ReadAccess::Public => true,
            ReadAccess::Owner => self.owned_by(&user.to_string(), path),
        }
    }

    fn provider(&self) -> Provider {
        self.definition.provider
    }

    fn bucket(&self) -> &str {
        &self.definition.bucket
    }

    fn is_content_addressed(&self) -> bool {
        self.definition.content_addressed
    }

    fn store_locally(&self) -> bool {
        self.definition.store_locally
    }

    fn read_locally(&self) -> bool {
        self.definition.read_locally
    }

    fn is_publicly_readable(&self) -> bool {
        self.definition.public_read
    }

    fn thumbnail_parameters(&self) -> BTreeMap<String, String> {
        self.definition.thumbnail_parameters.clone()
    }
}

/// Build policies from definitions, rejecting overlapping scopes.
pub fn build_policies(definitions: Vec<PolicyDefinition>) -> anyhow::Result<Vec<ConfiguredPolicy>> {
    let mut policies: Vec<ConfiguredPolicy> = Vec::with_capacity(definitions.len());
    for definition in definitions {
        let policy = ConfiguredPolicy::new(definition)?;
        if let Some(other) = policies.iter().find(|p| p.overlaps(&policy)) {
            return Err(anyhow!(
                "Policies {} and {} overlap in bucket {} ({:?} vs {:?})",
                other.definition.content_type,
                policy.definition.content_type,
                policy.definition.bucket,
                other.scope,
                policy.scope
            ));
        }
        policies.push(policy);
    }
    Ok(policies)
}

/// Load policy definitions from a JSON file holding an array of definitions.
pub fn load_policies(path: &Path) -> anyhow::Result<Vec<ConfiguredPolicy>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy file {}", path.display()))?;
    let definitions: Vec<PolicyDefinition> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse policy file {}", path.display()))?;
    let policies = build_policies(definitions)?;
    tracing::info!(
        path = %path.display(),
        policies = policies.len(),
        "Loaded access policies"
    );
    Ok(policies)
}
