//! Startup wiring
//!
//! All policies, authorizers and provider accessors are collected through a
//! [`RegistryBuilder`] before the router serves anything. The resulting
//! [`Registry`] is immutable and shared read-only between requests.

use crate::policy::AccessPolicy;
use fss_core::{Provider, StorageUrl};
use fss_storage::{Authorizer, ProviderAccessor, StorageAccessor};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

pub struct Registry<T, U> {
    policies: Vec<Arc<dyn AccessPolicy<T, U>>>,
    by_type: HashMap<T, usize>,
    authorizers: HashMap<Provider, Arc<dyn Authorizer<U>>>,
    provider_accessors: HashMap<Provider, Arc<dyn StorageAccessor>>,
    local_accessor: Arc<dyn StorageAccessor>,
}

impl<T, U> Registry<T, U>
where
    T: Eq + Hash + Clone + Debug,
    U: Sync,
{
    pub fn builder(local_accessor: Arc<dyn StorageAccessor>) -> RegistryBuilder<T, U> {
        RegistryBuilder {
            policies: Vec::new(),
            authorizers: Vec::new(),
            provider_accessors: Vec::new(),
            local_accessor,
        }
    }

    pub fn policy(&self, content_type: &T) -> Option<&Arc<dyn AccessPolicy<T, U>>> {
        self.by_type.get(content_type).map(|&index| &self.policies[index])
    }

    /// Policies in registration order.
    pub fn policies(&self) -> impl Iterator<Item = &Arc<dyn AccessPolicy<T, U>>> {
        self.policies.iter()
    }

    pub fn authorizer(&self, provider: Provider) -> Option<&Arc<dyn Authorizer<U>>> {
        self.authorizers.get(&provider)
    }

    /// Accessor files of `provider` are written to. `Own` always has one:
    /// the local accessor unless another was registered for it.
    pub fn provider_accessor(&self, provider: Provider) -> Option<&Arc<dyn StorageAccessor>> {
        self.provider_accessors.get(&provider)
    }

    pub fn local_accessor(&self) -> &Arc<dyn StorageAccessor> {
        &self.local_accessor
    }
}

/// Errors detected while assembling the registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Access policy for content type {0} registered twice")]
    DuplicatePolicy(String),

    #[error("Authorizer for provider {0} registered twice")]
    DuplicateAuthorizer(Provider),

    #[error("Provider accessor for provider {0} registered twice")]
    DuplicateProviderAccessor(Provider),

    #[error("Policy for content type {content_type} uses bucket {bucket:?}, which cannot appear in a storage URL")]
    InvalidBucket {
        content_type: String,
        bucket: String,
    },

    #[error("Policy for content type {content_type} publishes files but provider {provider} has no authorizer")]
    MissingAuthorizer {
        content_type: String,
        provider: Provider,
    },
}

pub struct RegistryBuilder<T, U> {
    policies: Vec<Arc<dyn AccessPolicy<T, U>>>,
    authorizers: Vec<Arc<dyn Authorizer<U>>>,
    provider_accessors: Vec<(Provider, Arc<dyn StorageAccessor>)>,
    local_accessor: Arc<dyn StorageAccessor>,
}

impl<T, U> RegistryBuilder<T, U>
where
    T: Eq + Hash + Clone + Debug,
    U: Sync,
{
    pub fn policy(mut self, policy: Arc<dyn AccessPolicy<T, U>>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer<U>>) -> Self {
        self.authorizers.push(authorizer);
        self
    }

    pub fn provider_accessor<A>(mut self, accessor: Arc<A>) -> Self
    where
        A: ProviderAccessor + 'static,
    {
        let provider = accessor.provider();
        let accessor: Arc<dyn StorageAccessor> = accessor;
        self.provider_accessors.push((provider, accessor));
        self
    }

    /// Index everything and check the wiring.
    ///
    /// Policies that publish their files need an authorizer for their
    /// provider; that is checked here so the gap surfaces at startup instead
    /// of on the first public upload. Unless registered explicitly, the
    /// local accessor stores the files of `Own` policies. Any other provider
    /// without an accessor is allowed: writes to it are skipped.
    pub fn build(self) -> Result<Registry<T, U>, RegistryError> {
        let mut by_type = HashMap::with_capacity(self.policies.len());
        for (index, policy) in self.policies.iter().enumerate() {
            let content_type = policy.content_type();
            if !StorageUrl::is_valid_bucket(policy.bucket()) {
                return Err(RegistryError::InvalidBucket {
                    content_type: format!("{:?}", content_type),
                    bucket: policy.bucket().to_string(),
                });
            }
            if by_type.insert(content_type.clone(), index).is_some() {
                return Err(RegistryError::DuplicatePolicy(format!("{:?}", content_type)));
            }
        }

        let mut authorizers = HashMap::new();
        for authorizer in self.authorizers {
            let provider = authorizer.provider();
            if authorizers.insert(provider, authorizer).is_some() {
                return Err(RegistryError::DuplicateAuthorizer(provider));
            }
        }

        let mut provider_accessors = HashMap::new();
        for (provider, accessor) in self.provider_accessors {
            if provider_accessors.insert(provider, accessor).is_some() {
                return Err(RegistryError::DuplicateProviderAccessor(provider));
            }
        }
        provider_accessors
            .entry(Provider::Own)
            .or_insert_with(|| Arc::clone(&self.local_accessor));

        for policy in &self.policies {
            if policy.is_publicly_readable() && !authorizers.contains_key(&policy.provider()) {
                return Err(RegistryError::MissingAuthorizer {
                    content_type: format!("{:?}", policy.content_type()),
                    provider: policy.provider(),
                });
            }
        }

        tracing::info!(
            policies = self.policies.len(),
            authorizers = authorizers.len(),
            provider_accessors = provider_accessors.len(),
            "Storage registry initialized"
        );

        Ok(Registry {
            policies: self.policies,
            by_type,
            authorizers,
            provider_accessors,
            local_accessor: self.local_accessor,
        })
    }
}
