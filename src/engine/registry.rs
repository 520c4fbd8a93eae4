//! Concurrent registry of compiled types

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::compiled::CompiledTypeAuth;
use super::source::{SchemaRuleSource, TypeRules};
use crate::claims::CallerIdentity;
use crate::compiler::AuthorizationExpression;
use crate::config::{CompilerConfig, ConfiguredAuthProviders};
use crate::error::{AuthzError, Result};
use crate::types::ModelOperation;

/// Thread-safe store of compiled per-type authorization
///
/// Compiled types are immutable and handed out as `Arc`s, so evaluations on
/// many threads never contend on anything but the map lookup.
///
/// # Examples
///
/// ```rust
/// use authz_rules::claims::CallerIdentity;
/// use authz_rules::config::{CompilerConfig, ConfiguredAuthProviders};
/// use authz_rules::engine::{AuthRegistry, TypeRules};
/// use authz_rules::rules::AuthRule;
/// use authz_rules::types::{AuthType, ModelOperation, TypeSchema};
///
/// let registry = AuthRegistry::new(
///     ConfiguredAuthProviders::new(AuthType::ApiKey),
///     CompilerConfig::default(),
/// );
///
/// registry
///     .register(&TypeRules::new(TypeSchema::with_scalars("Post", &["id", "title"]))
///         .with_rules(vec![AuthRule::public()]))
///     .unwrap();
///
/// let expr = registry
///     .authorize("Post", ModelOperation::List, &CallerIdentity::api_key())
///     .unwrap();
/// assert!(expr.is_allowed());
/// ```
#[derive(Debug, Clone)]
pub struct AuthRegistry {
    providers: Arc<ConfiguredAuthProviders>,
    config: CompilerConfig,
    types: Arc<DashMap<String, Arc<CompiledTypeAuth>>>,
}

impl AuthRegistry {
    pub fn new(providers: ConfiguredAuthProviders, config: CompilerConfig) -> Self {
        Self {
            providers: Arc::new(providers),
            config,
            types: Arc::new(DashMap::new()),
        }
    }

    pub fn providers(&self) -> &ConfiguredAuthProviders {
        &self.providers
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles one type and stores it, replacing an earlier version
    ///
    /// # Returns
    ///
    /// The compiled type, or the configuration error that aborted it (the
    /// registry is left unchanged on error)
    pub fn register(&self, type_rules: &TypeRules) -> Result<Arc<CompiledTypeAuth>> {
        let compiled = Arc::new(CompiledTypeAuth::compile(
            type_rules,
            Arc::clone(&self.providers),
            self.config.clone(),
        )?);

        self.types
            .insert(compiled.type_name().to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Compiles every type of `source`
    ///
    /// All types are compiled before any is stored: one invalid type leaves
    /// the registry untouched.
    ///
    /// # Returns
    ///
    /// Number of types stored
    pub fn load(&self, source: &dyn SchemaRuleSource) -> Result<usize> {
        let compiled = source
            .type_rules()
            .iter()
            .map(|rules| {
                CompiledTypeAuth::compile(rules, Arc::clone(&self.providers), self.config.clone())
            })
            .collect::<Result<Vec<_>>>()?;

        let count = compiled.len();
        for compiled in compiled {
            self.types
                .insert(compiled.type_name().to_string(), Arc::new(compiled));
        }

        debug!(types = count, "Loaded authorization rules");
        Ok(count)
    }

    pub fn get(&self, type_name: &str) -> Result<Arc<CompiledTypeAuth>> {
        self.types
            .get(type_name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AuthzError::TypeNotFound {
                type_name: type_name.to_string(),
            })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn remove(&self, type_name: &str) -> Option<Arc<CompiledTypeAuth>> {
        self.types.remove(type_name).map(|(_, compiled)| compiled)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Looks the type up and evaluates `operation` for `caller`
    pub fn authorize(
        &self,
        type_name: &str,
        operation: ModelOperation,
        caller: &CallerIdentity<'_>,
    ) -> Result<AuthorizationExpression> {
        Ok(self.get(type_name)?.authorize(operation, caller))
    }

    /// Like [`AuthRegistry::authorize`], checking a create/update input too
    pub fn authorize_mutation(
        &self,
        type_name: &str,
        operation: ModelOperation,
        caller: &CallerIdentity<'_>,
        input: &serde_json::Value,
    ) -> Result<AuthorizationExpression> {
        Ok(self.get(type_name)?.authorize_mutation(operation, caller, input))
    }
}
