//! Manifest config selection.
//!
//! # Responsibilities
//! - Evaluate each config's client requirements against a descriptor
//! - Return the first config whose rules all pass
//!
//! # Design Decisions
//! - Each requirement is an isolated [`ConfigRule`]; [`AllRules`] combines them
//!   with AND semantics and short-circuits on the first failure
//! - Info and binding tokens compare case-insensitively
//! - Empty requirement = always matches (wildcard)
//! - First match wins: manifests list specific configs before general ones

use crate::descriptor::{qualify_surface, CapabilityDescriptor};
use crate::manifest::schema::{ManifestConfig, SurfaceRequirement};

/// Inputs shared by every rule while evaluating one request.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub descriptor: &'a CapabilityDescriptor,
    /// Namespace prepended to surface names starting with `.`.
    pub namespace: &'a str,
}

/// A single client requirement of a manifest config.
pub trait ConfigRule: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns true if the client satisfies this requirement of `config`.
    fn check(&self, ctx: &MatchContext<'_>, config: &ManifestConfig) -> bool;
}

/// Client version inside `version`.
#[derive(Debug, Clone, Copy)]
pub struct VersionRule;

impl ConfigRule for VersionRule {
    fn name(&self) -> &'static str {
        "version"
    }

    fn check(&self, ctx: &MatchContext<'_>, config: &ManifestConfig) -> bool {
        config.version.contains(ctx.descriptor.version)
    }
}

/// Every `info` token reported by the client.
#[derive(Debug, Clone, Copy)]
pub struct InfoRule;

impl ConfigRule for InfoRule {
    fn name(&self) -> &'static str {
        "info"
    }

    fn check(&self, ctx: &MatchContext<'_>, config: &ManifestConfig) -> bool {
        contains_all(&ctx.descriptor.info, &config.info)
    }
}

/// Platform API level inside `api`.
#[derive(Debug, Clone, Copy)]
pub struct ApiRule;

impl ConfigRule for ApiRule {
    fn name(&self) -> &'static str {
        "api"
    }

    fn check(&self, ctx: &MatchContext<'_>, config: &ManifestConfig) -> bool {
        config.api.contains(ctx.descriptor.api_level())
    }
}

/// Every required binding provided natively by the client.
#[derive(Debug, Clone, Copy)]
pub struct BindingRule;

impl ConfigRule for BindingRule {
    fn name(&self) -> &'static str {
        "bindings"
    }

    fn check(&self, ctx: &MatchContext<'_>, config: &ManifestConfig) -> bool {
        contains_all(&ctx.descriptor.bindings, &config.bindings)
    }
}

/// At least one required surface available on the client.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceRule;

impl ConfigRule for SurfaceRule {
    fn name(&self) -> &'static str {
        "surfaces"
    }

    fn check(&self, ctx: &MatchContext<'_>, config: &ManifestConfig) -> bool {
        if config.surfaces.is_empty() {
            return true;
        }
        config
            .surfaces
            .iter()
            .any(|required| surface_available(ctx, required))
    }
}

fn surface_available(ctx: &MatchContext<'_>, required: &SurfaceRequirement) -> bool {
    let name = qualify_surface(&required.name, ctx.namespace);
    ctx.descriptor
        .surfaces
        .iter()
        .any(|surface| surface.name == name && required.version.contains(surface.version))
}

fn contains_all(reported: &[String], required: &[String]) -> bool {
    if required.is_empty() {
        return true;
    }
    let reported: Vec<String> = reported.iter().map(|token| token.to_uppercase()).collect();
    required
        .iter()
        .all(|token| reported.contains(&token.to_uppercase()))
}

/// Combines multiple rules with AND semantics.
#[derive(Debug)]
pub struct AllRules {
    rules: Vec<Box<dyn ConfigRule>>,
}

impl AllRules {
    pub fn new(rules: Vec<Box<dyn ConfigRule>>) -> Self {
        Self { rules }
    }

    /// Name of the first rule `config` fails, or `None` if all pass.
    pub fn first_failure(&self, ctx: &MatchContext<'_>, config: &ManifestConfig) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| !rule.check(ctx, config))
            .map(|rule| rule.name())
    }

    pub fn matches(&self, ctx: &MatchContext<'_>, config: &ManifestConfig) -> bool {
        self.first_failure(ctx, config).is_none()
    }
}

impl Default for AllRules {
    /// The standard rule table, cheapest checks first.
    fn default() -> Self {
        Self::new(vec![
            Box::new(VersionRule),
            Box::new(InfoRule),
            Box::new(ApiRule),
            Box::new(BindingRule),
            Box::new(SurfaceRule),
        ])
    }
}

/// The config chosen for a request.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'m> {
    /// Position in the manifest.
    pub index: usize,
    pub config: &'m ManifestConfig,
}

/// Selects manifest configs for client descriptors.
#[derive(Debug)]
pub struct ManifestMatcher {
    rules: AllRules,
    namespace: String,
}

impl ManifestMatcher {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            rules: AllRules::default(),
            namespace: namespace.into(),
        }
    }

    /// Linear scan in manifest order; the first config passing every rule wins.
    pub fn select<'m>(
        &self,
        descriptor: &CapabilityDescriptor,
        configs: &'m [ManifestConfig],
    ) -> Option<Selection<'m>> {
        let ctx = MatchContext {
            descriptor,
            namespace: &self.namespace,
        };

        configs.iter().enumerate().find_map(|(index, config)| {
            match self.rules.first_failure(&ctx, config) {
                None => Some(Selection { index, config }),
                Some(rule) => {
                    tracing::trace!(index, rule, file = %config.file.display(), "Manifest config rejected");
                    None
                }
            }
        })
    }
}
