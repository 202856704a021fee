//! Capability header parsing.
//!
//! Expected shape (every clause optional, keywords case-insensitive):
//!
//! ```text
//! LiquidCore/0.2.0 (Android; API 25; en-us) Surface (.Console/0.2.0) Binding (sqlite3)
//! ```
//!
//! - `Product/<version> (<info;...>)` identifies the client release and platform
//! - `Surface (<name[/version]>;...)` lists available surfaces; a leading `.`
//!   is expanded against the default namespace
//! - `Binding (<module>;...)` lists natively bound modules

use regex::Regex;

use crate::descriptor::{qualify_surface, CapabilityDescriptor, Surface, VersionOrdinal};

/// Parses identification headers into [`CapabilityDescriptor`]s.
///
/// Built once per configuration; parsing itself is pure and never fails.
#[derive(Debug, Clone)]
pub struct DescriptorParser {
    platform: Regex,
    surfaces: Regex,
    bindings: Regex,
    namespace: String,
}

impl DescriptorParser {
    /// Create a parser for clients identifying as `product`.
    pub fn new(product: &str, namespace: impl Into<String>) -> Result<Self, regex::Error> {
        let platform = Regex::new(&format!(
            r"(?i){}/\s*([0-9.]*)\s*(?:\((.*?)\))?",
            regex::escape(product)
        ))?;
        Ok(Self {
            platform,
            surfaces: Regex::new(r"(?i)Surface\s+\((.*?)\)")?,
            bindings: Regex::new(r"(?i)Binding\s+\((.*?)\)")?,
            namespace: namespace.into(),
        })
    }

    /// Parse a header value. A missing or malformed header yields the empty descriptor.
    pub fn parse(&self, header: &str) -> CapabilityDescriptor {
        let platform = self.platform.captures(header);
        let group = |index: usize| {
            platform
                .as_ref()
                .and_then(|caps| caps.get(index))
                .map(|m| m.as_str())
        };

        let version = group(1).map(VersionOrdinal::parse).unwrap_or_default();
        let info = group(2).map(split_list).unwrap_or_default();

        let surfaces = clause(&self.surfaces, header)
            .map(|list| {
                split_list(list)
                    .iter()
                    .filter_map(|entry| self.parse_surface(entry))
                    .collect()
            })
            .unwrap_or_default();

        let bindings = clause(&self.bindings, header)
            .map(split_list)
            .unwrap_or_default();

        CapabilityDescriptor {
            version,
            info,
            surfaces,
            bindings,
        }
    }

    fn parse_surface(&self, entry: &str) -> Option<Surface> {
        let (name, version) = match entry.split_once('/') {
            Some((name, version)) => (name.trim(), version.trim()),
            None => (entry.trim(), ""),
        };
        if name.is_empty() {
            return None;
        }
        Some(Surface {
            name: qualify_surface(name, &self.namespace).into_owned(),
            version: VersionOrdinal::parse(version),
        })
    }
}

fn clause<'h>(pattern: &Regex, header: &'h str) -> Option<&'h str> {
    pattern
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn split_list(list: &str) -> Vec<String> {
    list.split(';')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}
