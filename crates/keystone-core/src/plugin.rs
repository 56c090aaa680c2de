//! Plugin descriptors and the plugin registry.
//!
//! A plugin is a static, `Copy` [`PluginDescriptor`]: a name, the service ids
//! it needs, an async setup hook and some metadata. Descriptors are usually
//! produced by [`define_plugin!`] and either registered at build time in
//! [`PLUGIN_REGISTRY`] or passed to [`PluginRegistry::from_descriptors`].
//!
//! # Example
//!
//! ```rust,ignore
//! use keystone_core::prelude::*;
//!
//! pub static GREETER: PluginDescriptor = define_plugin! {
//!     name: "greeter",
//!     requires: ["game.database"],
//!     description: "Says hello.",
//!     setup: |ctx| {
//!         ctx.log("greeter ready").await;
//!         Ok(())
//!     },
//! };
//! ```

use std::collections::{BTreeSet, HashSet};

use futures::future::BoxFuture;
use linkme::distributed_slice;
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::AppContext;
use crate::error::BoxError;
use crate::service::ServiceTypeId;

// ─── API versioning ───────────────────────────────────────────────────────────

/// Current Keystone plugin API version (1.0).
pub const KEYSTONE_PLUGIN_API_VERSION: u32 = 0x0001_0000;

fn format_version(version: u32) -> String {
    format!("{}.{}", version >> 16, version & 0xFFFF)
}

// ─── PluginMetadata ───────────────────────────────────────────────────────────

/// Descriptive metadata attached to every plugin.
///
/// # Defaults (through [`define_plugin!`])
///
/// | Field | Default |
/// |-------|---------|
/// | `version` | `CARGO_PKG_VERSION` of the defining crate |
/// | `description` | `CARGO_PKG_DESCRIPTION` of the defining crate |
/// | `developers` | empty |
/// | `url` | `None` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PluginMetadata {
    /// Plugin name.
    pub name: &'static str,
    /// Plugin version.
    pub version: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Authors.
    pub developers: &'static [&'static str],
    /// Homepage or repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'static str>,
}

impl PluginMetadata {
    /// Metadata with only a name set.
    pub const fn named(name: &'static str) -> Self {
        Self {
            name,
            version: "",
            description: "",
            developers: &[],
            url: None,
        }
    }
}

// ─── PluginDescriptor ─────────────────────────────────────────────────────────

/// Async setup hook of a plugin.
pub type SetupFn = fn(AppContext) -> BoxFuture<'static, Result<(), BoxError>>;

/// A static, `Copy` descriptor of a plugin.
#[derive(Debug, Clone, Copy)]
pub struct PluginDescriptor {
    /// Plugin API version this descriptor was compiled against.
    pub api_version: u32,

    /// Plugin name, used in logs and errors.
    pub name: &'static str,

    /// Service ids that must be constructed before `setup` runs.
    pub requires: &'static [&'static str],

    /// Setup hook, called once the service graph has settled.
    pub setup: SetupFn,

    /// Static metadata.
    pub metadata: PluginMetadata,
}

impl PluginDescriptor {
    /// Returns `true` if this descriptor's API version is compatible with the
    /// running host.
    ///
    /// The major part must match exactly; the descriptor's minor part must be
    /// ≤ the host's minor part.
    pub fn is_compatible(&self) -> bool {
        let host_major = KEYSTONE_PLUGIN_API_VERSION >> 16;
        let desc_major = self.api_version >> 16;
        let desc_minor = self.api_version & 0xFFFF;
        let host_minor = KEYSTONE_PLUGIN_API_VERSION & 0xFFFF;
        desc_major == host_major && desc_minor <= host_minor
    }

    /// Required services as ids.
    pub fn required_services(&self) -> Vec<ServiceTypeId> {
        self.requires.iter().copied().map(ServiceTypeId::from).collect()
    }

    /// Runs the setup hook.
    #[inline]
    pub fn run_setup(&self, ctx: AppContext) -> BoxFuture<'static, Result<(), BoxError>> {
        (self.setup)(ctx)
    }

    /// Returns this plugin's static [`PluginMetadata`].
    #[inline]
    pub fn metadata(&self) -> PluginMetadata {
        self.metadata
    }
}

// ─── Build-time registry ──────────────────────────────────────────────────────

/// Plugins contributed by every linked crate.
#[distributed_slice]
pub static PLUGIN_REGISTRY: [PluginDescriptor];

// ─── PluginRegistry ───────────────────────────────────────────────────────────

/// The plugins taking part in one bootstrap run.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    descriptors: Vec<PluginDescriptor>,
}

impl PluginRegistry {
    /// Creates a registry from explicit descriptors.
    ///
    /// Descriptors with an incompatible API version are kept but logged.
    /// A second descriptor with an already-seen name is dropped with a warning.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = PluginDescriptor>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for desc in descriptors {
            if !seen.insert(desc.name) {
                warn!(plugin = %desc.name, "Duplicate plugin name, keeping the first one");
                continue;
            }
            if !desc.is_compatible() {
                warn!(
                    plugin = %desc.name,
                    descriptor_version = %format_version(desc.api_version),
                    host_version = %format_version(KEYSTONE_PLUGIN_API_VERSION),
                    "Plugin API version mismatch, registering anyway"
                );
            }
            debug!(plugin = %desc.name, requires = ?desc.requires, "Plugin registered");
            kept.push(desc);
        }

        Self { descriptors: kept }
    }

    /// Collects every descriptor in [`PLUGIN_REGISTRY`].
    pub fn collect_all() -> Self {
        Self::from_descriptors(PLUGIN_REGISTRY.iter().copied())
    }

    /// Adds descriptors after construction, with the same checks.
    pub fn extend(self, descriptors: impl IntoIterator<Item = PluginDescriptor>) -> Self {
        Self::from_descriptors(self.descriptors.into_iter().chain(descriptors))
    }

    /// Iterates over descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.descriptors.iter()
    }

    /// Number of plugins.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no plugin is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Union of all plugin requirements, sorted and deduplicated.
    pub fn required_services(&self) -> BTreeSet<ServiceTypeId> {
        self.descriptors
            .iter()
            .flat_map(|d| d.requires.iter().copied())
            .map(ServiceTypeId::from)
            .collect()
    }

    /// Metadata of every plugin, in registration order.
    pub fn metadata(&self) -> Vec<PluginMetadata> {
        self.descriptors.iter().map(PluginDescriptor::metadata).collect()
    }
}

// ─── define_plugin! ───────────────────────────────────────────────────────────

#[doc(hidden)]
#[macro_export]
macro_rules! __keystone_or_default {
    (; $default:expr) => {
        $default
    };
    ($value:expr ; $default:expr) => {
        $value
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __keystone_setup {
    () => {{
        fn __keystone_setup(
            _ctx: $crate::AppContext,
        ) -> $crate::BoxFuture<'static, ::std::result::Result<(), $crate::BoxError>> {
            ::std::boxed::Box::pin(async { ::std::result::Result::Ok(()) })
        }
        __keystone_setup
    }};
    (|$ctx:ident| $body:expr) => {{
        fn __keystone_setup(
            $ctx: $crate::AppContext,
        ) -> $crate::BoxFuture<'static, ::std::result::Result<(), $crate::BoxError>> {
            ::std::boxed::Box::pin(async move {
                let result: ::std::result::Result<(), $crate::BoxError> = $body;
                result
            })
        }
        __keystone_setup
    }};
}

/// Builds a [`PluginDescriptor`] in a `static` item.
///
/// Every field except `name` is optional, but the order is fixed:
/// `name`, `requires`, `version`, `description`, `developers`, `url`, `setup`.
/// The setup body must evaluate to `Result<(), BoxError>`; `?` converts
/// any error that implements `Into<BoxError>`.
///
/// ```rust,ignore
/// pub static STATS: PluginDescriptor = define_plugin! {
///     name: "stats",
///     requires: ["game.database", "game.leaderboard"],
///     version: "2.1.0",
///     developers: ["ada"],
///     url: "https://example.org/stats",
///     setup: |ctx| {
///         let db = ctx.service::<Database>().ok_or("database missing")?;
///         db.migrate().await?;
///         Ok(())
///     },
/// };
/// ```
#[macro_export]
macro_rules! define_plugin {
    (
        name: $name:expr
        $(, requires: [$($req:expr),* $(,)?])?
        $(, version: $version:expr)?
        $(, description: $description:expr)?
        $(, developers: [$($dev:expr),* $(,)?])?
        $(, url: $url:expr)?
        $(, setup: |$ctx:ident| $body:expr)?
        $(,)?
    ) => {{
        $crate::PluginDescriptor {
            api_version: $crate::KEYSTONE_PLUGIN_API_VERSION,
            name: $name,
            requires: &[$($($req),*)?],
            setup: $crate::__keystone_setup!($(|$ctx| $body)?),
            metadata: $crate::PluginMetadata {
                name: $name,
                version: $crate::__keystone_or_default!($($version)? ; env!("CARGO_PKG_VERSION")),
                description: $crate::__keystone_or_default!(
                    $($description)? ; env!("CARGO_PKG_DESCRIPTION")
                ),
                developers: &[$($($dev),*)?],
                url: $crate::__keystone_or_default!(
                    $(::std::option::Option::Some($url))? ; ::std::option::Option::None
                ),
            },
        }
    }};
}
