//! Ordered plugin list with notify and filter dispatch.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::builtin::{plugin_kinds, CleanOutputPlugin, PluginManifest};
use super::plugin::{FilterPoint, NotifyEvent, Plugin};
use super::ExtensionPoint;
use crate::config::RunContext;
use crate::registry::{discover_manifests, Registry, RegistryError};

/// Plugins in dispatch order.
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginManager {
    /// Manager without plugins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager preloaded with the output cleaner.
    pub fn with_builtins() -> Self {
        let mut manager = Self::new();
        manager.plugins.push(Box::new(CleanOutputPlugin::default()));
        manager
    }

    /// Appends a plugin. Names must be unique.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), RegistryError> {
        let name = plugin.name().to_string();
        if self.plugins.iter().any(|p| p.name() == name) {
            return Err(RegistryError::DuplicateName {
                kind: "plugin",
                name,
            });
        }
        debug!(plugin = %name, "Registered plugin");
        self.plugins.push(plugin);
        Ok(())
    }

    /// Loads every manifest in `dir` using the built-in plugin kinds.
    /// Returns the number of plugins added.
    pub fn discover(&mut self, dir: &Path) -> usize {
        self.discover_with(dir, &plugin_kinds())
    }

    /// Loads every manifest in `dir`, building each through `kinds`. Broken
    /// manifests, unknown kinds and duplicate names are logged and skipped.
    pub fn discover_with(
        &mut self,
        dir: &Path,
        kinds: &Registry<dyn Plugin, PluginManifest>,
    ) -> usize {
        let mut added = 0;
        for manifest in discover_manifests::<PluginManifest>(dir) {
            let path = manifest.path.display().to_string();
            let plugin = match kinds.resolve(&manifest.body.kind, &manifest.body) {
                Ok(plugin) => plugin,
                Err(e) => {
                    warn!(path = %path, "Skipping plugin manifest: {e:#}");
                    continue;
                }
            };
            match self.register(plugin) {
                Ok(()) => {
                    info!(plugin = %manifest.body.name, path = %path, "Loaded plugin");
                    added += 1;
                }
                Err(e) => warn!(path = %path, "Skipping plugin manifest: {e}"),
            }
        }
        added
    }

    /// Plugin names in dispatch order.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Number of plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Calls every plugin for a notify point. Failures are logged.
    pub fn notify(&self, ctx: &RunContext, event: NotifyEvent<'_>) {
        let point = event.point();
        for plugin in &self.plugins {
            let outcome = guarded(plugin.as_ref(), point, || match event {
                NotifyEvent::RunStart => plugin.on_run_start(ctx),
                NotifyEvent::DataFetched { commits, stats } => {
                    plugin.on_data_fetched(ctx, commits, stats)
                }
                NotifyEvent::RunEnd(end) => plugin.on_run_end(ctx, end),
            });
            if outcome.is_some() {
                debug!(plugin = %plugin.name(), point = %point, "Plugin notified");
            }
        }
    }

    /// Threads `value` through every plugin for a filter point.
    ///
    /// A plugin returning nothing or an empty string leaves the value as is;
    /// a failing plugin leaves it as it was before that plugin ran.
    pub fn filter(&self, point: FilterPoint, ctx: &RunContext, value: String) -> String {
        let ext = point.point();
        let mut current = value;
        for plugin in &self.plugins {
            let replacement = guarded(plugin.as_ref(), ext, || match point {
                FilterPoint::SummaryProduced => plugin.on_summary_produced(ctx, &current),
                FilterPoint::ReportRendered => plugin.on_report_rendered(ctx, &current),
            });
            if let Some(Some(next)) = replacement {
                if !next.is_empty() {
                    debug!(plugin = %plugin.name(), point = %ext, "Plugin replaced value");
                    current = next;
                }
            }
        }
        current
    }
}

/// Runs one plugin call, turning errors and panics into a log line.
fn guarded<T>(
    plugin: &dyn Plugin,
    point: ExtensionPoint,
    call: impl FnOnce() -> Result<T>,
) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(plugin = %plugin.name(), point = %point, "Plugin failed: {e:#}");
            None
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(plugin = %plugin.name(), point = %point, "Plugin panicked: {message}");
            None
        }
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RepoLocator, Settings};
    use crate::hooks::RunEndEvent;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn ctx() -> RunContext {
        RunContext::new(
            RepoLocator::parse("/srv/widgets").unwrap(),
            std::env::temp_dir(),
            Arc::new(Settings::isolated(Vec::<(String, String)>::new())),
        )
    }

    struct Marker(&'static str);

    impl Plugin for Marker {
        fn name(&self) -> &str {
            self.0
        }

        fn on_summary_produced(&self, _ctx: &RunContext, summary: &str) -> Result<Option<String>> {
            Ok(Some(format!("{summary}[{}]", self.0)))
        }
    }

    struct Failing;

    impl Plugin for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_run_start(&self, _ctx: &RunContext) -> Result<()> {
            anyhow::bail!("boom")
        }

        fn on_summary_produced(&self, _ctx: &RunContext, _summary: &str) -> Result<Option<String>> {
            anyhow::bail!("boom")
        }
    }

    struct Panicking;

    impl Plugin for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn on_summary_produced(&self, _ctx: &RunContext, _summary: &str) -> Result<Option<String>> {
            panic!("plugin bug")
        }
    }

    struct Blank;

    impl Plugin for Blank {
        fn name(&self) -> &str {
            "blank"
        }

        fn on_summary_produced(&self, _ctx: &RunContext, _summary: &str) -> Result<Option<String>> {
            Ok(Some(String::new()))
        }
    }

    struct Counter(Arc<AtomicUsize>);

    impl Plugin for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn on_run_start(&self, _ctx: &RunContext) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_run_end(&self, _ctx: &RunContext, event: &RunEndEvent) -> Result<()> {
            assert!(!event.succeeded);
            self.0.fetch_add(10, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn filters_compose_left_to_right() {
        let mut manager = PluginManager::new();
        manager.register(Box::new(Marker("A"))).unwrap();
        manager.register(Box::new(Marker("B"))).unwrap();
        let out = manager.filter(FilterPoint::SummaryProduced, &ctx(), "s".to_string());
        assert_eq!(out, "s[A][B]");
    }

    #[test]
    fn failures_leave_value_and_later_plugins_run() {
        let mut manager = PluginManager::new();
        manager.register(Box::new(Marker("A"))).unwrap();
        manager.register(Box::new(Failing)).unwrap();
        manager.register(Box::new(Panicking)).unwrap();
        manager.register(Box::new(Blank)).unwrap();
        manager.register(Box::new(Marker("B"))).unwrap();
        let out = manager.filter(FilterPoint::SummaryProduced, &ctx(), "s".to_string());
        assert_eq!(out, "s[A][B]");
    }

    #[test]
    fn notify_reaches_every_plugin() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut manager = PluginManager::new();
        manager.register(Box::new(Failing)).unwrap();
        manager.register(Box::new(Counter(count.clone()))).unwrap();

        manager.notify(&ctx(), NotifyEvent::RunStart);
        manager.notify(&ctx(), NotifyEvent::RunEnd(&RunEndEvent::aborted("not a repo")));
        assert_eq!(count.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn builtins_strip_fenced_summaries() {
        let manager = PluginManager::with_builtins();
        assert_eq!(manager.names(), vec!["clean-output"]);
        let cleaned = manager.filter(
            FilterPoint::SummaryProduced,
            &ctx(),
            "```markdown\n# Today\n```".to_string(),
        );
        assert_eq!(cleaned, "# Today");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut manager = PluginManager::new();
        manager.register(Box::new(Marker("A"))).unwrap();
        assert!(manager.register(Box::new(Marker("A"))).is_err());
        assert_eq!(manager.names(), vec!["A"]);
    }

    #[test]
    fn discovery_loads_manifests_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("20-footer.yaml"),
            "name: footer\nkind: footer\nhtml: <p>f</p>\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("10-redact.yaml"),
            "name: redact\nkind: redact\nwords: [password]\n",
        )
        .unwrap();
        fs::write(dir.path().join("30-bad.yaml"), "name: x\nkind: teleport\n").unwrap();
        fs::write(dir.path().join("40-broken.json"), "{").unwrap();

        let mut manager = PluginManager::with_builtins();
        assert_eq!(manager.discover(dir.path()), 2);
        assert_eq!(manager.names(), vec!["clean-output", "redact", "footer"]);

        let summary = manager.filter(
            FilterPoint::SummaryProduced,
            &ctx(),
            "```markdown\nthe password is hunter2\n```".to_string(),
        );
        assert_eq!(summary, "the *** is hunter2");
    }
}
