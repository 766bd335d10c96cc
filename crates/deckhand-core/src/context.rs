//! Deploy context
//!
//! Every template argument is rendered against a [`DeployContext`]. The
//! context is built once per invocation (defaults, then `[vars]` from the
//! configuration, then per-task variables) and passed explicitly to every
//! operation that needs it.

use std::collections::BTreeMap;

use chrono::Local;

use crate::config::Config;
use crate::template::{self, Vars};
use crate::Result;

/// Default package index
pub const DEFAULT_PYPI: &str = "http://pypi.python.org/simple";

/// Default Python interpreter on the target
pub const DEFAULT_PYTHON: &str = "python";

/// Template for the virtualenv creation command
const VIRTUALENV_TEMPLATE: &str = "virtualenv -p {python} --no-site-packages --distribute";

/// Variables available to templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployContext {
    vars: BTreeMap<String, String>,
}

impl DeployContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded with the standard defaults
    ///
    /// Sets `deploy_user`, `deploy_hostname`, `pypi`, `python`,
    /// `virtualenv` and `now`.
    pub fn with_defaults() -> Self {
        let mut ctx = Self::base_defaults();
        ctx.refresh_virtualenv();
        ctx
    }

    /// Build the context for a configuration: defaults overlaid with `[vars]`
    pub fn from_config(config: &Config) -> Self {
        Self::from_config_with(config, Vec::<(String, String)>::new())
    }

    /// Like [`from_config`](Self::from_config), with `overrides` applied
    /// on top of `[vars]` before derived variables are filled in
    pub fn from_config_with<K, V>(
        config: &Config,
        overrides: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut ctx = Self::base_defaults();
        ctx.extend(config.vars.clone());
        ctx.extend(overrides);
        ctx.refresh_virtualenv();
        ctx
    }

    fn base_defaults() -> Self {
        let mut ctx = Self::new();
        ctx.set("deploy_user", local_user());
        ctx.set("deploy_hostname", local_hostname());
        ctx.set("pypi", DEFAULT_PYPI);
        ctx.set("python", DEFAULT_PYTHON);
        ctx.set("now", Local::now().format("%Y%m%d%H%M%S").to_string());
        ctx
    }

    /// Record the source revision and derive `base = "{now}-{gitrev}"`
    pub fn set_revision(&mut self, gitrev: impl Into<String>) -> Result<()> {
        self.set("gitrev", gitrev);
        let base = self.render("{now}-{gitrev}")?;
        self.set("base", base);
        Ok(())
    }

    /// Get a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Check whether a variable is set
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Set a variable, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Set several variables at once
    pub fn extend<K, V>(&mut self, vars: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.set(key, value);
        }
    }

    /// Return a copy of this context with extra variables
    pub fn with<K, V>(&self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut ctx = self.clone();
        ctx.extend(vars);
        ctx
    }

    /// Render a template against this context
    pub fn render(&self, template: &str) -> Result<String> {
        template::render(template, self)
    }

    /// Iterate over all variables in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Re-derive `virtualenv` from `python` unless it was set explicitly
    fn refresh_virtualenv(&mut self) {
        if let Ok(cmd) = self.render(VIRTUALENV_TEMPLATE) {
            self.vars.entry("virtualenv".to_string()).or_insert(cmd);
        }
    }
}

impl Vars for DeployContext {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key)
    }
}

fn local_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = DeployContext::with_defaults();
        assert_eq!(ctx.get("python"), Some("python"));
        assert_eq!(ctx.get("pypi"), Some(DEFAULT_PYPI));
        assert_eq!(
            ctx.get("virtualenv"),
            Some("virtualenv -p python --no-site-packages --distribute")
        );
        assert_eq!(ctx.get("now").map(str::len), Some(14));
        assert!(ctx.contains("deploy_user"));
        assert!(ctx.contains("deploy_hostname"));
        assert!(!ctx.contains("base"));
    }

    #[test]
    fn test_from_config_overrides_defaults() {
        let config = Config::parse(
            r#"
[vars]
python = "python3"
home = "/srv/app"
"#,
        )
        .unwrap();

        let ctx = DeployContext::from_config(&config);
        assert_eq!(ctx.get("python"), Some("python3"));
        assert_eq!(ctx.get("home"), Some("/srv/app"));
        assert_eq!(
            ctx.get("virtualenv"),
            Some("virtualenv -p python3 --no-site-packages --distribute")
        );
    }

    #[test]
    fn test_overrides_feed_derived_virtualenv() {
        let config = Config::parse(
            r#"
[vars]
python = "python3"
"#,
        )
        .unwrap();

        let ctx = DeployContext::from_config_with(&config, [("python", "python3.12")]);
        assert_eq!(ctx.get("python"), Some("python3.12"));
        assert_eq!(
            ctx.get("virtualenv"),
            Some("virtualenv -p python3.12 --no-site-packages --distribute")
        );
    }

    #[test]
    fn test_set_revision_derives_base() {
        let mut ctx = DeployContext::new();
        ctx.set("now", "20240102030405");
        ctx.set_revision("v1.2-3-gabc").unwrap();
        assert_eq!(ctx.get("base"), Some("20240102030405-v1.2-3-gabc"));
    }

    #[test]
    fn test_with_does_not_touch_parent() {
        let mut parent = DeployContext::new();
        parent.set("acct", "app");
        let child = parent.with([("nginx_vhost_name", "example")]);

        assert_eq!(child.get("acct"), Some("app"));
        assert_eq!(child.get("nginx_vhost_name"), Some("example"));
        assert!(!parent.contains("nginx_vhost_name"));
    }

    #[test]
    fn test_render_against_context() {
        let mut ctx = DeployContext::new();
        ctx.set("home", "/srv/app");
        assert_eq!(ctx.render("{home}/service").unwrap(), "/srv/app/service");
        assert!(ctx.render("{acct}").is_err());
    }
}
