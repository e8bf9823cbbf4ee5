//! Comprehensive theming: a theme directory overrides templates, static files,
//! locales and the favicon of the LMS.
//!
//! A theme is applied by deriving a new [`SiteSettings`] value with
//! [`SiteSettings::with_comp_theme`]; the settings it was derived from are left
//! unchanged, so a themed configuration only lives as long as that value.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

pub const MAIN_NAMESPACE: &str = "main";
pub const DEFAULT_FAVICON_PATH: &str = "images/favicon.ico";

/// Ordered template directories per namespace. Earlier directories win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateLookup {
    namespaces: HashMap<String, Vec<PathBuf>>,
}

impl TemplateLookup {
    pub fn add_lookup(&mut self, namespace: &str, directory: impl Into<PathBuf>, prepend: bool) {
        let directory = directory.into();
        let directories = self.namespaces.entry(namespace.to_string()).or_default();
        if directories.contains(&directory) {
            return;
        }
        if prepend {
            directories.insert(0, directory);
        } else {
            directories.push(directory);
        }
    }

    pub fn directories(&self, namespace: &str) -> &[PathBuf] {
        self.namespaces
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First existing file called `name` in the namespace's directories.
    /// Names that climb out of a directory never resolve.
    pub fn resolve(&self, namespace: &str, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        self.directories(namespace)
            .iter()
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.is_file())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSettings {
    pub comp_theme_dir: Option<PathBuf>,
    pub template_dirs: Vec<PathBuf>,
    pub staticfiles_dirs: Vec<PathBuf>,
    pub locale_paths: Vec<PathBuf>,
    pub favicon_path: String,
    pub lookups: TemplateLookup,
}

impl SiteSettings {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        let template_dir = template_dir.into();
        let mut lookups = TemplateLookup::default();
        lookups.add_lookup(MAIN_NAMESPACE, template_dir.clone(), false);

        Self {
            comp_theme_dir: None,
            template_dirs: vec![template_dir],
            staticfiles_dirs: Vec::new(),
            locale_paths: Vec::new(),
            favicon_path: DEFAULT_FAVICON_PATH.to_string(),
            lookups,
        }
    }

    /// A copy of these settings with the theme at `theme_dir` applied.
    pub fn with_comp_theme(&self, theme_dir: &Path) -> Self {
        let changes = comprehensive_theme_changes(theme_dir, self);
        let mut themed = self.clone();
        themed.comp_theme_dir = Some(theme_dir.to_path_buf());

        let overrides = changes.settings;
        if let Some(dirs) = overrides.template_dirs {
            themed.template_dirs = dirs;
        }
        if let Some(dirs) = overrides.staticfiles_dirs {
            themed.staticfiles_dirs = dirs;
        }
        if let Some(paths) = overrides.locale_paths {
            themed.locale_paths = paths;
        }
        if let Some(favicon) = overrides.favicon_path {
            themed.favicon_path = favicon;
        }

        for template_dir in changes.template_paths {
            themed.lookups.add_lookup(MAIN_NAMESPACE, template_dir, true);
        }

        debug!("applied comprehensive theme {}", theme_dir.display());
        themed
    }
}

/// Settings a theme replaces. `None` leaves the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub template_dirs: Option<Vec<PathBuf>>,
    pub staticfiles_dirs: Option<Vec<PathBuf>>,
    pub locale_paths: Option<Vec<PathBuf>>,
    pub favicon_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeChanges {
    pub settings: SettingsOverrides,
    /// Directories to prepend to the main template lookup.
    pub template_paths: Vec<PathBuf>,
}

fn prepended(first: PathBuf, rest: &[PathBuf]) -> Vec<PathBuf> {
    std::iter::once(first).chain(rest.iter().cloned()).collect()
}

/// Compute what applying the theme at `theme_dir` on top of `base` changes.
/// Only parts the theme actually ships are overridden.
pub fn comprehensive_theme_changes(theme_dir: &Path, base: &SiteSettings) -> ThemeChanges {
    let mut changes = ThemeChanges::default();
    let lms_dir = theme_dir.join("lms");

    let templates_dir = lms_dir.join("templates");
    if templates_dir.is_dir() {
        changes.settings.template_dirs = Some(prepended(templates_dir.clone(), &base.template_dirs));
        changes.template_paths.push(templates_dir);
    }

    let staticfiles_dir = lms_dir.join("static");
    if staticfiles_dir.is_dir() {
        changes.settings.staticfiles_dirs =
            Some(prepended(staticfiles_dir.clone(), &base.staticfiles_dirs));
    }

    let locale_dir = lms_dir.join("conf").join("locale");
    if locale_dir.is_dir() {
        changes.settings.locale_paths = Some(prepended(locale_dir, &base.locale_paths));
    }

    if staticfiles_dir.join("images").join("favicon.ico").is_file() {
        if let Some(theme_name) = theme_dir.file_name() {
            changes.settings.favicon_path = Some(format!(
                "themes/{}/images/favicon.ico",
                theme_name.to_string_lossy()
            ));
        }
    }

    changes
}
