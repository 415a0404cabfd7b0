//! Precompiled template cache.
//!
//! The cache is built once at startup and shared read-only between requests.
//! Each page gets its own Handlebars registry holding:
//! - the `base` layout, which is the entry point used by
//!   [`Application::render`](crate::Application::render)
//! - every shared partial, registered under its file stem (`nav`)
//! - the page itself, registered as the `main` partial
//!
//! On disk the layout is:
//!
//! ```text
//! <dir>/base.tmpl
//! <dir>/partials/*.tmpl
//! <dir>/pages/*.tmpl
//! ```
//!
//! Pages are keyed by file name, e.g. `home.tmpl`.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::DateTime;
use handlebars::{handlebars_helper, Handlebars};
use tracing::debug;

use crate::error::Error;

/// Name of the entry-point template in every page registry.
pub const BASE_TEMPLATE: &str = "base";

/// Partial name each page is registered under.
pub const PAGE_PARTIAL: &str = "main";

const TEMPLATE_EXTENSION: &str = "tmpl";

handlebars_helper!(human_date: |timestamp: str| {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.format("%d %b %Y at %H:%M").to_string())
        .unwrap_or_default()
});

/// Raw template sources used to build a [`TemplateCache`].
///
/// # Examples
///
/// ```
/// use snippetbox::templates::{TemplateCache, TemplateSources};
///
/// let sources = TemplateSources::new("<main>{{> main}}</main>")
///     .page("home.tmpl", "<h2>Latest</h2>");
/// let cache = TemplateCache::from_sources(&sources).expect("templates compile");
///
/// assert!(cache.get("home.tmpl").is_some());
/// assert!(cache.get("missing.tmpl").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateSources {
    base: String,
    partials: Vec<(String, String)>,
    pages: Vec<(String, String)>,
}

impl TemplateSources {
    /// Starts a source set with the given `base` layout.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            partials: Vec::new(),
            pages: Vec::new(),
        }
    }

    /// Adds a shared partial available to every page.
    pub fn partial(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.partials.push((name.into(), source.into()));
        self
    }

    /// Adds a page.
    pub fn page(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.pages.push((name.into(), source.into()));
        self
    }

    /// Reads sources from a template directory.
    ///
    /// Files outside `partials/` and `pages/`, and files without a `.tmpl`
    /// extension, are ignored. A missing `partials/` directory is allowed.
    pub fn read_dir(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = dir.as_ref();
        let base_path = dir.join(format!("{BASE_TEMPLATE}.{TEMPLATE_EXTENSION}"));
        let base = fs::read_to_string(&base_path).map_err(|e| Error::io(&base_path, e))?;

        let mut sources = Self::new(base);

        let partials_dir = dir.join("partials");
        if partials_dir.is_dir() {
            for path in template_files(&partials_dir)? {
                let name = file_stem(&path);
                let source = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
                sources = sources.partial(name, source);
            }
        }

        for path in template_files(&dir.join("pages"))? {
            let name = file_name(&path);
            let source = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            sources = sources.page(name, source);
        }

        Ok(sources)
    }
}

/// Mapping from page name to its compiled template registry.
#[derive(Debug, Default)]
pub struct TemplateCache {
    pages: HashMap<String, Handlebars<'static>>,
}

impl TemplateCache {
    /// Loads and compiles every page under `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let sources = TemplateSources::read_dir(dir)?;
        Self::from_sources(&sources)
    }

    /// Compiles a cache from in-memory sources.
    pub fn from_sources(sources: &TemplateSources) -> Result<Self, Error> {
        let mut pages = HashMap::with_capacity(sources.pages.len());

        for (page, page_source) in &sources.pages {
            let mut registry = new_registry();

            register(&mut registry, BASE_TEMPLATE, &sources.base, Kind::Template)?;
            for (name, source) in &sources.partials {
                register(&mut registry, name, source, Kind::Partial)?;
            }
            register(&mut registry, PAGE_PARTIAL, page_source, Kind::Partial).map_err(
                |err| match err {
                    Error::TemplateParse { source, .. } => Error::TemplateParse {
                        name: page.clone(),
                        source,
                    },
                    other => other,
                },
            )?;

            debug!(page = %page, "compiled template");
            pages.insert(page.clone(), registry);
        }

        Ok(Self { pages })
    }

    /// Returns the registry for `page`, if cached.
    pub fn get(&self, page: &str) -> Option<&Handlebars<'static>> {
        self.pages.get(page)
    }

    /// Returns the cached page names, sorted.
    pub fn pages(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of cached pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns `true` if no page is cached.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Template,
    Partial,
}

fn new_registry() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(false);
    registry.set_dev_mode(false);
    registry.register_helper("human_date", Box::new(human_date));
    registry
}

fn register(
    registry: &mut Handlebars<'static>,
    name: &str,
    source: &str,
    kind: Kind,
) -> Result<(), Error> {
    let result = match kind {
        Kind::Template => registry.register_template_string(name, source),
        Kind::Partial => registry.register_partial(name, source),
    };

    result.map_err(|e| Error::TemplateParse {
        name: name.to_string(),
        source: Box::new(e),
    })
}

fn template_files(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == TEMPLATE_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sources() -> TemplateSources {
        TemplateSources::new("<title>{{title}}</title>{{> nav}}<main>{{> main}}</main>")
            .partial("nav", "<nav>{{#if is_authenticated}}Logout{{else}}Login{{/if}}</nav>")
            .page("home.tmpl", "<h2>Home</h2>")
            .page("view.tmpl", "<p>{{human_date created}}</p>")
    }

    #[test]
    fn every_page_gets_its_own_registry() {
        let cache = TemplateCache::from_sources(&sources()).expect("templates compile");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.pages(), vec!["home.tmpl", "view.tmpl"]);
    }

    #[test]
    fn base_renders_page_as_main_partial() {
        let cache = TemplateCache::from_sources(&sources()).expect("templates compile");
        let registry = cache.get("home.tmpl").expect("cached");

        let html = registry
            .render(BASE_TEMPLATE, &json!({"title": "Home", "is_authenticated": true}))
            .expect("renders");

        assert_eq!(
            html,
            "<title>Home</title><nav>Logout</nav><main><h2>Home</h2></main>"
        );
    }

    #[test]
    fn human_date_formats_rfc3339() {
        let cache = TemplateCache::from_sources(&sources()).expect("templates compile");
        let registry = cache.get("view.tmpl").expect("cached");

        let html = registry
            .render(BASE_TEMPLATE, &json!({"created": "2024-03-17T10:15:00Z"}))
            .expect("renders");

        assert!(html.contains("17 Mar 2024 at 10:15"));
    }

    #[test]
    fn unparsable_page_reports_page_name() {
        let sources = TemplateSources::new("{{> main}}").page("broken.tmpl", "{{#if flash}}never closed");

        let err = TemplateCache::from_sources(&sources).expect_err("should not compile");
        match err {
            Error::TemplateParse { name, .. } => assert_eq!(name, "broken.tmpl"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_sources_build_empty_cache() {
        let cache = TemplateCache::from_sources(&TemplateSources::new("")).expect("compiles");
        assert!(cache.is_empty());
    }

    #[test]
    fn read_dir_loads_layout() {
        let dir = std::env::temp_dir().join(format!("snippetbox-templates-{}", std::process::id()));
        fs::create_dir_all(dir.join("partials")).unwrap();
        fs::create_dir_all(dir.join("pages")).unwrap();
        fs::write(dir.join("base.tmpl"), "[{{> nav}}|{{> main}}]").unwrap();
        fs::write(dir.join("partials/nav.tmpl"), "nav").unwrap();
        fs::write(dir.join("pages/home.tmpl"), "home").unwrap();
        fs::write(dir.join("pages/notes.txt"), "ignored").unwrap();

        let cache = TemplateCache::load(&dir).expect("loads");
        let html = cache
            .get("home.tmpl")
            .unwrap()
            .render(BASE_TEMPLATE, &json!({}))
            .unwrap();

        assert_eq!(cache.pages(), vec!["home.tmpl"]);
        assert_eq!(html, "[nav|home]");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let err = TemplateCache::load("/definitely/not/a/template/dir").expect_err("missing");
        assert!(matches!(err, Error::Io { .. }));
    }
}
