//! Integration registry: immutable catalogue of supported third-party integrations.
//!
//! Built once at startup from the declarations in [`catalog`]. Construction fails
//! if a declaration names a category outside [`Category`] or reuses a name; the
//! binary treats that as fatal.

pub mod catalog;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use catalog::{Declaration, DeclaredKind};

const LOGO_PATH_SVG: &str = "images/integrations/logos/{name}.svg";
const LOGO_PATH_PNG: &str = "images/integrations/logos/{name}.png";
const BOT_LOGO_PATH_SVG: &str = "generated/bots/{name}/logo.svg";
const BOT_LOGO_PATH_PNG: &str = "generated/bots/{name}/logo.png";
const PLATFORM_LOGO_PATH: &str = "images/logo/icon-128x128.png";
const BOT_AVATAR_PATH: &str = "images/integrations/bot_avatars/{name}.png";
const HUBOT_GIT_URL: &str = "https://github.com/hubot-scripts/hubot-{name}";
const HUBOT_DOC_PATH: &str = "integrations/hubot_common.md";
const WEBHOOK_URL: &str = "api/v1/external/{name}";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("integration '{integration}': category '{category}' is not a known category")]
    UnknownCategory {
        integration: String,
        category: String,
    },

    #[error("integration '{0}' is declared twice")]
    DuplicateName(String),

    #[error("Integration '{0}' not found")]
    NotFound(String),
}

/// Fixed set of categories an integration may be listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    MetaIntegration,
    Bots,
    ContinuousIntegration,
    CustomerSupport,
    Deployment,
    Entertainment,
    Communication,
    Financial,
    Hr,
    Marketing,
    Misc,
    Monitoring,
    ProjectManagement,
    Productivity,
    VersionControl,
}

impl Category {
    pub const ALL: [Category; 15] = [
        Category::MetaIntegration,
        Category::Bots,
        Category::ContinuousIntegration,
        Category::CustomerSupport,
        Category::Deployment,
        Category::Entertainment,
        Category::Communication,
        Category::Financial,
        Category::Hr,
        Category::Marketing,
        Category::Misc,
        Category::Monitoring,
        Category::ProjectManagement,
        Category::Productivity,
        Category::VersionControl,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Category::MetaIntegration => "meta-integration",
            Category::Bots => "bots",
            Category::ContinuousIntegration => "continuous-integration",
            Category::CustomerSupport => "customer-support",
            Category::Deployment => "deployment",
            Category::Entertainment => "entertainment",
            Category::Communication => "communication",
            Category::Financial => "financial",
            Category::Hr => "hr",
            Category::Marketing => "marketing",
            Category::Misc => "misc",
            Category::Monitoring => "monitoring",
            Category::ProjectManagement => "project-management",
            Category::Productivity => "productivity",
            Category::VersionControl => "version-control",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::MetaIntegration => "Integration frameworks",
            Category::Bots => "Interactive bots",
            Category::ContinuousIntegration => "Continuous integration",
            Category::CustomerSupport => "Customer support",
            Category::Deployment => "Deployment",
            Category::Entertainment => "Entertainment",
            Category::Communication => "Communication",
            Category::Financial => "Financial",
            Category::Hr => "Human resources",
            Category::Marketing => "Marketing",
            Category::Misc => "Miscellaneous",
            Category::Monitoring => "Monitoring",
            Category::ProjectManagement => "Project management",
            Category::Productivity => "Productivity",
            Category::VersionControl => "Version control",
        }
    }

    /// Meta categories describe how an integration works rather than the kind of tool.
    pub fn is_meta(self) -> bool {
        matches!(self, Category::MetaIntegration | Category::Bots)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.key() == key)
    }
}

/// Value type accepted by a webhook configuration option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOptionKind {
    String,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookConfigOption {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ConfigOptionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrationKind {
    Generic,
    Webhook {
        url: String,
        dir_name: String,
        config_options: Vec<WebhookConfigOption>,
    },
    Bot,
    EmbeddedBot,
    Hubot {
        logo_alt: String,
        git_url: String,
    },
}

/// Immutable descriptor of one integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Integration {
    pub name: String,
    #[serde(flatten)]
    pub kind: IntegrationKind,
    pub categories: Vec<Category>,
    pub display_name: String,
    pub client_name: String,
    pub logo_path: Option<String>,
    pub doc_path: Option<String>,
    pub stream_name: String,
    pub secondary_line_text: Option<String>,
    pub legacy: bool,
}

impl Integration {
    pub fn is_webhook(&self) -> bool {
        matches!(self.kind, IntegrationKind::Webhook { .. })
    }

    pub fn webhook_url(&self) -> Option<&str> {
        match &self.kind {
            IntegrationKind::Webhook { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn bot_avatar_path(&self) -> Option<String> {
        let logo = self.logo_path.as_deref()?;
        let stem = Path::new(logo).file_stem()?.to_string_lossy();
        Some(BOT_AVATAR_PATH.replace("{name}", &stem))
    }

    pub fn category_labels(&self) -> Vec<&'static str> {
        self.categories.iter().map(|c| c.label()).collect()
    }
}

/// Read-only catalogue keyed by integration name.
#[derive(Debug, Clone)]
pub struct IntegrationRegistry {
    integrations: BTreeMap<String, Integration>,
    embedded_bots: BTreeMap<String, Integration>,
}

impl IntegrationRegistry {
    /// Build the built-in catalogue. `static_root` is probed for logo files.
    pub fn builtin(static_root: Option<&Path>) -> Result<Self, RegistryError> {
        Self::from_declarations(catalog::declarations(), catalog::embedded_bots(), static_root)
    }

    pub fn from_declarations(
        declarations: Vec<Declaration>,
        embedded: Vec<Declaration>,
        static_root: Option<&Path>,
    ) -> Result<Self, RegistryError> {
        let mut integrations = BTreeMap::new();
        for decl in declarations {
            let integration = build(decl, static_root)?;
            if integrations.contains_key(&integration.name) {
                return Err(RegistryError::DuplicateName(integration.name));
            }
            integrations.insert(integration.name.clone(), integration);
        }
        let mut embedded_bots = BTreeMap::new();
        for decl in embedded {
            let integration = build(decl, static_root)?;
            if embedded_bots.contains_key(&integration.name) {
                return Err(RegistryError::DuplicateName(integration.name));
            }
            embedded_bots.insert(integration.name.clone(), integration);
        }
        debug!(
            integrations = integrations.len(),
            embedded_bots = embedded_bots.len(),
            "integration registry built"
        );
        Ok(Self {
            integrations,
            embedded_bots,
        })
    }

    pub fn get(&self, name: &str) -> Result<&Integration, RegistryError> {
        self.integrations
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn embedded_bot(&self, name: &str) -> Result<&Integration, RegistryError> {
        self.embedded_bots
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All integrations in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Integration> {
        self.integrations.values()
    }

    pub fn len(&self) -> usize {
        self.integrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }

    pub fn webhooks(&self) -> impl Iterator<Item = &Integration> {
        self.iter().filter(|i| i.is_webhook())
    }

    /// (url, integration name) pairs to mount webhook endpoints on.
    pub fn webhook_urls(&self) -> Vec<(&str, &str)> {
        self.webhooks()
            .filter_map(|i| i.webhook_url().map(|u| (u, i.name.as_str())))
            .collect()
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Integration> {
        self.iter().filter(move |i| i.categories.contains(&category))
    }
}

/// Python-style title case: upper-case the first letter of every alphabetic run.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_alpha = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

fn probe_logo(static_root: Option<&Path>, templates: [&str; 2], name: &str) -> Option<String> {
    let root = static_root?;
    templates
        .iter()
        .map(|t| t.replace("{name}", name))
        .find(|rel| root.join(rel).is_file())
}

fn build(decl: Declaration, static_root: Option<&Path>) -> Result<Integration, RegistryError> {
    let mut categories = Vec::with_capacity(decl.categories.len());
    for key in decl.categories {
        let category = Category::from_key(key).ok_or_else(|| RegistryError::UnknownCategory {
            integration: decl.name.to_string(),
            category: key.to_string(),
        })?;
        categories.push(category);
    }

    let name = decl.name.to_string();
    let title = title_case(&name);
    let explicit_logo = decl.logo.map(str::to_string);
    let stream_name = decl.stream_name.unwrap_or(decl.name).to_string();
    let secondary_line_text = decl.secondary_line_text.map(str::to_string);

    let integration = match decl.kind {
        DeclaredKind::Generic => Integration {
            kind: IntegrationKind::Generic,
            categories,
            display_name: decl.display_name.map(str::to_string).unwrap_or(title),
            client_name: name.clone(),
            logo_path: explicit_logo
                .or_else(|| probe_logo(static_root, [LOGO_PATH_SVG, LOGO_PATH_PNG], &name)),
            doc_path: decl.doc.map(str::to_string),
            stream_name,
            secondary_line_text,
            legacy: decl.legacy,
            name,
        },
        DeclaredKind::Webhook => Integration {
            kind: IntegrationKind::Webhook {
                url: WEBHOOK_URL.replace("{name}", &name),
                dir_name: decl.dir_name.unwrap_or(decl.name).to_string(),
                config_options: decl.config_options,
            },
            categories,
            display_name: decl.display_name.map(str::to_string).unwrap_or_else(|| title.clone()),
            client_name: format!("{}Webhook", title),
            logo_path: explicit_logo
                .or_else(|| probe_logo(static_root, [LOGO_PATH_SVG, LOGO_PATH_PNG], &name)),
            doc_path: Some(
                decl.doc
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}/doc.md", name)),
            ),
            stream_name,
            secondary_line_text,
            legacy: decl.legacy,
            name,
        },
        DeclaredKind::Bot => Integration {
            kind: IntegrationKind::Bot,
            categories,
            display_name: format!(
                "{} Bot",
                decl.display_name.map(str::to_string).unwrap_or_else(|| title.clone())
            ),
            client_name: name.clone(),
            logo_path: Some(
                explicit_logo
                    .or_else(|| {
                        probe_logo(static_root, [BOT_LOGO_PATH_SVG, BOT_LOGO_PATH_PNG], &name)
                    })
                    .unwrap_or_else(|| PLATFORM_LOGO_PATH.to_string()),
            ),
            doc_path: Some(
                decl.doc
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}/doc.md", name)),
            ),
            stream_name,
            secondary_line_text,
            legacy: decl.legacy,
            name,
        },
        DeclaredKind::EmbeddedBot => Integration {
            kind: IntegrationKind::EmbeddedBot,
            categories,
            display_name: decl.display_name.map(str::to_string).unwrap_or_else(|| title.clone()),
            client_name: format!("{}EmbeddedBot", title),
            logo_path: explicit_logo
                .or_else(|| probe_logo(static_root, [LOGO_PATH_SVG, LOGO_PATH_PNG], &name)),
            doc_path: decl.doc.map(str::to_string),
            stream_name,
            secondary_line_text,
            legacy: decl.legacy,
            name,
        },
        DeclaredKind::Hubot => Integration {
            kind: IntegrationKind::Hubot {
                logo_alt: decl
                    .logo_alt
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{} logo", title)),
                git_url: HUBOT_GIT_URL.replace("{name}", &name),
            },
            categories,
            display_name: decl.display_name.map(str::to_string).unwrap_or(title),
            client_name: name.clone(),
            logo_path: explicit_logo
                .or_else(|| probe_logo(static_root, [LOGO_PATH_SVG, LOGO_PATH_PNG], &name)),
            doc_path: Some(HUBOT_DOC_PATH.to_string()),
            stream_name,
            secondary_line_text,
            legacy: decl.legacy,
            name,
        },
    };
    Ok(integration)
}

#[cfg(test)]
mod tests {
    use super::catalog::{generic, webhook};
    use super::*;

    #[test]
    fn test_builtin_registry_builds() {
        let registry = IntegrationRegistry::builtin(None).unwrap();
        assert!(registry.len() > 100);
        let github = registry.get("github").unwrap();
        assert_eq!(github.display_name, "GitHub");
        assert_eq!(github.webhook_url(), Some("api/v1/external/github"));
        assert_eq!(github.client_name, "GithubWebhook");
        assert_eq!(github.categories, vec![Category::VersionControl]);
    }

    #[test]
    fn test_unknown_name_is_not_found() {
        let registry = IntegrationRegistry::builtin(None).unwrap();
        assert_eq!(
            registry.get("carrier-pigeon"),
            Err(RegistryError::NotFound("carrier-pigeon".into()))
        );
    }

    #[test]
    fn test_unknown_category_aborts_construction() {
        let decls = vec![webhook("teapot", &["beverages"])];
        let err = IntegrationRegistry::from_declarations(decls, vec![], None).unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownCategory {
                integration: "teapot".into(),
                category: "beverages".into(),
            }
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let decls = vec![webhook("jira", &["misc"]), generic("jira", &["misc"])];
        assert_eq!(
            IntegrationRegistry::from_declarations(decls, vec![], None).unwrap_err(),
            RegistryError::DuplicateName("jira".into())
        );
    }

    #[test]
    fn test_title_case_matches_python() {
        assert_eq!(title_case("big-blue-button"), "Big-Blue-Button");
        assert_eq!(title_case("slack_incoming"), "Slack_Incoming");
        assert_eq!(title_case("bitbucket3"), "Bitbucket3");
        assert_eq!(title_case("xKCD"), "Xkcd");
    }

    #[test]
    fn test_kind_defaults() {
        let registry = IntegrationRegistry::builtin(None).unwrap();

        let xkcd = registry.get("xkcd").unwrap();
        assert_eq!(xkcd.kind, IntegrationKind::Bot);
        assert_eq!(xkcd.display_name, "xkcd Bot");
        assert_eq!(xkcd.doc_path.as_deref(), Some("xkcd/doc.md"));
        assert_eq!(
            xkcd.bot_avatar_path().as_deref(),
            Some("images/integrations/bot_avatars/xkcd.png")
        );

        let bonusly = registry.get("bonusly").unwrap();
        match &bonusly.kind {
            IntegrationKind::Hubot { logo_alt, git_url } => {
                assert_eq!(logo_alt, "Bonusly logo");
                assert_eq!(git_url, "https://github.com/hubot-scripts/hubot-bonusly");
            }
            other => panic!("unexpected kind {:?}", other),
        }

        let bitbucket = registry.get("bitbucket").unwrap();
        assert!(bitbucket.legacy);
        assert_eq!(bitbucket.stream_name, "commits");

        let converter = registry.embedded_bot("converter").unwrap();
        assert_eq!(converter.client_name, "ConverterEmbeddedBot");
        assert!(registry.get("converter").is_err());
    }

    #[test]
    fn test_logo_probing_prefers_svg() {
        let dir = tempfile::tempdir().unwrap();
        let logos = dir.path().join("images/integrations/logos");
        std::fs::create_dir_all(&logos).unwrap();
        std::fs::write(logos.join("sentry.png"), b"png").unwrap();
        std::fs::write(logos.join("grafana.svg"), b"svg").unwrap();
        std::fs::write(logos.join("grafana.png"), b"png").unwrap();

        let registry = IntegrationRegistry::builtin(Some(dir.path())).unwrap();
        assert_eq!(
            registry.get("sentry").unwrap().logo_path.as_deref(),
            Some("images/integrations/logos/sentry.png")
        );
        assert_eq!(
            registry.get("grafana").unwrap().logo_path.as_deref(),
            Some("images/integrations/logos/grafana.svg")
        );
        assert_eq!(registry.get("raygun").unwrap().logo_path, None);
    }

    #[test]
    fn test_webhook_urls_and_categories() {
        let registry = IntegrationRegistry::builtin(None).unwrap();
        let urls = registry.webhook_urls();
        assert!(urls.contains(&("api/v1/external/zabbix", "zabbix")));
        assert!(urls.iter().all(|(u, _)| u.starts_with("api/v1/external/")));
        assert!(
            registry
                .by_category(Category::Financial)
                .any(|i| i.name == "stripe")
        );
        assert!(Category::Bots.is_meta());
        assert_eq!(Category::from_key("hr"), Some(Category::Hr));
    }
}
