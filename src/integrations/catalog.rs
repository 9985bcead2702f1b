//! Built-in integration declarations.
//!
//! Categories are written as keys so that a typo is caught when the registry is
//! built instead of silently producing an uncategorised entry.

use super::{ConfigOptionKind, WebhookConfigOption};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredKind {
    Generic,
    Webhook,
    Bot,
    EmbeddedBot,
    Hubot,
}

/// Raw declaration; defaults are filled in by the registry.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: DeclaredKind,
    pub name: &'static str,
    pub categories: &'static [&'static str],
    pub display_name: Option<&'static str>,
    pub logo: Option<&'static str>,
    pub logo_alt: Option<&'static str>,
    pub doc: Option<&'static str>,
    pub stream_name: Option<&'static str>,
    pub secondary_line_text: Option<&'static str>,
    pub dir_name: Option<&'static str>,
    pub legacy: bool,
    pub config_options: Vec<WebhookConfigOption>,
}

fn declare(
    kind: DeclaredKind,
    name: &'static str,
    categories: &'static [&'static str],
) -> Declaration {
    Declaration {
        kind,
        name,
        categories,
        display_name: None,
        logo: None,
        logo_alt: None,
        doc: None,
        stream_name: None,
        secondary_line_text: None,
        dir_name: None,
        legacy: false,
        config_options: Vec::new(),
    }
}

pub fn generic(name: &'static str, categories: &'static [&'static str]) -> Declaration {
    declare(DeclaredKind::Generic, name, categories)
}

pub fn webhook(name: &'static str, categories: &'static [&'static str]) -> Declaration {
    declare(DeclaredKind::Webhook, name, categories)
}

pub fn bot(name: &'static str, categories: &'static [&'static str]) -> Declaration {
    declare(DeclaredKind::Bot, name, categories)
}

pub fn embedded_bot(name: &'static str) -> Declaration {
    declare(DeclaredKind::EmbeddedBot, name, &[])
}

pub fn hubot(name: &'static str, categories: &'static [&'static str]) -> Declaration {
    declare(DeclaredKind::Hubot, name, categories)
}

impl Declaration {
    pub fn display(mut self, display_name: &'static str) -> Self {
        self.display_name = Some(display_name);
        self
    }

    pub fn logo(mut self, logo: &'static str) -> Self {
        self.logo = Some(logo);
        self
    }

    pub fn logo_alt(mut self, alt: &'static str) -> Self {
        self.logo_alt = Some(alt);
        self
    }

    pub fn doc(mut self, doc: &'static str) -> Self {
        self.doc = Some(doc);
        self
    }

    pub fn stream(mut self, stream_name: &'static str) -> Self {
        self.stream_name = Some(stream_name);
        self
    }

    pub fn secondary(mut self, text: &'static str) -> Self {
        self.secondary_line_text = Some(text);
        self
    }

    pub fn dir(mut self, dir_name: &'static str) -> Self {
        self.dir_name = Some(dir_name);
        self
    }

    pub fn legacy(mut self) -> Self {
        self.legacy = true;
        self
    }

    pub fn option(
        mut self,
        name: &'static str,
        description: &'static str,
        kind: ConfigOptionKind,
    ) -> Self {
        self.config_options.push(WebhookConfigOption {
            name,
            description,
            kind,
        });
        self
    }
}

pub fn embedded_bots() -> Vec<Declaration> {
    ["converter", "encrypt", "helloworld", "virtual_fs", "giphy", "followup"]
        .into_iter()
        .map(embedded_bot)
        .collect()
}

pub fn declarations() -> Vec<Declaration> {
    let mut all = Vec::new();
    all.extend(generic_integrations());
    all.extend(webhook_integrations());
    all.extend(bot_integrations());
    all.extend(hubot_integrations());
    all
}

fn generic_integrations() -> Vec<Declaration> {
    vec![
        generic("asana", &["project-management"]).doc("integrations/asana.md"),
        generic("big-blue-button", &["communication"])
            .logo("images/integrations/logos/bigbluebutton.svg")
            .display("BigBlueButton")
            .doc("integrations/big-blue-button.md"),
        generic("capistrano", &["deployment"])
            .display("Capistrano")
            .doc("integrations/capistrano.md"),
        generic("codebase", &["version-control"]).doc("integrations/codebase.md"),
        generic("discourse", &["communication"]).doc("integrations/discourse.md"),
        generic("email", &["communication"]).doc("integrations/email.md"),
        generic("errbot", &["meta-integration", "bots"]).doc("integrations/errbot.md"),
        generic("giphy", &["misc"])
            .display("GIPHY")
            .doc("integrations/giphy.md")
            .logo("images/integrations/giphy/GIPHY_big_logo.png"),
        generic("git", &["version-control"])
            .stream("commits")
            .doc("integrations/git.md"),
        generic("github-actions", &["continuous-integration"])
            .display("GitHub Actions")
            .doc("integrations/github-actions.md"),
        generic("google-calendar", &["productivity"])
            .display("Google Calendar")
            .doc("integrations/google-calendar.md"),
        generic("hubot", &["meta-integration", "bots"]).doc("integrations/hubot.md"),
        generic("irc", &["communication"])
            .display("IRC")
            .doc("integrations/irc.md"),
        generic("jenkins", &["continuous-integration"]).doc("integrations/jenkins.md"),
        generic("jira-plugin", &["project-management"])
            .logo("images/integrations/logos/jira.svg")
            .secondary("(locally installed)")
            .display("Jira")
            .doc("integrations/jira-plugin.md")
            .stream("jira")
            .legacy(),
        generic("jitsi", &["communication"])
            .logo("images/integrations/logos/jitsi.svg")
            .display("Jitsi Meet")
            .doc("integrations/jitsi.md"),
        generic("mastodon", &["communication"]).doc("integrations/mastodon.md"),
        generic("matrix", &["communication"]).doc("integrations/matrix.md"),
        generic("mercurial", &["version-control"])
            .display("Mercurial (hg)")
            .doc("integrations/mercurial.md")
            .stream("commits"),
        generic("nagios", &["monitoring"]).doc("integrations/nagios.md"),
        generic("notion", &["productivity"]).doc("integrations/notion.md"),
        generic("openshift", &["deployment"])
            .display("OpenShift")
            .doc("integrations/openshift.md")
            .stream("deployments"),
        generic("perforce", &["version-control"]).doc("integrations/perforce.md"),
        generic("phabricator", &["version-control"]).doc("integrations/phabricator.md"),
        generic("puppet", &["deployment"]).doc("integrations/puppet.md"),
        generic("redmine", &["project-management"]).doc("integrations/redmine.md"),
        generic("rss", &["communication"])
            .display("RSS")
            .doc("integrations/rss.md"),
        generic("svn", &["version-control"])
            .display("Subversion")
            .doc("integrations/svn.md"),
        generic("trac", &["project-management"]).doc("integrations/trac.md"),
        // underscore in the file name keeps ad blockers from hiding the logo
        generic("twitter", &["customer-support", "marketing"])
            .logo("images/integrations/logos/twitte_r.svg")
            .doc("integrations/twitter.md"),
        generic("zoom", &["communication"])
            .logo("images/integrations/logos/zoom.svg")
            .doc("integrations/zoom.md"),
    ]
}

fn webhook_integrations() -> Vec<Declaration> {
    vec![
        webhook("airbrake", &["monitoring"]),
        webhook("airbyte", &["monitoring"]),
        webhook("alertmanager", &["monitoring"])
            .display("Prometheus Alertmanager")
            .logo("images/integrations/logos/prometheus.svg"),
        webhook("ansibletower", &["deployment"]).display("Ansible Tower"),
        webhook("appfollow", &["customer-support"]).display("AppFollow"),
        webhook("appveyor", &["continuous-integration"]).display("AppVeyor"),
        webhook("azuredevops", &["version-control"]).display("AzureDevOps"),
        webhook("beanstalk", &["version-control"]).stream("commits"),
        webhook("basecamp", &["project-management"]),
        webhook("beeminder", &["misc"]).display("Beeminder"),
        webhook("bitbucket3", &["version-control"])
            .logo("images/integrations/logos/bitbucket.svg")
            .display("Bitbucket Server")
            .stream("bitbucket"),
        webhook("bitbucket2", &["version-control"])
            .logo("images/integrations/logos/bitbucket.svg")
            .display("Bitbucket")
            .stream("bitbucket"),
        webhook("bitbucket", &["version-control"])
            .display("Bitbucket")
            .secondary("(Enterprise)")
            .stream("commits")
            .legacy(),
        webhook("buildbot", &["continuous-integration"]),
        webhook("canarytoken", &["monitoring"]).display("Thinkst Canarytokens"),
        webhook("circleci", &["continuous-integration"]).display("CircleCI"),
        webhook("clubhouse", &["project-management"]),
        webhook("codeship", &["continuous-integration", "deployment"]),
        webhook("crashlytics", &["monitoring"]),
        webhook("dialogflow", &["customer-support"]),
        webhook("delighted", &["customer-support", "marketing"]),
        webhook("dropbox", &["productivity"]),
        webhook("errbit", &["monitoring"]),
        webhook("flock", &["customer-support"]),
        webhook("freshdesk", &["customer-support"]),
        webhook("freshping", &["monitoring"]),
        webhook("freshstatus", &["monitoring", "customer-support"]),
        webhook("front", &["customer-support"]),
        webhook("gitea", &["version-control"]).stream("commits"),
        webhook("github", &["version-control"])
            .display("GitHub")
            .logo("images/integrations/logos/github.svg")
            .stream("github")
            .option(
                "branches",
                "Filter by branches (comma-separated list)",
                ConfigOptionKind::String,
            )
            .option(
                "ignore_private_repositories",
                "Exclude notifications from private repositories",
                ConfigOptionKind::Bool,
            ),
        webhook("githubsponsors", &["financial"])
            .display("GitHub Sponsors")
            .logo("images/integrations/logos/github.svg")
            .dir("github")
            .doc("github/githubsponsors.md")
            .stream("github"),
        webhook("gitlab", &["version-control"]).display("GitLab"),
        webhook("gocd", &["continuous-integration"]).display("GoCD"),
        webhook("gogs", &["version-control"]).stream("commits"),
        webhook("gosquared", &["marketing"]).display("GoSquared"),
        webhook("grafana", &["monitoring"]),
        webhook("greenhouse", &["hr"]),
        webhook("groove", &["customer-support"]),
        webhook("harbor", &["deployment", "productivity"]),
        webhook("hellosign", &["productivity", "hr"]).display("HelloSign"),
        webhook("helloworld", &["misc"]).display("Hello World"),
        webhook("heroku", &["deployment"]),
        webhook("homeassistant", &["misc"]).display("Home Assistant"),
        webhook("ifttt", &["meta-integration"]).display("IFTTT"),
        webhook("insping", &["monitoring"]),
        webhook("intercom", &["customer-support"]),
        webhook("jira", &["project-management"]),
        webhook("jotform", &["misc"]),
        webhook("json", &["misc"]).display("JSON formatter"),
        webhook("librato", &["monitoring"]),
        webhook("lidarr", &["entertainment"]),
        webhook("linear", &["project-management"]),
        webhook("mention", &["marketing"]),
        webhook("netlify", &["continuous-integration", "deployment"]),
        webhook("newrelic", &["monitoring"]).display("New Relic"),
        webhook("opencollective", &["financial"]).display("Open Collective"),
        webhook("opsgenie", &["meta-integration", "monitoring"]),
        webhook("pagerduty", &["monitoring"]).display("PagerDuty"),
        webhook("papertrail", &["monitoring"]),
        webhook("patreon", &["financial"]),
        webhook("pingdom", &["monitoring"]),
        webhook("pivotal", &["project-management"]).display("Pivotal Tracker"),
        webhook("radarr", &["entertainment"]),
        webhook("raygun", &["monitoring"]),
        webhook("reviewboard", &["version-control"]).display("Review Board"),
        webhook("rhodecode", &["version-control"]).display("RhodeCode"),
        webhook("rundeck", &["deployment"]),
        webhook("semaphore", &["continuous-integration", "deployment"]),
        webhook("sentry", &["monitoring"]),
        webhook("slack_incoming", &["communication", "meta-integration"])
            .display("Slack-compatible webhook")
            .logo("images/integrations/logos/slack.svg"),
        webhook("slack", &["communication"]),
        webhook("sonarqube", &["continuous-integration"]).display("SonarQube"),
        webhook("sonarr", &["entertainment"]),
        webhook("splunk", &["monitoring"]),
        webhook("statuspage", &["customer-support"]),
        webhook("stripe", &["financial"]),
        webhook("taiga", &["project-management"]),
        webhook("teamcity", &["continuous-integration"]),
        webhook("thinkst", &["monitoring"]),
        webhook("transifex", &["misc"]),
        webhook("travis", &["continuous-integration"]).display("Travis CI"),
        webhook("trello", &["project-management"]),
        webhook("updown", &["monitoring"]),
        webhook("uptimerobot", &["monitoring"]).display("UptimeRobot"),
        webhook("wekan", &["productivity"]),
        webhook("wordpress", &["marketing"]).display("WordPress"),
        webhook("zapier", &["meta-integration"]),
        webhook("zendesk", &["customer-support"]),
        webhook("zabbix", &["monitoring"]),
    ]
}

fn bot_integrations() -> Vec<Declaration> {
    vec![
        bot("github_detail", &["version-control", "bots"]).display("GitHub Detail"),
        bot("xkcd", &["bots", "misc"])
            .display("xkcd")
            .logo("images/integrations/logos/xkcd.png"),
    ]
}

fn hubot_integrations() -> Vec<Declaration> {
    vec![
        hubot("assembla", &["version-control", "project-management"]).logo_alt("Assembla"),
        hubot("bonusly", &["hr"]),
        hubot("chartbeat", &["marketing"]),
        hubot("darksky", &["misc"])
            .display("Dark Sky")
            .logo_alt("Dark Sky logo"),
        hubot("instagram", &["misc"]).logo("images/integrations/logos/instagra_m.svg"),
        hubot("mailchimp", &["communication", "marketing"]),
        hubot("google-translate", &["misc"])
            .display("Google Translate")
            .logo_alt("Google Translate logo"),
        hubot("youtube", &["misc"])
            .display("YouTube")
            .logo("images/integrations/logos/youtub_e.svg"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_declared_names_are_unique() {
        let decls = declarations();
        let names: HashSet<_> = decls.iter().map(|d| d.name).collect();
        assert_eq!(names.len(), decls.len());
    }

    #[test]
    fn test_embedded_bots_have_no_categories() {
        assert!(embedded_bots().iter().all(|d| d.categories.is_empty()));
    }
}
