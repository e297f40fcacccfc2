//! Robots.txt parser
//!
//! Splits robots.txt into user-agent groups and reduces the groups that apply
//! to our crawler into a set of disallowed path prefixes plus a crawl delay.

use std::collections::BTreeSet;

/// Longest crawl-delay honored, in seconds; larger values are clamped to it
pub const MAX_CRAWL_DELAY_SECONDS: f64 = 86_400.0;

/// Rules from robots.txt that apply to one crawler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    /// Union of `Disallow` prefixes across the matching groups
    pub disallowed_paths: BTreeSet<String>,

    /// Longest `Crawl-delay` across the matching groups, in seconds
    pub crawl_delay: Option<f64>,
}

/// One `User-agent` block and its directives
#[derive(Debug, Default)]
struct Group {
    agents: Vec<String>,
    disallow: Vec<String>,
    crawl_delay: Option<f64>,
    has_rules: bool,
}

impl Group {
    fn names_agent(&self, token: &str) -> bool {
        self.agents
            .iter()
            .any(|agent| agent != "*" && (token == agent || token.contains(agent.as_str())))
    }

    fn is_wildcard(&self) -> bool {
        self.agents.iter().any(|agent| agent == "*")
    }
}

/// Parses robots.txt content into the rules for `user_agent`
///
/// Groups naming the crawler (case-insensitive, matched as a substring of the
/// crawler's product token) take precedence; if none exist, the `*` groups
/// apply. Empty `Disallow:` lines allow everything and contribute nothing.
/// Lines that do not parse as `key: value` are ignored.
///
/// # Examples
///
/// ```
/// use sumi_harvest::robots::parse_robots;
///
/// let rules = parse_robots("User-agent: *\nDisallow: /private\nCrawl-delay: 2", "HarvestBot");
/// assert!(rules.disallowed_paths.contains("/private"));
/// assert_eq!(rules.crawl_delay, Some(2.0));
/// ```
pub fn parse_robots(content: &str, user_agent: &str) -> RobotsRules {
    let token = user_agent.to_lowercase();
    let groups = split_groups(content);

    let specific: Vec<&Group> = groups.iter().filter(|g| g.names_agent(&token)).collect();
    let matching = if specific.is_empty() {
        groups.iter().filter(|g| g.is_wildcard()).collect()
    } else {
        specific
    };

    let mut rules = RobotsRules::default();
    for group in matching {
        rules
            .disallowed_paths
            .extend(group.disallow.iter().cloned());

        if let Some(delay) = group.crawl_delay {
            rules.crawl_delay = Some(rules.crawl_delay.map_or(delay, |d| d.max(delay)));
        }
    }

    rules
}

fn split_groups(content: &str) -> Vec<Group> {
    let mut groups = Vec::new();
    let mut current = Group::default();

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                // A user-agent line after rules opens a new group
                if current.has_rules {
                    groups.push(std::mem::take(&mut current));
                }
                if !value.is_empty() {
                    current.agents.push(value.to_lowercase());
                }
            }
            "disallow" => {
                current.has_rules = true;
                if !value.is_empty() {
                    current.disallow.push(value.to_string());
                }
            }
            "allow" => current.has_rules = true,
            "crawl-delay" => {
                current.has_rules = true;
                if let Ok(delay) = value.parse::<f64>() {
                    if delay.is_finite() && delay >= 0.0 {
                        current.crawl_delay = Some(delay.min(MAX_CRAWL_DELAY_SECONDS));
                    }
                }
            }
            _ => {}
        }
    }

    if !current.agents.is_empty() {
        groups.push(current);
    }

    // Rules that appear before any user-agent line belong to no group
    groups.retain(|g| !g.agents.is_empty());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(rules: &RobotsRules) -> Vec<&str> {
        rules.disallowed_paths.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_wildcard_group() {
        let rules = parse_robots("User-agent: *\nDisallow: /admin\nDisallow: /tmp/", "TestBot");
        assert_eq!(paths(&rules), vec!["/admin", "/tmp/"]);
        assert_eq!(rules.crawl_delay, None);
    }

    #[test]
    fn test_specific_group_replaces_wildcard() {
        let content = "User-agent: TestBot\nDisallow: /only-for-testbot\n\nUser-agent: *\nDisallow: /";
        let rules = parse_robots(content, "TestBot");
        assert_eq!(paths(&rules), vec!["/only-for-testbot"]);

        let other = parse_robots(content, "OtherBot");
        assert_eq!(paths(&other), vec!["/"]);
    }

    #[test]
    fn test_agent_matching_is_case_insensitive() {
        let rules = parse_robots("User-agent: testbot\nDisallow: /x", "TESTBOT");
        assert_eq!(paths(&rules), vec!["/x"]);
    }

    #[test]
    fn test_union_across_matching_groups() {
        let content = "User-agent: TestBot\nDisallow: /a\n\nUser-agent: testbot\nDisallow: /b";
        let rules = parse_robots(content, "TestBot");
        assert_eq!(paths(&rules), vec!["/a", "/b"]);
    }

    #[test]
    fn test_longest_crawl_delay_wins() {
        let content = "User-agent: TestBot\nCrawl-delay: 2\n\nUser-agent: TestBot\nCrawl-delay: 7.5";
        let rules = parse_robots(content, "TestBot");
        assert_eq!(rules.crawl_delay, Some(7.5));
    }

    #[test]
    fn test_shared_group_for_multiple_agents() {
        let content = "User-agent: BotA\nUser-agent: BotB\nDisallow: /shared\nCrawl-delay: 3";
        assert_eq!(parse_robots(content, "BotA").crawl_delay, Some(3.0));
        assert_eq!(parse_robots(content, "BotB").crawl_delay, Some(3.0));
        assert!(parse_robots(content, "BotC").disallowed_paths.is_empty());
    }

    #[test]
    fn test_empty_disallow_allows_everything() {
        let rules = parse_robots("User-agent: *\nDisallow:", "TestBot");
        assert!(rules.disallowed_paths.is_empty());
    }

    #[test]
    fn test_comments_and_garbage_ignored() {
        let content = "# robots for example\nthis is not valid {{{\nUser-agent: * # everyone\nDisallow: /private # keep out\nCrawl-delay: soon";
        let rules = parse_robots(content, "TestBot");
        assert_eq!(paths(&rules), vec!["/private"]);
        assert_eq!(rules.crawl_delay, None);
    }

    #[test]
    fn test_huge_crawl_delay_clamped() {
        let rules = parse_robots("User-agent: *\nCrawl-delay: 1e20", "TestBot");
        assert_eq!(rules.crawl_delay, Some(MAX_CRAWL_DELAY_SECONDS));
    }

    #[test]
    fn test_rules_before_any_agent_ignored() {
        let rules = parse_robots("Disallow: /\nUser-agent: *\nDisallow: /x", "TestBot");
        assert_eq!(paths(&rules), vec!["/x"]);
    }

    #[test]
    fn test_empty_content() {
        assert_eq!(parse_robots("", "TestBot"), RobotsRules::default());
    }
}
