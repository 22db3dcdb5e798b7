// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! GitHub repository resolution from the working directory's git remote.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GitHubRepo {
    pub owner: String,
    pub name: String,
}

fn remote_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // git@github.com:owner/repo.git
        // ssh://git@github.com/owner/repo.git
        // https://github.com/owner/repo(.git)
        Regex::new(
            r"^(?:git@github\.com:|ssh://git@github\.com/|https?://(?:[^@/]+@)?github\.com/)([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?/?$",
        )
        .expect("remote pattern is valid")
    })
}

/// Owner and repository name of a GitHub remote URL (SSH or HTTPS form).
pub fn parse_github_remote(url: &str) -> Option<GitHubRepo> {
    let caps = remote_pattern().captures(url.trim())?;
    Some(GitHubRepo {
        owner: caps[1].to_string(),
        name: caps[2].to_string(),
    })
}

/// Resolve the repository enclosing `dir` through its `origin` remote (or the
/// first remote when there is no origin). Any failure yields `None`.
pub fn resolve_github_repo(dir: &Path) -> Option<GitHubRepo> {
    let repo = match git2::Repository::discover(dir) {
        Ok(repo) => repo,
        Err(e) => {
            debug!("No git repository at {:?}: {}", dir, e.message());
            return None;
        }
    };

    let remote = repo.find_remote("origin").ok().or_else(|| {
        let names = repo.remotes().ok()?;
        let first = names.iter().flatten().next()?.to_string();
        repo.find_remote(&first).ok()
    })?;

    let url = remote.url()?;
    let parsed = parse_github_remote(url);
    if parsed.is_none() {
        debug!("Remote {} is not a GitHub repository", url);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(owner: &str, name: &str) -> Option<GitHubRepo> {
        Some(GitHubRepo {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    #[test]
    fn test_parse_ssh_remote() {
        assert_eq!(parse_github_remote("git@github.com:owner/repo.git"), repo("owner", "repo"));
        assert_eq!(parse_github_remote("git@github.com:owner/repo"), repo("owner", "repo"));
        assert_eq!(
            parse_github_remote("ssh://git@github.com/my-org/my.repo.git"),
            repo("my-org", "my.repo")
        );
    }

    #[test]
    fn test_parse_https_remote() {
        assert_eq!(parse_github_remote("https://github.com/owner/repo.git"), repo("owner", "repo"));
        assert_eq!(parse_github_remote("https://github.com/owner/repo/"), repo("owner", "repo"));
        assert_eq!(
            parse_github_remote("https://token@github.com/owner/repo"),
            repo("owner", "repo")
        );
    }

    #[test]
    fn test_parse_rejects_other_hosts() {
        assert_eq!(parse_github_remote("https://gitlab.com/owner/repo.git"), None);
        assert_eq!(parse_github_remote("git@bitbucket.org:owner/repo.git"), None);
        assert_eq!(parse_github_remote("https://github.com/owner"), None);
        assert_eq!(parse_github_remote(""), None);
    }

    #[test]
    fn test_resolve_from_repository() {
        let dir = tempfile::tempdir().unwrap();
        let git = git2::Repository::init(dir.path()).unwrap();
        git.remote("origin", "git@github.com:acme/widgets.git").unwrap();

        let nested = dir.path().join("src");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(resolve_github_repo(&nested), repo("acme", "widgets"));
    }

    #[test]
    fn test_resolve_falls_back_to_first_remote() {
        let dir = tempfile::tempdir().unwrap();
        let git = git2::Repository::init(dir.path()).unwrap();
        git.remote("upstream", "https://github.com/acme/gadgets").unwrap();

        assert_eq!(resolve_github_repo(dir.path()), repo("acme", "gadgets"));
    }

    #[test]
    fn test_resolve_outside_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_github_repo(dir.path()), None);
    }
}
