//! Normalization helpers applied to decoded payloads before rendering.

use crate::error::{NotifyError, Result};
use crate::render::colors;

/// All-zero hash GitLab sends as `before` for a new branch and as `after`
/// for a deleted one.
pub const NULL_COMMIT: &str = "0000000000000000000000000000000000000000";

pub fn is_null_commit(sha: &str) -> bool {
    sha == NULL_COMMIT
}

/// Truncates a commit hash to `width` characters for display.
/// Hashes that are already short enough are returned as-is.
pub fn short_hash(sha: &str, width: usize) -> &str {
    match sha.char_indices().nth(width) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

/// Extracts the branch name from a ref such as `refs/heads/feature/x`.
///
/// Everything after the second `/` is the branch, so nested branch names
/// survive intact.
pub fn branch_from_ref(git_ref: &str) -> Result<&str> {
    let mut parts = git_ref.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(branch)) if !branch.is_empty() => Ok(branch),
        _ => Err(NotifyError::RenderFailure(format!(
            "cannot extract a branch name from ref '{}'",
            git_ref
        ))),
    }
}

/// Maps a pipeline or job status to its colored display phrase.
/// Unknown statuses are displayed verbatim.
pub fn status_phrase(status: &str) -> String {
    let (verb, color, word) = match status {
        "pending" => ("is", colors::GREY, "pending"),
        "created" => ("was", colors::GREY, "created"),
        "running" => ("is", colors::ORANGE, "running"),
        "failed" => ("has", colors::RED, "failed"),
        "success" => ("has", colors::GREEN, "succeeded"),
        other => return other.to_string(),
    };
    format!("{} {}", verb, colors::paint(color, word))
}

/// Maps an issue or merge request action keyword to a past-tense verb.
/// Unknown actions are displayed verbatim.
pub fn action_verb(action: &str) -> &str {
    match action {
        "open" => "opened",
        "update" => "updated",
        "close" => "closed",
        "reopen" => "reopened",
        "merge" => "merged",
        other => other,
    }
}

/// First line of a commit message with HTML entities decoded.
pub fn commit_title(message: &str) -> String {
    let unescaped = html_escape::decode_html_entities(message);
    unescaped.lines().next().unwrap_or_default().trim_end().to_string()
}

/// Derives the project namespace of a job hook.
///
/// Job payloads only carry repository URLs, so the namespace is taken from
/// the SSH clone URL (`git@host:namespace/project.git`) or, failing that,
/// from the first path segment of the homepage URL.
pub fn namespace_from_repository(git_url: &str, homepage: &str) -> String {
    if let Some((_, path)) = git_url.split_once(':') {
        if !path.starts_with("//") {
            if let Some(ns) = path.split('/').next().filter(|s| !s.is_empty()) {
                return ns.to_string();
            }
        }
    }

    homepage
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(homepage)
        .split('/')
        .nth(1)
        .unwrap_or_default()
        .to_string()
}

/// Formats a duration in seconds; `None` renders as an empty string.
pub fn format_duration(duration: Option<f64>) -> String {
    duration.map(|d| d.to_string()).unwrap_or_default()
}
