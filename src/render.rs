//! Message renderers: one formatting function per notification kind.

use serde::Deserialize;

use crate::events::{Commit, IssueEvent, JobEvent, MergeRequestEvent, PipelineEvent, PushEvent};
use crate::utils::{action_verb, commit_title, format_duration, short_hash, status_phrase};

/// IRC (mIRC) color codes. Every colored segment is closed with a bare
/// `\x03` so colors never leak into the following text.
pub mod colors {
    pub const GREEN: u8 = 3;
    pub const RED: u8 = 4;
    pub const BRANCH: u8 = 5;
    pub const PURPLE: u8 = 6;
    pub const ORANGE: u8 = 7;
    pub const YELLOW: u8 = 8;
    pub const PROJECT: u8 = 12;
    pub const GREY: u8 = 15;

    /// Wraps `text` in a color code. Codes are always two digits so text
    /// starting with a digit is not swallowed into the code.
    pub fn paint(color: u8, text: impl std::fmt::Display) -> String {
        format!("\x03{:02}{}\x03", color, text)
    }
}

use colors::paint;

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Number of characters shown for commit hashes
    #[serde(default = "default_hash_width")]
    pub hash_width: usize,
    /// Commits announced individually per push; the rest are summarized
    #[serde(default = "default_max_commit_lines")]
    pub max_commit_lines: usize,
}

fn default_hash_width() -> usize {
    7
}

fn default_max_commit_lines() -> usize {
    3
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            hash_width: default_hash_width(),
            max_commit_lines: default_max_commit_lines(),
        }
    }
}

/// Read-only set of renderers, built once at startup and shared by every
/// request.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    display: DisplayConfig,
}

impl Renderer {
    pub fn new(display: DisplayConfig) -> Self {
        Self { display }
    }

    pub fn max_commit_lines(&self) -> usize {
        self.display.max_commit_lines
    }

    fn prefix(name: &str) -> String {
        format!("[{}]", paint(colors::PROJECT, name))
    }

    /// Push summary linking to the compare view between the old and new head.
    pub fn push_compare(&self, event: &PushEvent, branch: &str) -> String {
        format!(
            "{} {} pushed {} commits to {} {}/compare/{}...{}",
            Self::prefix(&event.project.name),
            event.user_name,
            event.total_commits_count,
            paint(colors::BRANCH, branch),
            event.project.web_url,
            short_hash(&event.before, self.display.hash_width),
            short_hash(&event.after, self.display.hash_width),
        )
    }

    /// Push summary for a new branch, where no compare base exists.
    pub fn push_commit_log(&self, event: &PushEvent, branch: &str) -> String {
        format!(
            "{} {} pushed {} commits to {} {}/commits/{}",
            Self::prefix(&event.project.name),
            event.user_name,
            event.total_commits_count,
            paint(colors::BRANCH, branch),
            event.project.web_url,
            branch,
        )
    }

    pub fn branch_created(&self, event: &PushEvent, branch: &str) -> String {
        format!(
            "{} {} created the branch {}",
            Self::prefix(&event.project.name),
            event.user_name,
            paint(colors::BRANCH, branch),
        )
    }

    pub fn branch_deleted(&self, event: &PushEvent, branch: &str) -> String {
        format!(
            "{} {} deleted the branch {}",
            Self::prefix(&event.project.name),
            event.user_name,
            paint(colors::BRANCH, branch),
        )
    }

    pub fn commit(&self, commit: &Commit) -> String {
        format!(
            "{} ({}|{}|{}) {}: {}",
            paint(colors::GREY, short_hash(&commit.id, self.display.hash_width)),
            paint(colors::GREEN, format!("+{}", commit.added.len())),
            paint(colors::YELLOW, format!("±{}", commit.modified.len())),
            paint(colors::RED, format!("-{}", commit.removed.len())),
            paint(colors::PURPLE, &commit.author.name),
            commit_title(&commit.message),
        )
    }

    pub fn more_commits(&self, remaining: u64) -> String {
        format!("and {} more commits.", remaining)
    }

    pub fn issue(&self, event: &IssueEvent) -> String {
        let issue = &event.issue;
        format!(
            "{} {} {} issue {}: {} {}",
            Self::prefix(&event.project.name),
            event.user.name,
            action_verb(&issue.action),
            paint(colors::YELLOW, format!("#{}", issue.iid)),
            issue.title,
            issue.url,
        )
    }

    pub fn merge_request(&self, event: &MergeRequestEvent) -> String {
        let merge = &event.merge_request;
        format!(
            "{} {} {} merge request {}: {} {}",
            Self::prefix(&event.project.name),
            event.user.name,
            action_verb(&merge.action),
            paint(colors::YELLOW, format!("#{}", merge.iid)),
            merge.title,
            merge.url,
        )
    }

    pub fn pipeline_started(&self, event: &PipelineEvent) -> String {
        let pipeline = &event.pipeline;
        format!(
            "{} Pipeline for commit {} {} {}/pipelines/{}",
            Self::prefix(&event.project.name),
            short_hash(&pipeline.sha, self.display.hash_width),
            status_phrase(&pipeline.status),
            event.project.web_url,
            pipeline.id,
        )
    }

    pub fn pipeline_finished(&self, event: &PipelineEvent) -> String {
        let pipeline = &event.pipeline;
        format!(
            "{} Pipeline for commit {} {} in {} seconds {}/pipelines/{}",
            Self::prefix(&event.project.name),
            short_hash(&pipeline.sha, self.display.hash_width),
            status_phrase(&pipeline.status),
            format_duration(pipeline.duration),
            event.project.web_url,
            pipeline.id,
        )
    }

    pub fn job_finished(&self, event: &JobEvent) -> String {
        format!(
            "{} Job {} for commit {} {} in {} seconds {}/-/jobs/{}",
            Self::prefix(&event.repository.name),
            paint(colors::YELLOW, &event.build_name),
            short_hash(&event.sha, self.display.hash_width),
            status_phrase(&event.build_status),
            format_duration(event.build_duration),
            event.repository.homepage,
            event.build_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Author, Issue, MergeRequest, Pipeline, Project, Repository, User};

    const BEFORE: &str = "95790bf891e76fee5e1747ab589903a6a1f80f22";
    const AFTER: &str = "da1560886d4f094c3e6c9ef40349f7d38b5d27d7";

    fn project() -> Project {
        Project {
            name: "website".to_string(),
            namespace: "infra".to_string(),
            web_url: "https://gitlab.example.com/infra/website".to_string(),
        }
    }

    fn push() -> PushEvent {
        PushEvent {
            user_name: "alice".to_string(),
            before: BEFORE.to_string(),
            after: AFTER.to_string(),
            git_ref: "refs/heads/main".to_string(),
            total_commits_count: 2,
            project: project(),
            commits: Vec::new(),
        }
    }

    #[test]
    fn paint_wraps_and_resets() {
        assert_eq!(paint(colors::GREEN, "+3"), "\x0303+3\x03");
        assert_eq!(paint(colors::PROJECT, "x"), "\x0312x\x03");
    }

    #[test]
    fn push_compare_line() {
        let line = Renderer::default().push_compare(&push(), "main");
        assert_eq!(
            line,
            "[\x0312website\x03] alice pushed 2 commits to \x0305main\x03 \
             https://gitlab.example.com/infra/website/compare/95790bf...da15608"
        );
    }

    #[test]
    fn hash_width_is_configurable() {
        let renderer = Renderer::new(DisplayConfig {
            hash_width: 8,
            max_commit_lines: 3,
        });
        let line = renderer.push_compare(&push(), "main");
        assert!(line.ends_with("/compare/95790bf8...da156088"));
    }

    #[test]
    fn push_commit_log_line() {
        let line = Renderer::default().push_commit_log(&push(), "feature/x");
        assert_eq!(
            line,
            "[\x0312website\x03] alice pushed 2 commits to \x0305feature/x\x03 \
             https://gitlab.example.com/infra/website/commits/feature/x"
        );
    }

    #[test]
    fn branch_lines() {
        let renderer = Renderer::default();
        assert_eq!(
            renderer.branch_created(&push(), "dev"),
            "[\x0312website\x03] alice created the branch \x0305dev\x03"
        );
        assert_eq!(
            renderer.branch_deleted(&push(), "dev"),
            "[\x0312website\x03] alice deleted the branch \x0305dev\x03"
        );
    }

    #[test]
    fn commit_line() {
        let commit = Commit {
            id: AFTER.to_string(),
            message: "Fix &amp; polish\n\ndetails".to_string(),
            added: vec!["a.rs".to_string()],
            modified: vec!["b.rs".to_string(), "c.rs".to_string()],
            removed: Vec::new(),
            author: Author {
                name: "Bob".to_string(),
            },
        };
        assert_eq!(
            Renderer::default().commit(&commit),
            "\x0315da15608\x03 (\x0303+1\x03|\x0308±2\x03|\x0304-0\x03) \x0306Bob\x03: Fix & polish"
        );
    }

    #[test]
    fn commit_line_with_missing_author_renders_empty() {
        let commit = Commit {
            id: "abc".to_string(),
            ..Commit::default()
        };
        assert_eq!(
            Renderer::default().commit(&commit),
            "\x0315abc\x03 (\x0303+0\x03|\x0308±0\x03|\x0304-0\x03) \x0306\x03: "
        );
    }

    #[test]
    fn more_commits_line() {
        assert_eq!(Renderer::default().more_commits(2), "and 2 more commits.");
    }

    #[test]
    fn issue_and_merge_request_lines() {
        let renderer = Renderer::default();
        let issue = IssueEvent {
            user: User {
                name: "carol".to_string(),
            },
            project: project(),
            issue: Issue {
                iid: 23,
                action: "open".to_string(),
                title: "Broken link".to_string(),
                url: "https://gitlab.example.com/infra/website/-/issues/23".to_string(),
            },
        };
        assert_eq!(
            renderer.issue(&issue),
            "[\x0312website\x03] carol opened issue \x0308#23\x03: Broken link \
             https://gitlab.example.com/infra/website/-/issues/23"
        );

        let merge = MergeRequestEvent {
            user: User {
                name: "dave".to_string(),
            },
            project: project(),
            merge_request: MergeRequest {
                iid: 7,
                action: "approved".to_string(),
                title: "Add CI".to_string(),
                url: "https://gitlab.example.com/infra/website/-/merge_requests/7".to_string(),
            },
        };
        assert_eq!(
            renderer.merge_request(&merge),
            "[\x0312website\x03] dave approved merge request \x0308#7\x03: Add CI \
             https://gitlab.example.com/infra/website/-/merge_requests/7"
        );
    }

    #[test]
    fn pipeline_lines() {
        let renderer = Renderer::default();
        let mut event = PipelineEvent {
            project: project(),
            pipeline: Pipeline {
                id: 31,
                sha: AFTER.to_string(),
                status: "running".to_string(),
                duration: None,
            },
        };
        assert_eq!(
            renderer.pipeline_started(&event),
            "[\x0312website\x03] Pipeline for commit da15608 is \x0307running\x03 \
             https://gitlab.example.com/infra/website/pipelines/31"
        );

        event.pipeline.status = "failed".to_string();
        event.pipeline.duration = Some(63.0);
        assert_eq!(
            renderer.pipeline_finished(&event),
            "[\x0312website\x03] Pipeline for commit da15608 has \x0304failed\x03 in 63 seconds \
             https://gitlab.example.com/infra/website/pipelines/31"
        );
    }

    #[test]
    fn job_line() {
        let event = JobEvent {
            build_id: 380,
            build_name: "test".to_string(),
            build_status: "success".to_string(),
            build_duration: Some(12.5),
            sha: AFTER.to_string(),
            repository: Repository {
                name: "website".to_string(),
                homepage: "https://gitlab.example.com/infra/website".to_string(),
                url: "git@gitlab.example.com:infra/website.git".to_string(),
            },
        };
        assert_eq!(
            Renderer::default().job_finished(&event),
            "[\x0312website\x03] Job \x0308test\x03 for commit da15608 has \x0303succeeded\x03 \
             in 12.5 seconds https://gitlab.example.com/infra/website/-/jobs/380"
        );
    }
}
