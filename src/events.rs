//! GitLab webhook payloads and event-type dispatch.
//!
//! Only the fields needed for rendering are modelled; everything else in
//! the payload is ignored.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{NotifyError, Result};
use crate::routing::ProjectIdentity;

/// Header carrying the event-type label.
pub const EVENT_HEADER: &str = "X-Gitlab-Event";

/// Closed set of event kinds, resolved once from the `X-Gitlab-Event` label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Push,
    Issue,
    MergeRequest,
    Pipeline,
    Job,
    Unknown(String),
}

impl EventKind {
    pub fn from_label(label: &str) -> Self {
        match label {
            "Push Hook" | "Push Event" => EventKind::Push,
            "Issue Hook" | "Issue Event" => EventKind::Issue,
            "Merge Request Hook" | "Merge Request Event" => EventKind::MergeRequest,
            "Pipeline Hook" => EventKind::Pipeline,
            "Job Hook" => EventKind::Job,
            other => EventKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Push => "push",
            EventKind::Issue => "issue",
            EventKind::MergeRequest => "merge_request",
            EventKind::Pipeline => "pipeline",
            EventKind::Job => "job",
            EventKind::Unknown(label) => label,
        }
    }
}

/// Payloads that can be decoded from a webhook body.
pub trait Decodable: DeserializeOwned {
    const KIND: &'static str;

    fn decode(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|source| NotifyError::MalformedPayload {
            event: Self::KIND,
            source,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Project {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub web_url: String,
}

impl Project {
    pub fn identity(&self) -> ProjectIdentity {
        ProjectIdentity::new(&self.namespace, &self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub author: Author,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(default)]
    pub user_name: String,
    pub before: String,
    pub after: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub total_commits_count: u64,
    pub project: Project,
    #[serde(default)]
    pub commits: Vec<Commit>,
}

impl Decodable for PushEvent {
    const KIND: &'static str = "push";
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub iid: u64,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueEvent {
    #[serde(default)]
    pub user: User,
    pub project: Project,
    #[serde(rename = "object_attributes")]
    pub issue: Issue,
}

impl Decodable for IssueEvent {
    const KIND: &'static str = "issue";
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequest {
    #[serde(default)]
    pub iid: u64,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestEvent {
    #[serde(default)]
    pub user: User,
    pub project: Project,
    #[serde(rename = "object_attributes")]
    pub merge_request: MergeRequest,
}

impl Decodable for MergeRequestEvent {
    const KIND: &'static str = "merge request";
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub sha: String,
    pub status: String,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineEvent {
    pub project: Project,
    #[serde(rename = "object_attributes")]
    pub pipeline: Pipeline,
}

impl Decodable for PipelineEvent {
    const KIND: &'static str = "pipeline";
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobEvent {
    #[serde(default)]
    pub build_id: u64,
    #[serde(default)]
    pub build_name: String,
    pub build_status: String,
    #[serde(default)]
    pub build_duration: Option<f64>,
    pub sha: String,
    pub repository: Repository,
}

impl Decodable for JobEvent {
    const KIND: &'static str = "job";
}

/// A decoded webhook payload.
#[derive(Debug, Clone)]
pub enum GitlabEvent {
    Push(PushEvent),
    Issue(IssueEvent),
    MergeRequest(MergeRequestEvent),
    Pipeline(PipelineEvent),
    Job(JobEvent),
}

impl GitlabEvent {
    /// Decodes `body` according to `kind`. Unknown kinds yield `Ok(None)`.
    pub fn decode(kind: &EventKind, body: &[u8]) -> Result<Option<Self>> {
        let event = match kind {
            EventKind::Push => GitlabEvent::Push(PushEvent::decode(body)?),
            EventKind::Issue => GitlabEvent::Issue(IssueEvent::decode(body)?),
            EventKind::MergeRequest => {
                GitlabEvent::MergeRequest(MergeRequestEvent::decode(body)?)
            }
            EventKind::Pipeline => GitlabEvent::Pipeline(PipelineEvent::decode(body)?),
            EventKind::Job => GitlabEvent::Job(JobEvent::decode(body)?),
            EventKind::Unknown(_) => return Ok(None),
        };
        Ok(Some(event))
    }
}
