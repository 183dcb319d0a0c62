//! Event dispatcher: turns one webhook request into delivered IRC lines.
//!
//! A request moves through decode, normalize and render, then every
//! rendered line is routed and delivered on its own. A request can end
//! early as dropped (unknown label, suppressed status) or fail to decode;
//! a line that cannot be rendered is skipped without affecting the others.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::delivery::MessageSink;
use crate::error::{NotifyError, Result};
use crate::events::{
    EVENT_HEADER, EventKind, GitlabEvent, IssueEvent, JobEvent, MergeRequestEvent, PipelineEvent,
    PushEvent,
};
use crate::render::Renderer;
use crate::routing::{ProjectIdentity, RoutingTable};
use crate::utils::{branch_from_ref, is_null_commit, namespace_from_repository};

/// One rendered line and the project it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub project: ProjectIdentity,
    pub text: String,
}

/// All lines rendered for one request, in delivery order.
#[derive(Debug, Clone)]
pub struct MessageBatch {
    pub kind: EventKind,
    pub project: ProjectIdentity,
    pub messages: Vec<RenderedMessage>,
    /// Lines that could not be rendered and were skipped
    pub failures: usize,
}

impl MessageBatch {
    fn new(kind: EventKind, project: ProjectIdentity) -> Self {
        Self {
            kind,
            project,
            messages: Vec::new(),
            failures: 0,
        }
    }

    fn push(&mut self, line: Result<String>) {
        match line {
            Ok(text) => self.messages.push(RenderedMessage {
                project: self.project.clone(),
                text,
            }),
            Err(e) => {
                warn!("Skipping {} line for {}: {}", self.kind.as_str(), self.project, e);
                self.failures += 1;
            }
        }
    }

    pub fn texts(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.text.as_str()).collect()
    }
}

/// Why a request produced no messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    MissingHeader,
    UnrecognizedEventType(String),
    /// Status filtered out to keep channels quiet
    Suppressed { kind: EventKind, status: String },
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Dropped(DropReason),
    Rendered(MessageBatch),
}

/// Counters for one delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Final state of a dispatched request.
#[derive(Debug, Clone)]
pub enum DispatchReport {
    Dropped(DropReason),
    Delivered {
        batch: MessageBatch,
        report: DeliveryReport,
    },
}

/// Routes decoded events to renderers and rendered lines to channels.
/// Shared read-only by every request.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    renderer: Renderer,
    routing: RoutingTable,
}

impl Dispatcher {
    pub fn new(renderer: Renderer, routing: RoutingTable) -> Self {
        Self { renderer, routing }
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Destination channels for one rendered line.
    pub fn resolve(&self, message: &RenderedMessage) -> &[String] {
        self.routing.resolve(&message.project)
    }

    /// Decodes and renders a request without delivering anything.
    pub fn prepare(&self, label: Option<&str>, body: &[u8]) -> Result<Outcome> {
        let Some(label) = label else {
            warn!("{}, ignoring", NotifyError::MissingRequiredHeader(EVENT_HEADER));
            return Ok(Outcome::Dropped(DropReason::MissingHeader));
        };

        let kind = EventKind::from_label(label);
        if let EventKind::Unknown(label) = &kind {
            info!("{}", NotifyError::UnrecognizedEventType(label.clone()));
            return Ok(Outcome::Dropped(DropReason::UnrecognizedEventType(
                label.clone(),
            )));
        }

        info!("Got a hook for a {} event", kind.as_str());
        match GitlabEvent::decode(&kind, body)? {
            Some(event) => Ok(self.render(&event)),
            None => Ok(Outcome::Dropped(DropReason::UnrecognizedEventType(
                label.to_string(),
            ))),
        }
    }

    /// Renders a decoded event into its lines.
    pub fn render(&self, event: &GitlabEvent) -> Outcome {
        match event {
            GitlabEvent::Push(push) => Outcome::Rendered(self.render_push(push)),
            GitlabEvent::Issue(issue) => Outcome::Rendered(self.render_issue(issue)),
            GitlabEvent::MergeRequest(merge) => Outcome::Rendered(self.render_merge(merge)),
            GitlabEvent::Pipeline(pipeline) => self.render_pipeline(pipeline),
            GitlabEvent::Job(job) => self.render_job(job),
        }
    }

    fn render_push(&self, event: &PushEvent) -> MessageBatch {
        let mut batch = MessageBatch::new(EventKind::Push, event.project.identity());
        // Null-commit checks must see the full hashes.
        let deleted = is_null_commit(&event.after);
        let created = is_null_commit(&event.before);
        let branch = branch_from_ref(&event.git_ref);

        if deleted {
            batch.push(with_branch(&branch, |b| self.renderer.branch_deleted(event, b)));
            return batch;
        }

        if created {
            batch.push(with_branch(&branch, |b| self.renderer.branch_created(event, b)));
        }

        // A commitless new branch is fully described by the creation line
        if created && event.total_commits_count == 0 {
            return batch;
        }

        batch.push(with_branch(&branch, |b| {
            if created {
                // No base commit to compare against on a new branch
                self.renderer.push_commit_log(event, b)
            } else {
                self.renderer.push_compare(event, b)
            }
        }));

        let limit = self.renderer.max_commit_lines();
        for commit in event.commits.iter().take(limit) {
            batch.push(Ok(self.renderer.commit(commit)));
        }

        let limit = limit as u64;
        if event.total_commits_count > limit {
            batch.push(Ok(self
                .renderer
                .more_commits(event.total_commits_count - limit)));
        }

        batch
    }

    fn render_issue(&self, event: &IssueEvent) -> MessageBatch {
        let mut batch = MessageBatch::new(EventKind::Issue, event.project.identity());
        batch.push(Ok(self.renderer.issue(event)));
        batch
    }

    fn render_merge(&self, event: &MergeRequestEvent) -> MessageBatch {
        let mut batch = MessageBatch::new(EventKind::MergeRequest, event.project.identity());
        batch.push(Ok(self.renderer.merge_request(event)));
        batch
    }

    fn render_pipeline(&self, event: &PipelineEvent) -> Outcome {
        let status = event.pipeline.status.as_str();
        let text = match status {
            "running" => self.renderer.pipeline_started(event),
            "success" | "failed" => self.renderer.pipeline_finished(event),
            _ => {
                info!("Skipping noisy pipeline event with status: {}", status);
                return Outcome::Dropped(DropReason::Suppressed {
                    kind: EventKind::Pipeline,
                    status: status.to_string(),
                });
            }
        };

        let mut batch = MessageBatch::new(EventKind::Pipeline, event.project.identity());
        batch.push(Ok(text));
        Outcome::Rendered(batch)
    }

    fn render_job(&self, event: &JobEvent) -> Outcome {
        let status = event.build_status.as_str();
        if status != "success" && status != "failed" {
            info!("Skipping noisy job event with status: {}", status);
            return Outcome::Dropped(DropReason::Suppressed {
                kind: EventKind::Job,
                status: status.to_string(),
            });
        }

        let namespace =
            namespace_from_repository(&event.repository.url, &event.repository.homepage);
        let project = ProjectIdentity::new(namespace, &event.repository.name);
        let mut batch = MessageBatch::new(EventKind::Job, project);
        batch.push(Ok(self.renderer.job_finished(event)));
        Outcome::Rendered(batch)
    }

    /// Sends every line of `batch` to its channels, in order.
    /// Failed deliveries are logged and counted, never retried.
    pub async fn deliver(&self, batch: &MessageBatch, sink: &dyn MessageSink) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for message in &batch.messages {
            for channel in self.resolve(message) {
                match sink.deliver(channel, &message.text).await {
                    Ok(()) => {
                        debug!("Delivered to {}: {}", channel, message.text);
                        report.delivered += 1;
                    }
                    Err(e) => {
                        error!("Delivery failed: {}", e);
                        report.failed += 1;
                    }
                }
            }
        }
        report
    }

    /// Full pipeline for one request: decode, render, route, deliver.
    pub async fn dispatch(
        &self,
        label: Option<&str>,
        body: &[u8],
        sink: &dyn MessageSink,
    ) -> Result<DispatchReport> {
        match self.prepare(label, body)? {
            Outcome::Dropped(reason) => Ok(DispatchReport::Dropped(reason)),
            Outcome::Rendered(batch) => {
                let report = self.deliver(&batch, sink).await;
                Ok(DispatchReport::Delivered { batch, report })
            }
        }
    }
}

fn with_branch(branch: &Result<&str>, render: impl FnOnce(&str) -> String) -> Result<String> {
    match branch {
        Ok(b) => Ok(render(*b)),
        Err(NotifyError::RenderFailure(reason)) => Err(NotifyError::RenderFailure(reason.clone())),
        Err(e) => Err(NotifyError::RenderFailure(e.to_string())),
    }
}
