//! Orchestration of a report run: resolve, fetch, aggregate, render, deliver.
//!
//! Each stage can be called on its own. A delivery failure leaves the
//! computed result and the rendered artifact intact so that delivery can be
//! retried, or the bytes returned inline instead.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

use crate::analysis::{aggregate, AggregateOptions};
use crate::delivery::{self, Delivery, DeliveryContext, DeliveryTarget, DEFAULT_WIKI_PAGE};
use crate::error::{EngineError, Result};
use crate::fetch::{FetchFilters, Fetcher, DEFAULT_PAGE_SIZE};
use crate::models::{
    AnalysisRequest, AnalysisResult, AppliedFilters, ComparisonResult, OutputFormat,
};
use crate::report::{self, Artifact};
use crate::tracker::{NameResolver, TrackerClient};

/// Tunables that are not part of an individual request.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub page_size: usize,
    pub aggregate: AggregateOptions,
    /// Page used by a `wiki` target without a title.
    pub wiki_page: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            aggregate: AggregateOptions::default(),
            wiki_page: DEFAULT_WIKI_PAGE.to_string(),
        }
    }
}

/// Everything a full run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub artifact: Artifact,
    /// Kept separate so a failed delivery does not discard the artifact.
    pub delivery: Result<Delivery>,
}

/// Stateless report engine over a tracker client and a name resolver.
pub struct ReportEngine {
    client: Arc<dyn TrackerClient>,
    resolver: Arc<dyn NameResolver>,
    settings: EngineSettings,
}

impl ReportEngine {
    pub fn new(client: Arc<dyn TrackerClient>, resolver: Arc<dyn NameResolver>) -> Self {
        Self {
            client,
            resolver,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Fetch and aggregate one project.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        // The version must resolve before anything is fetched.
        let version = match &request.version {
            Some(name) => {
                let version = self
                    .resolver
                    .resolve_version(&request.project, name)
                    .await?;
                debug!("Version '{}' resolved to #{}", name, version.id);
                Some(version)
            }
            None => None,
        };

        let project = self
            .client
            .get_project(&request.project)
            .await
            .map_err(|source| EngineError::Fetch {
                what: "project",
                source,
            })?;

        let filters = FetchFilters {
            date_from: request.date_from,
            date_to: request.date_to,
            issue_status: request.issue_status,
            version_id: version.as_ref().map(|v| v.id),
        };
        let fetcher = Fetcher::new(self.client.as_ref()).with_page_size(self.settings.page_size);
        let entries = fetcher.fetch_time_entries(&request.project, &filters).await?;
        let issues = fetcher.fetch_issues(&request.project, &filters).await?;

        let applied = AppliedFilters {
            date_from: request.date_from,
            date_to: request.date_to,
            issue_status: request.issue_status,
            version,
            custom_fields: request.custom_fields.clone(),
        };

        let result = aggregate(project, applied, &entries, &issues, &self.settings.aggregate);
        info!(
            "Analyzed {}: {} hours over {} entries and {} issues",
            result.project.name,
            result.summary.total_hours,
            result.summary.entry_count,
            issues.len()
        );
        Ok(result)
    }

    /// Analyze several projects independently and collect their summaries.
    pub async fn compare(&self, requests: &[AnalysisRequest]) -> Result<ComparisonResult> {
        let results = try_join_all(requests.iter().map(|r| self.analyze(r))).await?;
        Ok(ComparisonResult::from_results(&results))
    }

    /// Render a single-project result dated `now`.
    pub fn render(
        &self,
        result: &AnalysisResult,
        format: OutputFormat,
        now: DateTime<Utc>,
    ) -> Result<Artifact> {
        report::render_artifact(result, format, now.date_naive())
    }

    /// Place `artifact` into the tracker under `project`, or encode it inline.
    pub async fn deliver(
        &self,
        project: &str,
        target: Option<&DeliveryTarget>,
        artifact: &Artifact,
        now: DateTime<Utc>,
    ) -> Result<Delivery> {
        let ctx = DeliveryContext {
            client: self.client.as_ref(),
            resolver: self.resolver.as_ref(),
            project,
            wiki_page: &self.settings.wiki_page,
            now,
        };
        delivery::deliver(target, &ctx, artifact).await
    }

    /// Analyze, render and deliver one request.
    pub async fn run(&self, request: &AnalysisRequest) -> Result<RunOutcome> {
        let now = Utc::now();
        let result = self.analyze(request).await?;
        let artifact = self.render(&result, request.output_format, now)?;
        let delivery = self
            .deliver(
                &result.project.identifier,
                request.delivery_target.as_ref(),
                &artifact,
                now,
            )
            .await;

        Ok(RunOutcome { artifact, delivery })
    }

    /// Compare several requests and deliver the comparison artifact.
    ///
    /// Format and destination come from the first request; the artifact is
    /// stored under the first project.
    pub async fn run_comparison(&self, requests: &[AnalysisRequest]) -> Result<RunOutcome> {
        let now = Utc::now();
        let comparison = self.compare(requests).await?;

        let Some(first) = requests.first() else {
            let artifact = report::render_comparison_artifact(
                &comparison,
                OutputFormat::default(),
                now.date_naive(),
            )?;
            let delivery = Ok(Delivery::inline(&artifact));
            return Ok(RunOutcome { artifact, delivery });
        };

        let artifact =
            report::render_comparison_artifact(&comparison, first.output_format, now.date_naive())?;
        let delivery = self
            .deliver(&first.project, first.delivery_target.as_ref(), &artifact, now)
            .await;

        Ok(RunOutcome { artifact, delivery })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{FilesTarget, IssueTarget};
    use crate::models::{Issue, IssueStatusFilter, NamedRef, TimeEntry};
    use crate::tracker::mock::MockTracker;

    fn entry(id: u64, hours: f64, user: &str, issue_id: Option<u64>) -> TimeEntry {
        TimeEntry {
            id,
            hours,
            user: NamedRef::new(id, user),
            activity: NamedRef::new(9, "Development"),
            issue_id,
            spent_on: "2024-03-04".to_string(),
            comments: String::new(),
        }
    }

    fn issue(id: u64, tracker: &str, version: Option<NamedRef>) -> Issue {
        Issue {
            id,
            subject: format!("Issue {}", id),
            tracker: NamedRef::new(1, tracker),
            status: NamedRef::new(1, "New"),
            project: None,
            fixed_version: version,
            custom_fields: vec![],
            closed_on: None,
        }
    }

    fn create_engine(tracker: MockTracker) -> (Arc<MockTracker>, ReportEngine) {
        let tracker = Arc::new(tracker);
        let engine = ReportEngine::new(tracker.clone(), tracker.clone());
        (tracker, engine)
    }

    fn request(project: &str) -> AnalysisRequest {
        AnalysisRequest {
            project: project.to_string(),
            issue_status: IssueStatusFilter::All,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_analyze_end_to_end() {
        let (_, engine) = create_engine(MockTracker::new(
            vec![
                entry(1, 3.0, "Dana", Some(1)),
                entry(2, 2.0, "Lee", Some(1)),
                entry(3, 5.0, "Dana", Some(2)),
                entry(4, 1.0, "Lee", None),
            ],
            vec![issue(1, "Bug", None), issue(2, "Feature", None)],
        ));

        let result = engine.analyze(&request("web")).await.unwrap();

        assert_eq!(result.project.identifier, "web");
        assert_eq!(result.summary.total_hours, 11.0);
        assert_eq!(result.unlinked_hours, 1.0);
        let trackers: Vec<(&str, f64)> = result
            .by_tracker
            .iter()
            .map(|r| (r.name.as_str(), r.hours))
            .collect();
        assert_eq!(trackers, vec![("Bug", 5.0), ("Feature", 5.0)]);
    }

    #[tokio::test]
    async fn test_version_resolved_before_fetch() {
        let v1 = NamedRef::new(7, "1.0");
        let (tracker, engine) = create_engine(
            MockTracker::new(
                vec![entry(1, 2.0, "Dana", Some(1))],
                vec![issue(1, "Bug", Some(v1.clone())), issue(2, "Bug", None)],
            )
            .with_versions(vec![v1.clone()]),
        );

        let mut req = request("web");
        req.version = Some("1.0".to_string());
        let result = engine.analyze(&req).await.unwrap();

        assert_eq!(result.filters.version, Some(v1));
        assert_eq!(result.summary.total_issues, 1);
        assert_eq!(tracker.count_calls("issues"), 1);
    }

    #[tokio::test]
    async fn test_unresolved_version_fetches_nothing() {
        let (tracker, engine) = create_engine(MockTracker::default());

        let mut req = request("web");
        req.version = Some("missing".to_string());
        let err = engine.analyze(&req).await.unwrap_err();

        assert!(matches!(err, EngineError::FilterResolution(_)));
        assert!(tracker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts() {
        let (_, engine) = create_engine(MockTracker::default().failing_on("issues"));

        let err = engine.analyze(&request("web")).await.unwrap_err();
        assert!(matches!(err, EngineError::Fetch { what: "issues", .. }));
    }

    #[tokio::test]
    async fn test_run_inline() {
        let (_, engine) = create_engine(MockTracker::new(
            vec![entry(1, 1.5, "Dana", Some(1))],
            vec![issue(1, "Bug", None)],
        ));

        let mut req = request("web");
        req.output_format = OutputFormat::Tabular;
        let outcome = engine.run(&req).await.unwrap();

        assert!(outcome.artifact.filename.starts_with("web_time_report_"));
        assert!(outcome.artifact.filename.ends_with(".csv"));
        match outcome.delivery.unwrap() {
            Delivery::Inline { content_type, .. } => assert_eq!(content_type, "text/csv"),
            other => panic!("expected inline delivery, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_artifact() {
        let (_, engine) = create_engine(
            MockTracker::new(vec![entry(1, 1.0, "Dana", None)], vec![]).failing_on("upload"),
        );

        let mut req = request("web");
        req.delivery_target = Some(DeliveryTarget::Issue(IssueTarget { issue_id: 5 }));
        let outcome = engine.run(&req).await.unwrap();

        assert!(!outcome.artifact.bytes.is_empty());
        assert!(matches!(
            outcome.delivery,
            Err(EngineError::Delivery { stage: "upload", .. })
        ));
    }

    #[tokio::test]
    async fn test_run_comparison_delivers_to_first_project() {
        let (tracker, engine) = create_engine(MockTracker::new(
            vec![entry(1, 4.0, "Dana", Some(1))],
            vec![issue(1, "Bug", None)],
        ));

        let mut first = request("web");
        first.output_format = OutputFormat::Spreadsheet;
        first.delivery_target = Some(DeliveryTarget::Files(FilesTarget { version: None }));
        let outcome = engine
            .run_comparison(&[first, request("api")])
            .await
            .unwrap();

        assert!(outcome.artifact.filename.starts_with("comparison_time_report_"));
        assert!(outcome.artifact.bytes.starts_with(b"PK"));
        assert_eq!(tracker.project_files()[0].0, "web");
        assert_eq!(tracker.count_calls("get_project"), 2);
    }

    #[test]
    fn test_compare_keeps_request_order() {
        let (_, engine) = create_engine(MockTracker::new(
            vec![entry(1, 2.0, "Dana", None)],
            vec![],
        ));

        let comparison =
            tokio_test::block_on(engine.compare(&[request("b"), request("a")])).unwrap();
        let names: Vec<&str> = comparison
            .projects
            .iter()
            .map(|p| p.project.identifier.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
