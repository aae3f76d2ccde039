//! Project-level orchestration: extraction per document, then cross-referencing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::analysis::{
    AnalysisConfig, DocumentAnalysis, DocumentExtractor, DocumentOutcome, SkippedDocument,
    StrategySet, TermDictionary,
};
use crate::crossref::{CrossReferenceEngine, CrossReferenceResult};
use crate::domain::{Alert, DocumentType};
use crate::matching::{ApproximateMatcher, TokenSortMatcher};

pub const SCHEMA_VERSION: u32 = 1;

/// Raw text per document category, as handed over by the text-extraction collaborator.
pub type ProjectDocuments = BTreeMap<DocumentType, String>;

/// Immutable engine configuration, shared by every call instead of process-wide state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub strategies: StrategySet,
    pub dictionary: TermDictionary,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub page_count: u32,
    pub term_count: usize,
    pub quantity_count: usize,
    pub alert_count: usize,
    pub text_quality: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub analysis: DocumentAnalysis,
    pub metadata: ProcessingMetadata,
}

/// Combined result of a project run. Optional sections stay empty rather than absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAnalysis {
    pub schema_version: u32,
    pub documents: BTreeMap<DocumentType, DocumentReport>,
    pub skipped: Vec<SkippedDocument>,
    pub cross_reference: CrossReferenceResult,
    pub overall_confidence: f64,
}

impl ProjectAnalysis {
    pub fn analysis(&self, document_type: DocumentType) -> Option<&DocumentAnalysis> {
        self.documents
            .get(&document_type)
            .map(|report| &report.analysis)
    }

    pub fn analyses(&self) -> impl Iterator<Item = &DocumentAnalysis> {
        self.documents.values().map(|report| &report.analysis)
    }

    pub fn is_skipped(&self, document_type: DocumentType) -> bool {
        self.skipped
            .iter()
            .any(|skipped| skipped.document_type == document_type)
    }

    /// Skipped-document alerts, then per-document alerts, then cross-reference alerts.
    pub fn alerts(&self) -> Vec<&Alert> {
        self.skipped
            .iter()
            .map(|skipped| &skipped.alert)
            .chain(self.analyses().flat_map(|analysis| analysis.alerts.iter()))
            .chain(self.cross_reference.alerts.iter())
            .collect()
    }
}

struct Completed {
    document_type: DocumentType,
    outcome: DocumentOutcome,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

/// Runs every document through the extractor and cross-references the results.
#[derive(Clone)]
pub struct ProjectAnalyzer {
    engine: Arc<EngineConfig>,
    matcher: Arc<dyn ApproximateMatcher>,
}

impl ProjectAnalyzer {
    pub fn new(engine: Arc<EngineConfig>, matcher: Arc<dyn ApproximateMatcher>) -> Self {
        Self { engine, matcher }
    }

    pub fn standard() -> Self {
        Self::new(Arc::new(EngineConfig::default()), Arc::new(TokenSortMatcher))
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn matcher(&self) -> Arc<dyn ApproximateMatcher> {
        Arc::clone(&self.matcher)
    }

    /// Sequential run in strategy priority order.
    pub fn analyze(&self, documents: &ProjectDocuments) -> ProjectAnalysis {
        self.run_sequential(documents, Utc::now)
    }

    /// Sequential run with every timestamp pinned to `at`, for reproducible output.
    pub fn analyze_at(&self, documents: &ProjectDocuments, at: DateTime<Utc>) -> ProjectAnalysis {
        self.run_sequential(documents, || at)
    }

    /// Extracts each document on the blocking pool. A document that exceeds `timeout` or
    /// whose task panics is recorded as an extraction failure; its siblings are unaffected.
    pub async fn analyze_concurrent(
        &self,
        documents: ProjectDocuments,
        timeout: Option<Duration>,
    ) -> ProjectAnalysis {
        let mut tasks = JoinSet::new();
        let mut completed = Vec::new();

        for document_type in self.engine.strategies.processing_order() {
            let text = documents.get(&document_type).cloned().unwrap_or_default();
            if text.trim().is_empty() {
                let now = Utc::now();
                completed.push(Completed {
                    document_type,
                    outcome: DocumentOutcome::Skipped(SkippedDocument::missing(document_type)),
                    started_at: now,
                    finished_at: now,
                });
                continue;
            }

            let engine = Arc::clone(&self.engine);
            let matcher = Arc::clone(&self.matcher);
            tasks.spawn(async move {
                let started_at = Utc::now();
                let handle = tokio::task::spawn_blocking(move || {
                    let strategy = engine.strategies.resolve(document_type);
                    DocumentExtractor::new(&engine.dictionary, &engine.analysis, matcher.as_ref())
                        .extract(&text, document_type, &strategy)
                });

                let joined = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, handle).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            return Completed {
                                document_type,
                                outcome: DocumentOutcome::Skipped(SkippedDocument::failed(
                                    document_type,
                                    format!("extraction exceeded {} ms", limit.as_millis()),
                                )),
                                started_at,
                                finished_at: Utc::now(),
                            };
                        }
                    },
                    None => handle.await,
                };

                let outcome = joined.unwrap_or_else(|err| {
                    DocumentOutcome::Skipped(SkippedDocument::failed(
                        document_type,
                        format!("extraction task failed: {err}"),
                    ))
                });
                Completed {
                    document_type,
                    outcome,
                    started_at,
                    finished_at: Utc::now(),
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(done) => completed.push(done),
                Err(err) => warn!(error = %err, "document task aborted"),
            }
        }

        self.combine(completed)
    }

    fn run_sequential(
        &self,
        documents: &ProjectDocuments,
        clock: impl Fn() -> DateTime<Utc>,
    ) -> ProjectAnalysis {
        let engine = self.engine.as_ref();
        let extractor =
            DocumentExtractor::new(&engine.dictionary, &engine.analysis, self.matcher.as_ref());

        let completed = engine
            .strategies
            .processing_order()
            .into_iter()
            .map(|document_type| {
                let started_at = clock();
                let text = documents
                    .get(&document_type)
                    .map(String::as_str)
                    .unwrap_or_default();
                let strategy = engine.strategies.resolve(document_type);
                let outcome = extractor.extract(text, document_type, &strategy);
                Completed {
                    document_type,
                    outcome,
                    started_at,
                    finished_at: clock(),
                }
            })
            .collect();

        self.combine(completed)
    }

    fn combine(&self, completed: Vec<Completed>) -> ProjectAnalysis {
        let mut analyses = BTreeMap::new();
        let mut timings = BTreeMap::new();
        let mut skipped = Vec::new();

        for done in completed {
            match done.outcome {
                DocumentOutcome::Extracted(analysis) => {
                    info!(
                        document = %done.document_type,
                        terms = analysis.terms.len(),
                        quantities = analysis.quantities.len(),
                        alerts = analysis.alerts.len(),
                        "document extracted"
                    );
                    timings.insert(done.document_type, (done.started_at, done.finished_at));
                    analyses.insert(done.document_type, analysis);
                }
                DocumentOutcome::Skipped(document) => {
                    warn!(document = %done.document_type, reason = ?document.reason, "document skipped");
                    skipped.push(document);
                }
            }
        }
        skipped.sort_by_key(|document| document.document_type);

        let cross_reference = CrossReferenceEngine::new(&self.engine.analysis).cross_reference(&analyses);
        let overall_confidence = self.overall_confidence(&cross_reference);
        info!(
            documents = analyses.len(),
            skipped = skipped.len(),
            discrepancies = cross_reference.quantity_discrepancies.len(),
            overall_confidence,
            "project analysis complete"
        );

        let documents = analyses
            .into_iter()
            .map(|(document_type, mut analysis)| {
                analysis.terms = analysis
                    .terms
                    .iter()
                    .map(|found| match cross_reference.tag_for(&found.term) {
                        Some(tag) => found.tagged(tag),
                        None => found.clone(),
                    })
                    .collect();

                let (started_at, finished_at) = timings[&document_type];
                let metadata = ProcessingMetadata {
                    page_count: analysis.page_count,
                    term_count: analysis.terms.len(),
                    quantity_count: analysis.quantities.len(),
                    alert_count: analysis.alerts.len(),
                    text_quality: analysis.text_quality,
                    started_at,
                    finished_at,
                };
                (document_type, DocumentReport { analysis, metadata })
            })
            .collect();

        ProjectAnalysis {
            schema_version: SCHEMA_VERSION,
            documents,
            skipped,
            cross_reference,
            overall_confidence,
        }
    }

    /// Mean of per-document confidence scores weighted by each strategy's boost.
    fn overall_confidence(&self, cross_reference: &CrossReferenceResult) -> f64 {
        let (weighted, total) = cross_reference.confidence_scores.iter().fold(
            (0.0, 0.0),
            |(weighted, total), (document_type, score)| {
                let weight = self.engine.strategies.weight(*document_type);
                (weighted + score * weight, total + weight)
            },
        );
        if total <= 0.0 {
            debug!("no analysed documents; overall confidence is zero");
            return 0.0;
        }
        (weighted / total).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SkipReason;
    use crate::domain::TermStatus;
    use chrono::TimeZone;

    fn documents(entries: &[(DocumentType, &str)]) -> ProjectDocuments {
        entries
            .iter()
            .map(|(document_type, text)| (*document_type, text.to_string()))
            .collect()
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn absent_documents_are_skipped_not_fatal() {
        let analyzer = ProjectAnalyzer::standard();
        let project = analyzer.analyze_at(
            &documents(&[(DocumentType::BidForms, "12 BALUSTER EA 100")]),
            fixed_time(),
        );

        assert_eq!(project.documents.len(), 1);
        assert_eq!(project.skipped.len(), 3);
        assert!(project
            .skipped
            .iter()
            .all(|skipped| skipped.reason == SkipReason::MissingDocument));
        assert_eq!(project.schema_version, SCHEMA_VERSION);
        assert!(project.overall_confidence > 0.0);
    }

    #[test]
    fn terms_carry_cross_reference_tags() {
        let analyzer = ProjectAnalyzer::standard();
        let project = analyzer.analyze_at(
            &documents(&[
                (DocumentType::BidForms, "12 BALUSTER EA 100"),
                (DocumentType::Specifications, "Furnish 80 EA baluster units."),
            ]),
            fixed_time(),
        );

        let analysis = project
            .analysis(DocumentType::Specifications)
            .expect("specifications analysed");
        let baluster = analysis
            .matches_for("BALUSTER")
            .next()
            .expect("baluster match");
        let tag = baluster.cross_reference.as_ref().expect("tagged");
        assert_eq!(tag.status, TermStatus::Discrepancy);
        assert_eq!(
            tag.documents,
            vec![DocumentType::Specifications, DocumentType::BidForms]
        );
    }

    #[test]
    fn pinned_runs_are_identical() {
        let analyzer = ProjectAnalyzer::standard();
        let docs = documents(&[
            (DocumentType::Specifications, "Formwork 1,200 SQFT.\nBaluster 90 EA."),
            (DocumentType::ConstructionPlans, "(24) BALUSTERS at blockout."),
        ]);
        assert_eq!(
            analyzer.analyze_at(&docs, fixed_time()),
            analyzer.analyze_at(&docs, fixed_time())
        );
    }

    #[tokio::test]
    async fn concurrent_run_matches_sequential_findings() {
        let analyzer = ProjectAnalyzer::standard();
        let docs = documents(&[
            (DocumentType::BidForms, "12 BALUSTER EA 100\n14 FORMWORK SQFT 2,400"),
            (DocumentType::Specifications, "Furnish 80 EA baluster units."),
            (DocumentType::Supplemental, "Erosion control 400 LF."),
        ]);

        let sequential = analyzer.analyze(&docs);
        let concurrent = analyzer.analyze_concurrent(docs, None).await;

        assert_eq!(sequential.cross_reference, concurrent.cross_reference);
        assert_eq!(sequential.skipped, concurrent.skipped);
        assert_eq!(sequential.overall_confidence, concurrent.overall_confidence);
        for (document_type, report) in &sequential.documents {
            assert_eq!(
                Some(&report.analysis),
                concurrent.analysis(*document_type),
                "{document_type}"
            );
        }
    }

    struct SlowMatcher;

    impl ApproximateMatcher for SlowMatcher {
        fn similarity(&self, left: &str, right: &str) -> f64 {
            std::thread::sleep(Duration::from_millis(20));
            TokenSortMatcher.similarity(left, right)
        }
    }

    #[tokio::test]
    async fn timed_out_documents_become_extraction_failures() {
        let analyzer = ProjectAnalyzer::new(Arc::new(EngineConfig::default()), Arc::new(SlowMatcher));
        let project = analyzer
            .analyze_concurrent(
                documents(&[(DocumentType::Specifications, "baluster")]),
                Some(Duration::from_millis(5)),
            )
            .await;

        let failed = project
            .skipped
            .iter()
            .find(|skipped| skipped.document_type == DocumentType::Specifications)
            .expect("specifications skipped");
        assert!(matches!(failed.reason, SkipReason::ExtractionFailure { .. }));
        assert!(project.documents.is_empty());
    }
}
