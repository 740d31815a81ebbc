//! Citation-grounded lookups over one snapshot
//!
//! The engine holds an `Arc<Snapshot>` and nothing else: every statement it
//! returns is copied from a record in that snapshot, tagged with its id.

use crate::QueryConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use stratum_domain::{Constraint, ConstraintId, Fit, FitId, FitResult, NodeRef, Scope, Status, Tier};
use stratum_store::{tsv, Snapshot};
use tracing::debug;

const STOPWORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "by", "can", "do", "does",
    "did", "for", "from", "give", "how", "i", "if", "in", "is", "it", "its", "me", "of", "on",
    "or", "show", "tell", "that", "the", "there", "these", "this", "those", "to", "was", "we",
    "were", "what", "when", "where", "which", "who", "why", "with", "you",
];

/// Terms marking a question about natural-language meaning
const SEMANTIC_MARKERS: &[&str] = &[
    "mean",
    "means",
    "meaning",
    "translate",
    "translates",
    "translation",
    "interpret",
    "interpretation",
    "signify",
    "signifies",
];

/// Lowercased alphanumeric terms, stopwords removed
pub fn content_terms(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    text.split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
        .map(|t| t.trim_matches('-').to_lowercase())
        .filter(|t| t.chars().count() > 1 && !STOPWORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn asks_for_meaning(question: &str) -> bool {
    let lowered = question.to_lowercase();
    lowered.contains("natural language")
        || content_terms(&lowered)
            .iter()
            .any(|t| SEMANTIC_MARKERS.contains(&t.as_str()))
}

/// One cited record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Record id (a constraint version or a fit)
    pub id: NodeRef,
    /// Tier (a confidence label for fits)
    pub tier: Tier,
    /// Scope
    pub scope: Scope,
    /// Status at snapshot time (fits are always active)
    pub status: Status,
    /// Fit outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<FitResult>,
    /// Statement, verbatim
    pub statement: String,
    /// Share of query terms matched (1.0 for id lookups)
    pub score: f64,
}

impl Citation {
    fn from_record(record: &Constraint, score: f64) -> Self {
        Self {
            id: NodeRef::Constraint(record.id.clone()),
            tier: record.tier,
            scope: record.scope,
            status: record.status,
            result: None,
            statement: record.statement.clone(),
            score,
        }
    }

    fn from_fit(fit: &Fit, score: f64) -> Self {
        Self {
            id: NodeRef::Fit(fit.id.clone()),
            tier: fit.tier,
            scope: fit.scope,
            status: Status::Active,
            result: Some(fit.result.clone()),
            statement: fit.statement.clone(),
            score,
        }
    }

    /// Whether the cited record binds (a tier 0-2 constraint)
    pub fn is_binding(&self) -> bool {
        self.is_constraint() && self.tier.is_binding()
    }

    /// Whether the cited record is a constraint version
    pub fn is_constraint(&self) -> bool {
        self.id.as_constraint().is_some()
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] (", self.id)?;
        if let Some(result) = &self.result {
            write!(f, "fit {}, {}, {}", self.tier, self.scope, result)?;
        } else {
            write!(f, "{}, {}", self.tier, self.scope)?;
            if self.status != Status::Active {
                write!(f, ", {}", self.status)?;
            }
        }
        write!(f, ") {}", self.statement)
    }
}

/// Result of [`QueryEngine::answer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Answer {
    /// Answer assembled only from cited records
    Grounded {
        /// Answer text; one line per citation
        text: String,
        /// Records the text was built from (at least one)
        citations: Vec<Citation>,
    },

    /// The snapshot cannot answer the question
    InsufficientContext {
        /// Terms the snapshot has nothing on
        missing: Vec<String>,
        /// Why the engine declined
        reason: String,
    },
}

impl Answer {
    /// Whether the answer is grounded
    pub fn is_grounded(&self) -> bool {
        matches!(self, Answer::Grounded { .. })
    }

    /// Citations of a grounded answer (empty otherwise)
    pub fn citations(&self) -> &[Citation] {
        match self {
            Answer::Grounded { citations, .. } => citations,
            Answer::InsufficientContext { .. } => &[],
        }
    }
}

/// Read-only query engine over one snapshot
#[derive(Debug, Clone)]
pub struct QueryEngine {
    snapshot: Arc<Snapshot>,
    config: QueryConfig,
}

impl QueryEngine {
    /// Create an engine over a snapshot
    pub fn new(snapshot: Arc<Snapshot>, config: QueryConfig) -> Self {
        Self { snapshot, config }
    }

    /// Create an engine with default configuration
    pub fn with_defaults(snapshot: Arc<Snapshot>) -> Self {
        Self::new(snapshot, QueryConfig::default())
    }

    /// The snapshot being queried
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Active configuration
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Look up by exact id, family base or keywords
    ///
    /// A bare family base (`C498`) returns the whole supersession chain, oldest
    /// first. An id with a suffix returns that version, and a fit id returns
    /// that fit. Discarded versions are left out unless the configuration asks
    /// for them. Anything else is a keyword search over constraints and fits,
    /// ranked binding constraints first, then by score.
    pub fn query(&self, term: &str, tiers: Option<&[Tier]>, scope: Option<Scope>) -> Vec<Citation> {
        let keep = |tier: Tier, record_scope: Scope| {
            tiers.is_none_or(|t| t.contains(&tier))
                && scope.is_none_or(|s| record_scope.intersects(&s))
        };
        let visible = |c: &Constraint| self.config.include_discarded || c.status != Status::Discarded;

        if let Ok(id) = tsv::normalize_id(term) {
            if id.suffix().is_none() {
                let chain = self.snapshot.chain(&id.family());
                if !chain.is_empty() {
                    return chain
                        .into_iter()
                        .filter(|c| visible(*c) && keep(c.tier, c.scope))
                        .map(|c| Citation::from_record(c, 1.0))
                        .collect();
                }
            }
            if let Some(record) = self.snapshot.ledger.get(&id) {
                return if visible(record) && keep(record.tier, record.scope) {
                    vec![Citation::from_record(record, 1.0)]
                } else {
                    Vec::new()
                };
            }
        }

        if let Some(fit) = self.fit(term) {
            return if keep(fit.tier, fit.scope) {
                vec![Citation::from_fit(fit, 1.0)]
            } else {
                Vec::new()
            };
        }

        let terms = content_terms(term);
        let mut hits = self.search(&terms, &keep);
        hits.truncate(self.config.max_citations);
        hits
    }

    fn fit(&self, term: &str) -> Option<&Fit> {
        FitId::new(term).ok().and_then(|id| self.snapshot.fits.get(&id))
    }

    fn search(&self, terms: &[String], keep: &dyn Fn(Tier, Scope) -> bool) -> Vec<Citation> {
        if terms.is_empty() {
            return Vec::new();
        }
        let score = |vocabulary: BTreeSet<String>| {
            let matched = terms.iter().filter(|t| vocabulary.contains(*t)).count();
            (matched > 0).then(|| matched as f64 / terms.len() as f64)
        };

        let constraints = self
            .snapshot
            .ledger
            .iter()
            .filter(|c| c.status != Status::Discarded)
            .filter(|c| self.config.include_superseded || c.is_active())
            .filter(|c| keep(c.tier, c.scope))
            .filter_map(|record| {
                score(record_terms(record)).map(|s| Citation::from_record(record, s))
            });
        let fits = self
            .snapshot
            .fits
            .iter()
            .filter(|f| keep(f.tier, f.scope))
            .filter_map(|fit| score(fit_terms(fit)).map(|s| Citation::from_fit(fit, s)));

        let mut hits: Vec<Citation> = constraints.chain(fits).collect();
        hits.sort_by(|a, b| {
            b.is_binding()
                .cmp(&a.is_binding())
                .then(b.score.total_cmp(&a.score))
                .then(b.is_constraint().cmp(&a.is_constraint()))
                .then(a.tier.cmp(&b.tier))
                .then(a.id.cmp(&b.id))
        });
        hits
    }

    /// Answer a question from the snapshot alone
    ///
    /// Records mentioned by id are cited unless discarded. Otherwise the
    /// answer cites constraint and fit keyword matches at or above the
    /// relevance threshold. Questions about natural-language meaning are
    /// declined when the semantic guard is on.
    pub fn answer(&self, question: &str) -> Answer {
        let terms = content_terms(question);

        if self.config.semantic_guard && asks_for_meaning(question) {
            debug!(question, "Declined question beyond the semantic ceiling");
            return Answer::InsufficientContext {
                missing: terms
                    .into_iter()
                    .filter(|t| !SEMANTIC_MARKERS.contains(&t.as_str()))
                    .collect(),
                reason: "the store records constraints, not the meaning of the text they describe"
                    .to_string(),
            };
        }

        let mut citations: Vec<Citation> = Vec::new();
        let words = question
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | '?' | ';' | '(' | ')'));
        for word in words.map(|w| w.trim_end_matches('.')) {
            let mentioned = ConstraintId::parse(word)
                .ok()
                .and_then(|id| self.snapshot.ledger.get(&id))
                .filter(|record| record.status != Status::Discarded)
                .map(|record| Citation::from_record(record, 1.0))
                .or_else(|| self.fit(word).map(|fit| Citation::from_fit(fit, 1.0)));
            if let Some(citation) = mentioned {
                if !citations.iter().any(|c| c.id == citation.id) {
                    citations.push(citation);
                }
            }
        }

        let threshold = self.config.relevance_threshold;
        for hit in self.search(&terms, &|_, _| true) {
            if hit.score >= threshold && !citations.iter().any(|c| c.id == hit.id) {
                citations.push(hit);
            }
        }
        citations.truncate(self.config.max_citations);

        if citations.is_empty() {
            let known: BTreeSet<String> = self
                .snapshot
                .ledger
                .iter()
                .filter(|c| c.status != Status::Discarded)
                .flat_map(record_terms)
                .chain(self.snapshot.fits.iter().flat_map(fit_terms))
                .collect();
            let unknown: Vec<String> = terms.iter().filter(|t| !known.contains(*t)).cloned().collect();
            debug!(question, missing = unknown.len(), "No grounded answer");
            return Answer::InsufficientContext {
                missing: if unknown.is_empty() { terms } else { unknown },
                reason: format!(
                    "no record matches at least {:.0}% of the question terms",
                    threshold * 100.0
                ),
            };
        }

        let mut text = String::new();
        for citation in &citations {
            let _ = writeln!(text, "{}", citation);
        }
        debug!(question, citations = citations.len(), "Grounded answer");
        Answer::Grounded {
            text: text.trim_end().to_string(),
            citations,
        }
    }
}

fn record_terms(record: &Constraint) -> BTreeSet<String> {
    let mut terms: BTreeSet<String> = content_terms(&record.statement).into_iter().collect();
    if let Some(key) = &record.claim_key {
        terms.extend(content_terms(key));
    }
    terms
}

fn fit_terms(fit: &Fit) -> BTreeSet<String> {
    content_terms(&fit.statement).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_terms() {
        assert_eq!(
            content_terms("What is the LINK density, and the LINK ratio?"),
            vec!["link", "density", "ratio"]
        );
        assert!(content_terms("is it a").is_empty());
    }

    #[test]
    fn test_semantic_markers() {
        assert!(asks_for_meaning("what does token X mean in natural language"));
        assert!(asks_for_meaning("Translate folio 3"));
        assert!(!asks_for_meaning("LINK density in scope B"));
    }
}
