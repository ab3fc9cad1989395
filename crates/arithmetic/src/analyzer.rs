//! Template fingerprinting.
//!
//! Measures how templated a batch of generated queries looks and how far
//! its surface statistics sit from a GSM-8K-like target.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use virtual_expert_core::{Error, Result};

/// Checked in order; a query counts toward the first one it contains.
const QUESTION_STARTERS: [&str; 10] = [
    "How many",
    "How much",
    "What is",
    "What's",
    "What was",
    "What are",
    "Find",
    "Calculate",
    "Determine",
    "Figure out",
];

const NGRAM_SIZE: usize = 3;

fn sentence_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)^\w+ has \d+",
            r"(?i)^\w+ bought \d+",
            r"(?i)^\w+ wants to",
            r"(?i)^\w+ went to",
            r"(?i)If \w+ has",
            r"(?i)There are \d+",
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("sentence pattern is valid"))
        .collect()
    })
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w+\b").expect("word regex is valid"))
}

fn sentence_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("sentence split regex is valid"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthStats {
    pub mean: f64,
    pub min: usize,
    pub max: usize,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountStats {
    pub mean: f64,
    pub min: usize,
    pub max: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyStats {
    pub total_words: usize,
    pub unique_words: usize,
    /// Unique over total words.
    pub richness: f64,
}

/// The four components of the fingerprint score, each in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uniformity {
    pub question_starter: f64,
    pub sentence_pattern: f64,
    pub ngram_repetition: f64,
    pub length: f64,
}

impl Uniformity {
    pub fn mean(&self) -> f64 {
        (self.question_starter + self.sentence_pattern + self.ngram_repetition + self.length) / 4.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub count: usize,
    pub fingerprint_score: f64,
    /// Characters per query.
    pub length: LengthStats,
    pub word_count: CountStats,
    pub sentence_count: CountStats,
    pub question_starters: BTreeMap<String, usize>,
    pub vocabulary: VocabularyStats,
    pub uniformity: Uniformity,
}

/// Target surface statistics. Defaults approximate GSM-8K.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetProfile {
    pub length_mean: f64,
    pub word_count_mean: f64,
    pub sentence_count_mean: f64,
    pub vocab_richness: f64,
    pub fingerprint_score: f64,
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self {
            length_mean: 180.0,
            word_count_mean: 45.0,
            sentence_count_mean: 4.0,
            vocab_richness: 0.35,
            fingerprint_score: 0.15,
        }
    }
}

/// Current minus target, per metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetGaps {
    pub length: f64,
    pub word_count: f64,
    pub sentence_count: f64,
    pub vocab_richness: f64,
    pub fingerprint_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetComparison {
    pub current: QueryAnalysis,
    pub target: TargetProfile,
    pub gaps: TargetGaps,
    pub recommendations: Vec<String>,
}

/// Detects template regularity in generated queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateAnalyzer;

impl TemplateAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// 0.0 for a varied batch up to 1.0 for a fully templated one.
    pub fn fingerprint_score<S: AsRef<str>>(&self, queries: &[S]) -> f64 {
        if queries.is_empty() {
            return 0.0;
        }
        uniformity(queries).mean()
    }

    pub fn analyze<S: AsRef<str>>(&self, queries: &[S]) -> Result<QueryAnalysis> {
        if queries.is_empty() {
            return Err(Error::invalid_request("No queries provided"));
        }

        let lengths: Vec<usize> = queries.iter().map(|q| q.as_ref().chars().count()).collect();
        let word_counts: Vec<usize> = queries
            .iter()
            .map(|q| q.as_ref().split_whitespace().count())
            .collect();
        let sentence_counts: Vec<usize> = queries
            .iter()
            .map(|q| sentence_split_re().split(q.as_ref()).count())
            .collect();

        let words: Vec<String> = queries.iter().flat_map(|q| words(q.as_ref())).collect();
        let unique_words = words.iter().collect::<std::collections::HashSet<_>>().len();
        let richness = if words.is_empty() {
            0.0
        } else {
            unique_words as f64 / words.len() as f64
        };

        let uniformity = uniformity(queries);
        Ok(QueryAnalysis {
            count: queries.len(),
            fingerprint_score: uniformity.mean(),
            length: LengthStats {
                mean: mean(&lengths),
                min: lengths.iter().copied().min().unwrap_or(0),
                max: lengths.iter().copied().max().unwrap_or(0),
                std: std_dev(&lengths),
            },
            word_count: count_stats(&word_counts),
            sentence_count: count_stats(&sentence_counts),
            question_starters: count_question_starters(queries),
            vocabulary: VocabularyStats {
                total_words: words.len(),
                unique_words,
                richness,
            },
            uniformity,
        })
    }

    /// Analyze `queries` and report gaps and recommendations against `target`.
    pub fn compare_to_target<S: AsRef<str>>(
        &self,
        queries: &[S],
        target: &TargetProfile,
    ) -> Result<TargetComparison> {
        let current = self.analyze(queries)?;
        let gaps = TargetGaps {
            length: current.length.mean - target.length_mean,
            word_count: current.word_count.mean - target.word_count_mean,
            sentence_count: current.sentence_count.mean - target.sentence_count_mean,
            vocab_richness: current.vocabulary.richness - target.vocab_richness,
            fingerprint_score: current.fingerprint_score - target.fingerprint_score,
        };
        let recommendations = recommendations(&current, target);
        Ok(TargetComparison {
            current,
            target: target.clone(),
            gaps,
            recommendations,
        })
    }
}

fn uniformity<S: AsRef<str>>(queries: &[S]) -> Uniformity {
    Uniformity {
        question_starter: question_starter_uniformity(queries),
        sentence_pattern: sentence_pattern_overlap(queries),
        ngram_repetition: ngram_repetition(queries, NGRAM_SIZE),
        length: length_uniformity(queries),
    }
}

fn count_question_starters<S: AsRef<str>>(queries: &[S]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for query in queries {
        let lower = query.as_ref().to_lowercase();
        if let Some(starter) = QUESTION_STARTERS
            .iter()
            .find(|starter| lower.contains(&starter.to_lowercase()))
        {
            *counts.entry(starter.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Herfindahl concentration of starters, rescaled so an even spread over
/// every known starter is 0 and a single starter is 1.
fn question_starter_uniformity<S: AsRef<str>>(queries: &[S]) -> f64 {
    let counts = count_question_starters(queries);
    let total: usize = counts.values().sum();
    if total == 0 {
        return 0.0;
    }

    let hhi: f64 = counts
        .values()
        .map(|&count| (count as f64 / total as f64).powi(2))
        .sum();
    let floor = 1.0 / QUESTION_STARTERS.len() as f64;
    (hhi - floor) / (1.0 - floor)
}

fn sentence_pattern_overlap<S: AsRef<str>>(queries: &[S]) -> f64 {
    if queries.is_empty() {
        return 0.0;
    }
    let matches = queries
        .iter()
        .filter(|q| sentence_patterns().iter().any(|re| re.is_match(q.as_ref())))
        .count();
    matches as f64 / queries.len() as f64
}

/// Share of distinct n-grams that occur more than once across the batch.
fn ngram_repetition<S: AsRef<str>>(queries: &[S], n: usize) -> f64 {
    let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
    for query in queries {
        let words = words(query.as_ref());
        for window in words.windows(n) {
            *counts.entry(window.to_vec()).or_insert(0) += 1;
        }
    }
    if counts.is_empty() {
        return 0.0;
    }
    let repeated = counts.values().filter(|&&count| count > 1).count();
    repeated as f64 / counts.len() as f64
}

/// One minus the coefficient of variation of query lengths, floored at 0.
fn length_uniformity<S: AsRef<str>>(queries: &[S]) -> f64 {
    let lengths: Vec<usize> = queries.iter().map(|q| q.as_ref().chars().count()).collect();
    let mean = mean(&lengths);
    if mean == 0.0 {
        return 0.0;
    }
    (1.0 - std_dev(&lengths) / mean).max(0.0)
}

fn recommendations(current: &QueryAnalysis, target: &TargetProfile) -> Vec<String> {
    let mut recs = Vec::new();
    if current.length.mean < target.length_mean * 0.8 {
        recs.push("Queries are too short. Use gsm8k_style templates.".to_string());
    }
    if current.fingerprint_score > target.fingerprint_score * 1.5 {
        recs.push("Queries are too templated. Increase perturbation_level.".to_string());
    }
    if current.vocabulary.richness < target.vocab_richness * 0.8 {
        recs.push("Vocabulary is limited. Enable messy_vocab for diversity.".to_string());
    }
    if current.sentence_count.mean < target.sentence_count_mean * 0.7 {
        recs.push("Queries have too few sentences. Use multi-sentence templates.".to_string());
    }
    if recs.is_empty() {
        recs.push("Queries are well-balanced with target metrics.".to_string());
    }
    recs
}

fn words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    word_re()
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn count_stats(values: &[usize]) -> CountStats {
    CountStats {
        mean: mean(values),
        min: values.iter().copied().min().unwrap_or(0),
        max: values.iter().copied().max().unwrap_or(0),
    }
}

fn mean(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

/// Population standard deviation; 0 below two values.
fn std_dev(values: &[usize]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATED: [&str; 4] = [
        "Ann has 5 apples. She buys 3 more. How many apples does she have?",
        "Bob has 7 apples. He buys 2 more. How many apples does he have?",
        "Cal has 4 apples. He buys 6 more. How many apples does he have?",
        "Dee has 9 apples. She buys 1 more. How many apples does she have?",
    ];

    const VARIED: [&str; 4] = [
        "A train leaves the station at noon traveling sixty miles per hour toward the coast, where it must arrive before dusk. What is the distance covered after three hours?",
        "Find the total weight of twelve crates if each weighs 8 kilograms.",
        "Priya saved money for a bicycle over several weeks while working at the bakery on weekends. Calculate her savings.",
        "Determine what fraction of the garden remains unplanted.",
    ];

    #[test]
    fn test_templated_scores_higher_than_varied() {
        let analyzer = TemplateAnalyzer::new();
        let templated = analyzer.fingerprint_score(&TEMPLATED);
        let varied = analyzer.fingerprint_score(&VARIED);

        assert!(templated > 0.7, "templated score {}", templated);
        assert!(varied < templated, "varied {} vs templated {}", varied, templated);
    }

    #[test]
    fn test_components() {
        assert_eq!(question_starter_uniformity(&TEMPLATED), 1.0);
        assert_eq!(sentence_pattern_overlap(&TEMPLATED), 1.0);
        assert_eq!(question_starter_uniformity(&["no question here"]), 0.0);

        let same = ["abc", "xyz"];
        assert_eq!(length_uniformity(&same), 1.0);
        assert_eq!(ngram_repetition(&["one two three", "one two three"], 3), 1.0);
        assert_eq!(ngram_repetition(&["one two"], 3), 0.0);
    }

    #[test]
    fn test_analyze() {
        let analysis = TemplateAnalyzer::new().analyze(&TEMPLATED).unwrap();

        assert_eq!(analysis.count, 4);
        assert_eq!(analysis.question_starters.get("How many"), Some(&4));
        // Three sentences plus the empty tail after the final '?'.
        assert_eq!(analysis.sentence_count.min, 4);
        assert_eq!(analysis.word_count.min, 14);
        assert!(analysis.vocabulary.richness < 0.5);
        assert_eq!(analysis.fingerprint_score, analysis.uniformity.mean());
    }

    #[test]
    fn test_empty_batch() {
        let analyzer = TemplateAnalyzer::new();
        let empty: [&str; 0] = [];
        assert_eq!(analyzer.fingerprint_score(&empty), 0.0);
        assert!(matches!(analyzer.analyze(&empty), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_compare_to_target() {
        let comparison = TemplateAnalyzer::new()
            .compare_to_target(&TEMPLATED, &TargetProfile::default())
            .unwrap();

        assert!(comparison.gaps.length < 0.0);
        assert!(comparison.gaps.fingerprint_score > 0.0);
        assert!(comparison
            .recommendations
            .iter()
            .any(|r| r.contains("perturbation_level")));
        assert!(comparison.recommendations.iter().any(|r| r.contains("too short")));
    }
}
