//! Evidence selection
//!
//! Ranks pooled papers against a sub-question by word overlap and merges
//! them with search hits into a bounded, deduplicated evidence list.

use crate::types::{EvidenceItem, Paper};
use once_cell::sync::Lazy;
use std::collections::HashSet;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from",
        "how", "in", "is", "it", "of", "on", "or", "that", "the", "their", "these", "this",
        "to", "what", "when", "which", "who", "why", "with",
    ]
    .into_iter()
    .collect()
});

/// Truncate to at most `max_chars` characters, marking the cut with `…`
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}…", text[..byte_idx].trim_end()),
        None => text.to_string(),
    }
}

/// Lowercased content words of at least two characters
#[must_use]
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(w.as_str()))
        .collect()
}

/// Jaccard similarity of two token sets
#[must_use]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Pooled papers scoring at least `min_similarity`, best first
///
/// Ties keep pool order.
#[must_use]
pub fn rank_pool<'a>(query: &str, pool: &'a [Paper], min_similarity: f64) -> Vec<&'a Paper> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &Paper)> = pool
        .iter()
        .map(|paper| {
            let tokens = tokenize(&format!("{} {}", paper.title, paper.abstract_text));
            (jaccard(&query_tokens, &tokens), paper)
        })
        .filter(|(score, _)| *score > 0.0 && *score >= min_similarity)
        .collect();

    // Stable sort keeps pool order among equal scores
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, paper)| paper).collect()
}

/// Merge search hits and pool hits into at most `top_k` evidence items
///
/// Search hits come first in source order; a paper id appears once.
#[must_use]
pub fn select_evidence(
    search_hits: &[Paper],
    pool_hits: &[&Paper],
    top_k: usize,
    excerpt_chars: usize,
) -> Vec<EvidenceItem> {
    let mut seen = HashSet::new();
    search_hits
        .iter()
        .chain(pool_hits.iter().copied())
        .filter(|paper| !paper.id.trim().is_empty())
        .filter(|paper| seen.insert(paper.id.as_str()))
        .take(top_k)
        .map(|paper| EvidenceItem::from_paper(paper, excerpt_chars))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paper(id: &str, title: &str, abstract_text: &str) -> Paper {
        Paper::new(id, title, abstract_text)
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll…");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exact", 5), "exact");
    }

    #[test]
    fn tokenize_drops_stop_words_and_case() {
        let tokens = tokenize("What are the CNN-based Deepfake detectors?");
        let expected: HashSet<String> = ["cnn", "based", "deepfake", "detectors"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn jaccard_bounds() {
        let a = tokenize("graph neural networks");
        let b = tokenize("graph neural networks");
        let c = tokenize("protein folding");
        assert_eq!(jaccard(&a, &b), 1.0);
        assert_eq!(jaccard(&a, &c), 0.0);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn rank_pool_orders_by_overlap() {
        let pool = vec![
            paper("p1", "Protein folding", "AlphaFold predicts structures."),
            paper("p2", "Transformer deepfake detection", "Vision transformers detect deepfakes."),
            paper("p3", "CNN deepfake detection", "Convolutional networks for deepfake detection."),
        ];

        let ranked = rank_pool("CNN deepfake detection methods", &pool, 0.05);
        let ids: Vec<&str> = ranked.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p2"]);
    }

    #[test]
    fn rank_pool_respects_threshold() {
        let pool = vec![paper(
            "p1",
            "Deepfake detection",
            "Many unrelated words here about other topics",
        )];
        assert!(rank_pool("deepfake", &pool, 0.9).is_empty());
    }

    #[test]
    fn select_evidence_dedupes_and_bounds() {
        let search = vec![paper("a", "A", "aaa"), paper("b", "B", "bbb")];
        let pool_papers = vec![
            paper("b", "B again", "bbb"),
            paper("c", "C", "ccc"),
            paper("d", "D", "ddd"),
        ];
        let pool_hits: Vec<&Paper> = pool_papers.iter().collect();

        let evidence = select_evidence(&search, &pool_hits, 3, 100);
        let ids: Vec<&str> = evidence.iter().map(|e| e.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(evidence[1].title, "B");
    }

    #[test]
    fn select_evidence_skips_blank_ids() {
        let search = vec![paper("  ", "Nameless", "x"), paper("a", "A", "y")];
        let evidence = select_evidence(&search, &[], 5, 100);
        assert_eq!(evidence.len(), 1);
    }
}
