//! Extractive transcript summarisation
//!
//! A frequency-based summariser with no model dependency, so a summary
//! is always available even when no network or GPU is. Sentences are
//! ranked by TF-IDF word importance and the top few are returned in
//! their original order.

use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Default number of sentences in a summary
pub const DEFAULT_MAX_SENTENCES: usize = 3;

/// Frequency-based extractive summariser
pub struct Summarizer {
    max_sentences: usize,
    word_re: Regex,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SENTENCES)
    }
}

impl Summarizer {
    pub fn new(max_sentences: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
            // Word characters plus apostrophes, so contractions stay whole
            word_re: Regex::new(r"[\w']+").expect("static regex"),
        }
    }

    /// Summarise a transcript down to at most `max_sentences` sentences
    ///
    /// Short transcripts are returned whole. An empty transcript yields
    /// an empty summary.
    pub fn summarize(&self, transcript: &str) -> String {
        let sentences = split_sentences(transcript);
        if sentences.is_empty() {
            return String::new();
        }
        if sentences.len() <= self.max_sentences {
            return sentences.join(" ");
        }

        let scores = self.score_sentences(&sentences);

        let mut ranked: Vec<usize> = (0..sentences.len()).collect();
        ranked.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut top: Vec<usize> = ranked[..self.max_sentences].to_vec();
        top.sort_unstable();

        top.iter()
            .map(|&i| sentences[i].as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn score_sentences(&self, sentences: &[String]) -> Vec<f64> {
        let words_per_sentence: Vec<Vec<String>> =
            sentences.iter().map(|s| self.tokenize(s)).collect();

        let tf_scores: Vec<HashMap<String, f64>> =
            words_per_sentence.iter().map(|w| term_frequency(w)).collect();
        let idf_scores = inverse_document_frequency(&words_per_sentence);

        words_per_sentence
            .iter()
            .zip(tf_scores.iter())
            .map(|(words, tf)| {
                words
                    .iter()
                    .map(|word| {
                        tf.get(word).copied().unwrap_or(0.0)
                            * idf_scores.get(word).copied().unwrap_or(0.0)
                    })
                    .sum()
            })
            .collect()
    }

    fn tokenize(&self, sentence: &str) -> Vec<String> {
        self.word_re
            .find_iter(sentence)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }
}

/// Split text into sentences at `.`, `!` or `?` followed by whitespace
fn split_sentences(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            if chars.peek().map(|n| n.is_whitespace()).unwrap_or(true) {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

fn term_frequency(words: &[String]) -> HashMap<String, f64> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in words {
        *counts.entry(word.as_str()).or_insert(0) += 1;
    }

    let total = words.len().max(1) as f64;
    counts
        .into_iter()
        .map(|(word, count)| (word.to_string(), count as f64 / total))
        .collect()
}

fn inverse_document_frequency(docs: &[Vec<String>]) -> HashMap<String, f64> {
    let doc_count = docs.len() as f64;

    let mut appearances: HashMap<&str, usize> = HashMap::new();
    for doc in docs {
        let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
        for word in unique {
            *appearances.entry(word).or_insert(0) += 1;
        }
    }

    appearances
        .into_iter()
        .map(|(word, count)| {
            (
                word.to_string(),
                (doc_count / (1.0 + count as f64)).ln() + 1.0,
            )
        })
        .collect()
}

/// Derive a short title from the first words of a transcript
pub fn derive_title(transcript: &str, max_words: usize) -> String {
    let words: Vec<&str> = transcript.split_whitespace().take(max_words + 1).collect();

    if words.is_empty() {
        return "Untitled memo".to_string();
    }

    let truncated = words.len() > max_words;
    let mut title = words[..words.len().min(max_words)].join(" ");
    title = title
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_string();
    if truncated {
        title.push('\u{2026}');
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_transcript() {
        let s = Summarizer::default();
        assert_eq!(s.summarize(""), "");
        assert_eq!(s.summarize("   "), "");
    }

    #[test]
    fn test_short_transcript_returned_whole() {
        let s = Summarizer::default();
        let text = "First sentence. Second sentence.";
        assert_eq!(s.summarize(text), "First sentence. Second sentence.");
    }

    #[test]
    fn test_summary_preserves_original_order() {
        let s = Summarizer::new(3);
        let sentences: Vec<String> = (0..8)
            .map(|i| format!("Marker{} content words here.", i))
            .collect();
        let text = sentences.join(" ");

        let summary = s.summarize(&text);

        // Whichever sentences were picked, they keep their original
        // relative order
        let positions: Vec<usize> = sentences
            .iter()
            .filter_map(|sent| summary.find(sent.as_str()))
            .collect();
        assert_eq!(positions.len(), 3);
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_summary_is_shorter() {
        let s = Summarizer::default();
        let text: String = (0..10)
            .map(|i| format!("This is sentence number {} with some words. ", i))
            .collect();
        let summary = s.summarize(&text);
        assert!(summary.len() < text.len());
        // Exactly three sentence terminators
        assert_eq!(summary.matches('.').count(), 3);
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("One. Two! Three? Four"),
            vec!["One.", "Two!", "Three?", "Four"]
        );
        // Decimal points do not split
        assert_eq!(split_sentences("Pi is 3.14 roughly."), vec!["Pi is 3.14 roughly."]);
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("Remember to buy milk", 8), "Remember to buy milk");
        assert_eq!(
            derive_title("one two three four five six seven eight nine", 4),
            "one two three four\u{2026}"
        );
        assert_eq!(derive_title("", 8), "Untitled memo");
        assert_eq!(derive_title("Hello.", 8), "Hello");
    }
}
