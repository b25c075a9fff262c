//! Rule-based sentence splitting
//!
//! Newlines are hard boundaries. Inside a line a sentence ends at `.`, `!`
//! or `?` when whitespace and then an uppercase letter, a digit or `[`
//! follows. Sentence offsets are exact character offsets into the text.

use biorel_core::span::Span;
use biorel_core::Sentence;

const ABBREVIATIONS: [&str; 12] = [
    "dr", "mr", "mrs", "ms", "vs", "fig", "al", "e.g", "i.e", "approx", "no", "st",
];

/// Split `text` into trimmed sentence spans
pub fn split_spans(text: &str) -> Vec<Span> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    let mut start = 0;

    for i in 0..chars.len() {
        match chars[i] {
            '\n' => {
                push_trimmed(&chars, start, i, &mut spans);
                start = i + 1;
            }
            '.' | '!' | '?' if is_soft_break(&chars, start, i) => {
                push_trimmed(&chars, start, i + 1, &mut spans);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_trimmed(&chars, start, chars.len(), &mut spans);
    spans
}

/// Split a document text into sentences with ids `{did}.s{n}`
pub fn split_sentences(did: &str, text: &str) -> Vec<Sentence> {
    let chars: Vec<char> = text.chars().collect();
    split_spans(text)
        .into_iter()
        .enumerate()
        .map(|(n, span)| {
            let sentence_text: String = chars[span.start..span.end].iter().collect();
            Sentence::new(sentence_text, span.start, format!("{did}.s{n}"), did)
        })
        .collect()
}

fn is_soft_break(chars: &[char], line_start: usize, i: usize) -> bool {
    let mut j = i + 1;
    if j >= chars.len() || !chars[j].is_whitespace() || chars[j] == '\n' {
        return false;
    }
    while j < chars.len() && chars[j].is_whitespace() && chars[j] != '\n' {
        j += 1;
    }
    let next_ok = chars
        .get(j)
        .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit() || *c == '[');
    if !next_ok {
        return false;
    }
    if chars[i] != '.' {
        return true;
    }

    // abbreviation before the period
    let word_start = chars[line_start..i]
        .iter()
        .rposition(|c| c.is_whitespace())
        .map(|p| line_start + p + 1)
        .unwrap_or(line_start);
    let word: String = chars[word_start..i].iter().collect::<String>().to_lowercase();
    !ABBREVIATIONS.contains(&word.as_str())
}

fn push_trimmed(chars: &[char], mut start: usize, mut end: usize, spans: &mut Vec<Span>) {
    while start < end && chars[start].is_whitespace() {
        start += 1;
    }
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    if start < end {
        spans.push(Span::new(start, end));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use biorel_core::span::char_slice;

    #[test]
    fn test_split_on_punctuation_and_newlines() {
        let text = "Patient admitted. Pain resolved!\n[start section id=\"20112\"]\nCT was done 2 days ago.";
        let sentences = split_sentences("doc", text);
        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Patient admitted.",
                "Pain resolved!",
                "[start section id=\"20112\"]",
                "CT was done 2 days ago.",
            ]
        );
        assert_eq!(sentences[1].sid, "doc.s1");
        for s in &sentences {
            assert_eq!(char_slice(text, s.doc_span()), Some(s.text.as_str()));
        }
    }

    #[test]
    fn test_no_split_before_lowercase_or_abbreviation() {
        let spans = split_spans("Levels were 2.5 mg. vs. baseline, seen by Dr. Smith today.");
        assert_eq!(spans.len(), 1);

        let spans = split_spans("e.g. this stays. But this splits.");
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn test_offsets_with_multibyte_and_blank_lines() {
        let text = "  Café noted.  \n\n Über alles. Done.";
        let sentences = split_sentences("d", text);
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0].offset, 2);
        assert_eq!(sentences[1].text, "Über alles.");
        for s in &sentences {
            assert_eq!(char_slice(text, s.doc_span()), Some(s.text.as_str()));
        }
    }
}
