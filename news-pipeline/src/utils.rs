use crate::types::Sentiment;

pub const MAX_TAGS: usize = 5;

/// Bilingual tag vocabulary, in priority order.
pub const TAG_VOCABULARY: [&str; 20] = [
    "breaking", "update", "exclusive", "analysis", "report",
    "technology", "politics", "business", "health", "science",
    "科技", "政治", "商业", "健康", "科学", "突发", "更新", "独家", "分析", "报道",
];

pub const POSITIVE_WORDS: [&str; 9] = [
    "good", "great", "excellent", "success", "achievement", "好", "优秀", "成功", "成就",
];

pub const NEGATIVE_WORDS: [&str; 10] = [
    "bad", "terrible", "crisis", "failure", "problem", "坏", "糟糕", "危机", "失败", "问题",
];

const WORDS_PER_MINUTE: usize = 200;

/// Vocabulary terms found in the text, at most five, in vocabulary order.
pub fn extract_tags(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TAG_VOCABULARY
        .iter()
        .filter(|tag| lowered.contains(*tag))
        .take(MAX_TAGS)
        .map(|tag| tag.to_string())
        .collect()
}

/// Lexicon vote: each lexicon word present counts once.
pub fn detect_sentiment(text: &str) -> Sentiment {
    let lowered = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lowered.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| lowered.contains(*w)).count();

    if positive > negative {
        Sentiment::Positive
    } else if negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Whitespace-separated words, with every CJK character counted on its own.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .map(|token| {
            let cjk = token.chars().filter(|c| is_cjk(*c)).count();
            let has_latin = token.chars().any(|c| !is_cjk(c) && c.is_alphanumeric());
            cjk + usize::from(has_latin)
        })
        .sum()
}

pub fn reading_time_minutes(text: &str) -> u32 {
    let words = word_count(text);
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// First `max_chars` characters plus an ellipsis, never splitting a code point.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x3040..=0x30FF | 0xAC00..=0xD7AF | 0xF900..=0xFAFF)
}
