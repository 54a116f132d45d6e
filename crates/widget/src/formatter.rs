//! Text to markup conversion for chat bubbles.
//!
//! The formatter is a pure function of its input. It recognises a leading
//! reasoning segment (explicit `<think>` tags first, then a phrasing
//! heuristic), renders it as a reasoning block, and runs the remaining text
//! through a small ordered list of inline substitution rules.

use std::sync::OnceLock;

use regex::Regex;

/// Class of the container wrapping reasoning text.
pub const REASONING_BLOCK_CLASS: &str = "reasoning-block";

const REASONING_OPEN_TAG: &str = "<think>";

/// One literal (pattern, replacement) substitution.
pub struct InlineRule {
    pattern: Regex,
    replacement: &'static str,
}

impl InlineRule {
    fn new(pattern: &str, replacement: &'static str) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("inline rule pattern is a valid literal regex"),
            replacement,
        }
    }

    pub fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, self.replacement)
            .into_owned()
    }
}

/// Ordered inline markdown rules. Order matters: bold runs before italic so
/// `**x**` pairs are consumed before single `*` pairs.
pub struct InlineRules {
    rules: Vec<InlineRule>,
}

impl InlineRules {
    pub fn standard() -> Self {
        Self {
            rules: vec![
                InlineRule::new(r"\*\*(.+?)\*\*", "<strong>${1}</strong>"),
                InlineRule::new(r"\*(.+?)\*", "<em>${1}</em>"),
                InlineRule::new(r"`(.+?)`", "<code>${1}</code>"),
                InlineRule::new(r"\r?\n", "<br>"),
            ],
        }
    }

    /// Runs every rule in order.
    pub fn apply(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |current, rule| rule.apply(&current))
    }
}

struct ReasoningPatterns {
    preamble: Regex,
    sentence_break: Regex,
    paragraph_break: Regex,
    conclusion: Regex,
    end_marker: Regex,
    tagged_region: Regex,
}

fn inline_rules() -> &'static InlineRules {
    static RULES: OnceLock<InlineRules> = OnceLock::new();
    RULES.get_or_init(InlineRules::standard)
}

fn reasoning_patterns() -> &'static ReasoningPatterns {
    static PATTERNS: OnceLock<ReasoningPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile =
            |pattern: &str| Regex::new(pattern).expect("reasoning pattern is a valid literal regex");
        ReasoningPatterns {
            preamble: compile(
                r"(?i)^(?:so\b|hmm+\b|i['’]m thinking|i am thinking|let me think|i need to figure)",
            ),
            sentence_break: compile(r"\.[A-Z]"),
            paragraph_break: compile(r"\n\n"),
            conclusion: compile(r"(?i)so, to summarize|in conclusion|basically"),
            end_marker: compile(r"</think(?:ing)?>"),
            tagged_region: compile(r"(?s)<think>(.*?)</think>"),
        }
    })
}

/// A leading reasoning segment separated from the answer that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasoningSplit<'a> {
    pub reasoning: &'a str,
    pub remainder: &'a str,
}

/// True when trimmed text opens the way model reasoning usually does.
pub fn is_reasoning_prefixed(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with(", ") || reasoning_patterns().preamble.is_match(trimmed)
}

/// Applies the phrasing heuristic. Best effort: misclassification is expected
/// on some conversational answers.
pub fn split_reasoning(text: &str) -> Option<ReasoningSplit<'_>> {
    if !is_reasoning_prefixed(text) {
        return None;
    }

    let trimmed = text.trim();
    let patterns = reasoning_patterns();

    // (start, split) pairs; the reasoning part ends at `split`.
    let candidates = [
        patterns
            .sentence_break
            .find(trimmed)
            .map(|found| (found.start(), found.start() + 1)),
        patterns
            .paragraph_break
            .find(trimmed)
            .map(|found| (found.start(), found.end())),
        patterns
            .conclusion
            .find(trimmed)
            .map(|found| (found.start(), found.end())),
        patterns
            .end_marker
            .find(trimmed)
            .map(|found| (found.start(), found.end())),
    ];

    let (_, split) = candidates
        .into_iter()
        .flatten()
        .filter(|(_, split)| *split > 0)
        .min_by_key(|(start, _)| *start)?;

    if split >= trimmed.len() {
        return None;
    }

    Some(ReasoningSplit {
        reasoning: &trimmed[..split],
        remainder: &trimmed[split..],
    })
}

/// Escapes the characters that would otherwise be parsed as markup. Used for
/// literal text such as placeholders and errors, never inside [`format`].
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn reasoning_block(text: &str) -> String {
    format!("<div class=\"{REASONING_BLOCK_CLASS}\">{text}</div>")
}

/// Applies the inline rules. Source text is not escaped.
pub fn format_inline(text: &str) -> String {
    inline_rules().apply(text)
}

fn format_tagged(text: &str) -> Option<String> {
    let patterns = reasoning_patterns();
    if !patterns.tagged_region.is_match(text) {
        return None;
    }

    let mut markup = String::new();
    let mut cursor = 0;
    for captures in patterns.tagged_region.captures_iter(text) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        let before = &text[cursor..whole.start()];
        let before = if cursor == 0 { before } else { before.trim_start() };
        if !before.trim().is_empty() {
            markup.push_str(&format_inline(before));
        }
        markup.push_str(&reasoning_block(inner.as_str().trim()));
        cursor = whole.end();
    }

    let tail = text[cursor..].trim_start();
    if !tail.is_empty() {
        markup.push_str(&format_inline(tail));
    }
    Some(markup)
}

/// Converts message text into display markup. Never fails.
pub fn format(text: &str) -> String {
    if let Some(markup) = format_tagged(text) {
        return markup;
    }

    // Opening tag without its closing tag yet: the stream is still reasoning.
    let trimmed = text.trim_start();
    if let Some(open_reasoning) = trimmed.strip_prefix(REASONING_OPEN_TAG)
        && !reasoning_patterns().end_marker.is_match(open_reasoning)
    {
        return reasoning_block(open_reasoning.trim());
    }

    match split_reasoning(text) {
        Some(split) => {
            let mut markup = reasoning_block(split.reasoning);
            markup.push_str(&format_inline(split.remainder.trim_start()));
            markup
        }
        None => format_inline(text),
    }
}
