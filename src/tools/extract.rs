//! Pure input extraction from the user's message.
//!
//! Nothing here touches a collaborator; the executor calls these while
//! building tool inputs.

use std::sync::LazyLock;

use regex::Regex;

static LOOKUP_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)search|find|look up|about").expect("valid regex"));

/// Candidate expression shapes, tried in order. First match wins.
static MATH_PATTERNS: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        // binary arithmetic chain: `12 * 4`, `2 + 3 * 4`, `1.5 ** 2`
        Regex::new(r"\d+(?:\.\d+)?(?:\s*(?:\*\*|[-+*/^])\s*\d+(?:\.\d+)?)+").expect("valid regex"),
        Regex::new(r"\d+\s*\*\*\s*\d+").expect("valid regex"),
        Regex::new(r"sqrt\(\d+\)").expect("valid regex"),
        Regex::new(r"(?i)\d+\s*days").expect("valid regex"),
        Regex::new(r"(?i)\d+\s*weeks").expect("valid regex"),
    ]
});

static UNIT_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)days|weeks").expect("valid regex"));

static GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(hi|hello|hey|greetings|good morning|good afternoon|good evening|howdy|what's up|sup)\b",
    )
    .expect("valid regex")
});

/// Knowledge-lookup query: the message with the search verbs removed.
pub fn lookup_query(message: &str) -> String {
    LOOKUP_NOISE.replace_all(message, "").trim().to_string()
}

/// First arithmetic expression found in `message`, with unit words stripped.
pub fn math_expression(message: &str) -> Option<String> {
    MATH_PATTERNS.iter().find_map(|re| re.find(message)).map(|m| {
        UNIT_WORDS.replace_all(m.as_str(), "").trim().to_string()
    })
}

/// Whether the trimmed message opens with a greeting token.
pub fn is_greeting(message: &str) -> bool {
    GREETING.is_match(message.trim())
}

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
