// Blocked word filter - obfuscation-tolerant word matching.
//
// Each configured word compiles to one regex where every letter is a
// character class of its look-alikes, and up to two non-alphanumeric
// characters may sit between letters ("b a d", "b-4-d", "B@D").
//
// An optional partial-match pass runs afterwards on whitespace tokens with a
// vowel-boundary heuristic to suppress obvious false positives.

use super::moderation_config::BlockedWordSettings;
use super::snapshot::Snapshot;
use regex::Regex;

/// Noise tolerated between two letters of a blocked word.
const INTERSTITIAL_NOISE: &str = "[^a-z0-9]{0,2}";

/// Blocked words this short only ever match a whole token in partial mode.
const SHORT_WORD_LEN: usize = 3;

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

/// Leetspeak and accented look-alikes for a letter.
fn substitutions(c: char) -> &'static [char] {
    match c {
        'a' => &['@', '4', 'á', 'à', 'â', 'ä', 'å'],
        'e' => &['3', 'é', 'è', 'ê', 'ë'],
        'i' => &['1', '!', 'í', 'ì', 'î', 'ï'],
        'o' => &['0', 'ó', 'ò', 'ô', 'ö'],
        'u' => &['ú', 'ù', 'û', 'ü'],
        's' => &['$', '5', 'z'],
        't' => &['7', '+'],
        'l' => &['1', '|'],
        'g' => &['9', 'q'],
        'b' => &['8'],
        'c' => &['(', 'k'],
        'k' => &['c'],
        _ => &[],
    }
}

/// One configured word, compiled.
#[derive(Debug, Clone)]
pub struct BlockedPattern {
    word: String,
    regex: Regex,
}

impl BlockedPattern {
    /// Compile a word into its obfuscation-tolerant matcher.
    ///
    /// Returns `Ok(None)` for words that are empty after trimming.
    pub fn compile(word: &str) -> Result<Option<Self>, regex::Error> {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return Ok(None);
        }

        let classes: Vec<String> = word.chars().map(letter_class).collect();
        let source = format!("(?i)(?:{})", classes.join(INTERSTITIAL_NOISE));
        let regex = Regex::new(&source)?;

        Ok(Some(Self { word, regex }))
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn is_match(&self, normalized: &str) -> bool {
        self.regex.is_match(normalized)
    }
}

fn letter_class(c: char) -> String {
    let mut class = String::from("[");
    class.push_str(&regex::escape(&c.to_string()));
    for sub in substitutions(c) {
        if *sub != c {
            class.push_str(&regex::escape(&sub.to_string()));
        }
    }
    class.push(']');
    class
}

/// The whole active word set plus the settings it was built with.
/// Never mutated; reload builds a new one.
#[derive(Debug, Default)]
struct CompiledWordList {
    enabled: bool,
    patterns: Vec<BlockedPattern>,
    partial_matches: bool,
    min_word_length: usize,
}

impl CompiledWordList {
    fn build(settings: &BlockedWordSettings) -> Self {
        if !settings.enabled {
            return Self::default();
        }

        let mut patterns: Vec<BlockedPattern> = Vec::with_capacity(settings.words.len());
        for word in &settings.words {
            match BlockedPattern::compile(word) {
                Ok(Some(pattern)) => {
                    if patterns.iter().all(|p| p.word() != pattern.word()) {
                        patterns.push(pattern);
                    }
                }
                Ok(None) => tracing::warn!("Skipping empty blocked word entry"),
                Err(e) => tracing::warn!(word = %word, "Skipping blocked word: {}", e),
            }
        }

        tracing::info!("Loaded {} blocked words", patterns.len());

        Self {
            enabled: true,
            patterns,
            partial_matches: settings.block_partial_matches,
            min_word_length: settings.min_word_length,
        }
    }

    /// Substring fallback over whitespace tokens. Returns the matched word.
    fn partial_match(&self, normalized: &str) -> Option<&str> {
        for token in normalized.split_whitespace() {
            if token.chars().count() < self.min_word_length {
                continue;
            }

            for pattern in &self.patterns {
                let blocked = pattern.word();
                if blocked.chars().count() < self.min_word_length {
                    continue;
                }
                if token.contains(blocked) && is_likely_true_match(token, blocked) {
                    return Some(blocked);
                }
            }
        }
        None
    }
}

/// Decide whether `blocked`, found inside `token`, is a real hit.
///
/// - the whole token always counts
/// - words of three letters or fewer only count as the whole token
/// - at the start of the token, reject if the next character is a vowel
/// - at the end of the token, reject if the previous character is a vowel
/// - strictly inside the token always counts
///
/// Only the first occurrence is considered.
pub fn is_likely_true_match(token: &str, blocked: &str) -> bool {
    if token == blocked {
        return true;
    }
    if blocked.chars().count() <= SHORT_WORD_LEN {
        return false;
    }

    let Some(index) = token.find(blocked) else {
        return false;
    };
    let end = index + blocked.len();

    if index == 0 {
        // exact length was handled above, so something follows
        return match token[end..].chars().next() {
            Some(next) => !VOWELS.contains(&next),
            None => true,
        };
    }

    if end == token.len() {
        return match token[..index].chars().next_back() {
            Some(prev) => !VOWELS.contains(&prev),
            None => true,
        };
    }

    true
}

/// Lowercase and collapse whitespace runs.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Answers "does this text contain a blocked word".
pub struct BlockedWordFilter {
    active: Snapshot<CompiledWordList>,
}

impl BlockedWordFilter {
    pub fn new(settings: &BlockedWordSettings) -> Self {
        Self {
            active: Snapshot::new(CompiledWordList::build(settings)),
        }
    }

    /// Rebuild the whole pattern set and publish it in one step.
    pub fn reload(&self, settings: &BlockedWordSettings) {
        self.active.replace(CompiledWordList::build(settings));
    }

    pub fn contains(&self, text: &str) -> bool {
        let list = self.active.load();
        if !list.enabled {
            return false;
        }

        let normalized = normalize(text);

        if let Some(pattern) = list.patterns.iter().find(|p| p.is_match(&normalized)) {
            tracing::debug!(word = %pattern.word(), "Blocked word pattern matched");
            return true;
        }

        if list.partial_matches {
            if let Some(word) = list.partial_match(&normalized) {
                tracing::debug!(word = %word, "Partial blocked word match");
                return true;
            }
        }

        false
    }

    /// Words currently being enforced (for admin display).
    pub fn blocked_words(&self) -> Vec<String> {
        self.active
            .load()
            .patterns
            .iter()
            .map(|p| p.word().to_string())
            .collect()
    }
}
