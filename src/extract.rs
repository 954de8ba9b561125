//! Field extraction from free text
//!
//! Each extractor returns the value it found (if any) together with the
//! residual text, so the classifier can chain extractors over one message.

mod date;

#[cfg(test)]
mod proptests;

pub use date::{extract_date, DateRange};

use crate::tax::gst::{is_rate_slab, state_named};
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::LazyLock;

/// An optional extracted value plus the text left once it was removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction<T> {
    pub value: Option<T>,
    pub residual: String,
}

impl<T> Extraction<T> {
    fn missing(text: &str) -> Self {
        Self {
            value: None,
            residual: text.to_string(),
        }
    }

    fn found(value: T, residual: String) -> Self {
        Self {
            value: Some(value),
            residual,
        }
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn remove_span(text: &str, start: usize, end: usize) -> String {
    let mut out = text.to_string();
    out.replace_range(start..end, " ");
    collapse_whitespace(&out)
}

fn trim_punctuation(word: &str) -> &str {
    word.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '!' | '?' | '"' | '(' | ')'))
        .trim_end_matches('.')
}

// ============================================================================
// Amounts
// ============================================================================

static CURRENCY_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:₹|\brs\.?|\binr|\brupees?)\s*(\d[\d,]*(?:\.\d+)?)").unwrap()
});

static CURRENCY_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d[\d,]*(?:\.\d+)?)\s*(?:/-|rupees?\b|rs\b|inr\b)").unwrap()
});

/// Largest amount accepted from a message: ₹1,00,000 crore
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

static NUMERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d[\d,]*(?:\.\d+)?\b").unwrap());

fn parse_amount(raw: &str) -> Option<Decimal> {
    if raw.ends_with(',') {
        return None;
    }
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let value = Decimal::from_str_exact(&cleaned).ok()?;
    (value > Decimal::ZERO && value <= MAX_AMOUNT).then_some(value)
}

/// Currency-marked amounts win; otherwise the first numeral that is not part
/// of a date, an invoice number or an address.
pub fn extract_amount(text: &str) -> Extraction<Decimal> {
    let marked = CURRENCY_PREFIX_RE
        .captures_iter(text)
        .chain(CURRENCY_SUFFIX_RE.captures_iter(text))
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value = parse_amount(caps.get(1)?.as_str())?;
            Some((whole.start(), whole.end(), value))
        })
        .min_by_key(|(start, _, _)| *start);

    if let Some((start, end, value)) = marked {
        return Extraction::found(value, remove_span(text, start, end));
    }

    let dates = date::date_spans(text);
    for m in NUMERAL_RE.find_iter(text) {
        let inside_date = dates
            .iter()
            .any(|(start, end)| m.start() < *end && *start < m.end());
        let preceded_by_marker = text
            .get(..m.start())
            .and_then(|before| before.chars().last())
            .is_some_and(|c| matches!(c, '#' | '-' | '@' | '/'));
        if inside_date || preceded_by_marker {
            continue;
        }
        if let Some(value) = parse_amount(m.as_str()) {
            return Extraction::found(value, remove_span(text, m.start(), m.end()));
        }
    }

    Extraction::missing(text)
}

// ============================================================================
// Parties
// ============================================================================

const MAX_NAME_WORDS: usize = 6;

/// Marker words that introduce a party when none is more specific
pub const PARTY_MARKERS: &[&str] = &["to", "from", "of", "with", "for", "by"];

/// Words that end a name
const NAME_STOP_WORDS: &[&str] = &[
    "for", "on", "at", "dated", "date", "with", "from", "to", "by", "of", "via", "amount",
    "rs", "inr", "rupees", "today", "yesterday", "tomorrow", "last", "this", "next", "since",
    "between", "and", "worth", "towards", "under", "in", "ago", "as", "please", "gst", "gstin",
    "january", "february", "march", "april", "june", "july", "august", "september", "october",
    "november", "december", "monday", "tuesday", "wednesday", "thursday", "friday",
    "saturday", "sunday",
];

const LEADING_FILLERS: &[&str] = &["a", "an", "the", "some", "my", "mr", "mr.", "ms", "ms.", "m/s"];

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").unwrap());

fn is_stop_word(word: &str) -> bool {
    NAME_STOP_WORDS.iter().any(|s| word.eq_ignore_ascii_case(s))
}

fn is_filler(word: &str) -> bool {
    LEADING_FILLERS.iter().any(|s| word.eq_ignore_ascii_case(s))
}

fn is_name_word(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_alphabetic)
        && word
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '&' | '.' | '\'' | '-' | '/'))
}

/// Find a party name introduced by one of `markers` ("paid to Ramesh",
/// "ledger of Sharma Traders"). Markers are tried in the order given. The name
/// runs until a stop word, a numeral or punctuation.
pub fn extract_party(text: &str, markers: &[&str]) -> Extraction<String> {
    let tokens: Vec<regex::Match<'_>> = TOKEN_RE.find_iter(text).collect();

    let candidates = markers.iter().flat_map(|wanted| {
        tokens
            .iter()
            .enumerate()
            .filter(move |(_, token)| token.as_str().eq_ignore_ascii_case(wanted))
    });

    for (index, marker) in candidates {
        let mut words = Vec::new();
        let mut end = marker.end();
        for token in tokens.iter().skip(index + 1) {
            let word = trim_punctuation(token.as_str());
            if words.is_empty() && is_filler(word) {
                end = token.end();
                continue;
            }
            if words.len() == MAX_NAME_WORDS || !is_name_word(word) || is_stop_word(word) {
                break;
            }
            words.push(word);
            end = token.end();
            if token.as_str().ends_with(',') {
                break;
            }
        }

        if !words.is_empty() {
            return Extraction::found(words.join(" "), remove_span(text, marker.start(), end));
        }
    }

    Extraction::missing(text)
}

/// Read a reply to "Who is this for?" as a name.
pub fn party_answer(text: &str) -> Option<String> {
    if let Some(name) = extract_party(text, PARTY_MARKERS).value {
        return Some(name);
    }
    let words: Vec<&str> = text
        .split_whitespace()
        .map(trim_punctuation)
        .filter(|w| !w.is_empty())
        .skip_while(|w| is_filler(w))
        .collect();
    if words.is_empty()
        || words.len() > MAX_NAME_WORDS
        || !words.iter().all(|w| is_name_word(w))
        || words.iter().any(|w| is_stop_word(w))
    {
        return None;
    }
    Some(words.join(" "))
}

/// A name opening an answer that carries more than the name ("Ramesh paid
/// ₹1000"). The name must be followed by a command keyword or by text holding
/// an amount. The residual is what follows the name and that keyword.
pub fn leading_name(text: &str, is_keyword: impl Fn(&str) -> bool) -> Extraction<String> {
    let tokens: Vec<regex::Match<'_>> = TOKEN_RE.find_iter(text).collect();

    let mut words = Vec::new();
    let mut name_end = 0;
    let mut next = None;
    for token in &tokens {
        let word = trim_punctuation(token.as_str());
        if words.is_empty() && is_filler(word) {
            continue;
        }
        if words.len() == MAX_NAME_WORDS
            || !is_name_word(word)
            || is_stop_word(word)
            || is_keyword(word)
        {
            next = Some(token);
            break;
        }
        words.push(word);
        name_end = token.end();
        if token.as_str().ends_with(',') {
            break;
        }
    }
    if words.is_empty() {
        return Extraction::missing(text);
    }

    let keyword = next.filter(|token| is_keyword(trim_punctuation(token.as_str())));
    let rest_start = keyword.map_or(name_end, regex::Match::end);
    let residual = collapse_whitespace(text.get(rest_start..).unwrap_or_default());
    if keyword.is_none() && extract_amount(&residual).value.is_none() {
        return Extraction::missing(text);
    }
    Extraction::found(words.join(" "), residual)
}

// ============================================================================
// Categories and descriptions
// ============================================================================

const CATEGORY_MARKERS: &[&str] = &["for", "on", "towards", "under", "category", "as"];
const CATEGORY_STOP_WORDS: &[&str] = &["to", "from", "by", "via", "dated", "paid"];
const MAX_FREE_TEXT_CHARS: usize = 80;

/// Category or reason: the words after "for"/"on"/"towards", or the whole
/// remaining text when no marker is present.
pub fn extract_category(text: &str) -> Extraction<String> {
    let tokens: Vec<regex::Match<'_>> = TOKEN_RE.find_iter(text).collect();

    if let Some(index) = tokens
        .iter()
        .position(|t| CATEGORY_MARKERS.iter().any(|m| t.as_str().eq_ignore_ascii_case(m)))
    {
        let start = tokens[index].start();
        let mut end = tokens[index].end();
        let mut words = Vec::new();
        for token in tokens.iter().skip(index + 1) {
            let word = trim_punctuation(token.as_str());
            if CATEGORY_STOP_WORDS.iter().any(|s| word.eq_ignore_ascii_case(s)) {
                break;
            }
            words.push(word);
            end = token.end();
        }
        if let Some(category) = clean_free_text(&words.join(" ")) {
            return Extraction::found(category, remove_span(text, start, end));
        }
    }

    match clean_free_text(text) {
        Some(category) => Extraction::found(category, String::new()),
        None => Extraction::missing(text),
    }
}

/// Normalize a free-text answer (category, description). Rejects text with no
/// letters in it.
pub fn clean_free_text(text: &str) -> Option<String> {
    let words: Vec<&str> = text
        .split_whitespace()
        .map(trim_punctuation)
        .filter(|w| !w.is_empty())
        .skip_while(|w| {
            is_filler(w) || CATEGORY_MARKERS.iter().any(|m| w.eq_ignore_ascii_case(m))
        })
        .collect();
    let cleaned = words.join(" ");
    if cleaned.is_empty() || !cleaned.chars().any(char::is_alphabetic) {
        return None;
    }
    Some(cleaned.chars().take(MAX_FREE_TEXT_CHARS).collect())
}

// ============================================================================
// Delivery targets, invoice numbers, GSTINs
// ============================================================================

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});

static INVOICE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:#\s*|\binv-?\s*|\bno\.?\s*|\bnumber\s+)0*(\d{1,6})\b").unwrap()
});

static BARE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*#?0*(\d{1,6})\s*$").unwrap());

static GSTIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{2}[a-z]{5}\d{4}[a-z][0-9a-z]z[0-9a-z])\b").unwrap()
});

pub fn extract_email(text: &str) -> Extraction<String> {
    match EMAIL_RE.find(text) {
        Some(m) => Extraction::found(
            m.as_str().to_ascii_lowercase(),
            remove_span(text, m.start(), m.end()),
        ),
        None => Extraction::missing(text),
    }
}

/// "#12", "INV-0012", "no. 12", or a message that is only a number
pub fn extract_invoice_number(text: &str) -> Extraction<i64> {
    let caps = INVOICE_NUMBER_RE
        .captures(text)
        .or_else(|| BARE_NUMBER_RE.captures(text));
    let Some(caps) = caps else {
        return Extraction::missing(text);
    };
    let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
        return Extraction::missing(text);
    };
    match digits.as_str().parse::<i64>() {
        Ok(number) if number > 0 => {
            Extraction::found(number, remove_span(text, whole.start(), whole.end()))
        }
        _ => Extraction::missing(text),
    }
}

/// Indian GST identification number, upper-cased
pub fn extract_gstin(text: &str) -> Extraction<String> {
    let Some(m) = GSTIN_RE.find(text) else {
        return Extraction::missing(text);
    };
    let mut residual = remove_span(text, m.start(), m.end());
    for marker in ["gstin", "gst"] {
        residual = residual
            .split_whitespace()
            .filter(|w| !w.eq_ignore_ascii_case(marker))
            .collect::<Vec<_>>()
            .join(" ");
    }
    Extraction::found(m.as_str().to_ascii_uppercase(), residual)
}

// ============================================================================
// GST details
// ============================================================================

static GST_RATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:gst|igst|tax)\s*(?:rate\s*)?(?:of|at|@|:|=)?\s*(\d{1,2}(?:\.\d{1,2})?)\s*%|@\s*(\d{1,2}(?:\.\d{1,2})?)\s*%|\b(\d{1,2}(?:\.\d{1,2})?)\s*%\s*(?:gst|igst|tax)\b",
    )
    .unwrap()
});

static NO_GST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:no|without|zero|nil)\s+gst\b|\bgst[\s-]+(?:exempt|free)\b").unwrap()
});

static BARE_RATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,2}(?:\.\d{1,2})?)\s*%?\s*$").unwrap());

static HSN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:hsn|sac)(?:\s*/\s*sac)?(?:\s+code)?\s*(?:[:#-]\s*|is\s+)?(\d{4,8})\b").unwrap()
});

static BARE_HSN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d{4,8})\s*$").unwrap());

static PLACE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:place\s+of\s+supply|pos)\b\s*(?:[:\-]\s*|is\s+)?").unwrap()
});

/// "gst 18%", "@ 5%", "12% gst", or "no gst" for zero. The rate is returned
/// whether or not it is a GST slab; callers decide what to accept.
pub fn extract_gst_rate(text: &str) -> Extraction<Decimal> {
    if let Some(caps) = GST_RATE_RE.captures(text) {
        let digits = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3));
        if let (Some(whole), Some(digits)) = (caps.get(0), digits) {
            if let Ok(rate) = Decimal::from_str_exact(digits.as_str()) {
                return Extraction::found(rate, remove_span(text, whole.start(), whole.end()));
            }
        }
    }
    match NO_GST_RE.find(text) {
        Some(m) => Extraction::found(Decimal::ZERO, remove_span(text, m.start(), m.end())),
        None => Extraction::missing(text),
    }
}

/// Read a reply to "Which GST rate applies?". Only GST slabs are accepted.
pub fn gst_rate_answer(text: &str) -> Option<Decimal> {
    let rate = extract_gst_rate(text).value.or_else(|| {
        let digits = BARE_RATE_RE.captures(text)?.get(1)?;
        Decimal::from_str_exact(digits.as_str()).ok()
    })?;
    is_rate_slab(rate).then_some(rate)
}

/// "hsn 9983", "SAC code: 998314", or a message that is only the code
pub fn extract_hsn_code(text: &str) -> Extraction<String> {
    let caps = HSN_RE.captures(text).or_else(|| BARE_HSN_RE.captures(text));
    match caps.as_ref().and_then(|caps| Some((caps.get(0)?, caps.get(1)?))) {
        Some((whole, digits)) => Extraction::found(
            digits.as_str().to_string(),
            remove_span(text, whole.start(), whole.end()),
        ),
        None => Extraction::missing(text),
    }
}

/// "place of supply Karnataka", "pos: tamil nadu". The state is returned
/// under its canonical name.
pub fn extract_place_of_supply(text: &str) -> Extraction<String> {
    let Some(marker) = PLACE_MARKER_RE.find(text) else {
        return Extraction::missing(text);
    };
    let rest = text.get(marker.end()..).unwrap_or_default();
    let tokens: Vec<regex::Match<'_>> = TOKEN_RE.find_iter(rest).take(4).collect();

    // Longest run of words that names a state
    for count in (1..=tokens.len()).rev() {
        let Some(last) = tokens.get(count - 1) else {
            continue;
        };
        let candidate = rest.get(..last.end()).unwrap_or_default();
        if let Some(state) = state_named(trim_punctuation(candidate)) {
            let end = marker.end() + last.end();
            return Extraction::found(state.name.to_string(), remove_span(text, marker.start(), end));
        }
    }
    Extraction::missing(text)
}

/// Read a reply to "Which state is the place of supply?"
pub fn place_answer(text: &str) -> Option<String> {
    extract_place_of_supply(text)
        .value
        .or_else(|| state_named(trim_punctuation(text.trim())).map(|state| state.name.to_string()))
}
