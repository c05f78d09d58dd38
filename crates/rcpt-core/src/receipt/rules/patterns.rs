//! Regex tables for receipt line classification.
//!
//! The compiled defaults live in statics; classifiers never read them
//! directly but receive an explicit [`PatternTables`] value, so custom
//! tables can be swapped in for tests or other receipt styles.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

const MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";

lazy_static! {
    // Error-screen signatures. Each one is counted at most once, so they
    // must not overlap: one stray token should never count twice.
    pub static ref SIG_STACK_FRAME: Regex = Regex::new(
        r"(?m)^\s*at\s+\S+.*:\d+|\.(?:js|jsx|ts|tsx|java|kt|py):\d+:\d+"
    ).unwrap();

    pub static ref SIG_JS_ERROR: Regex = Regex::new(
        r"\b(?:Type|Reference|Syntax|Range|Eval|URI)Error\b"
    ).unwrap();

    pub static ref SIG_UNDEFINED_ACCESS: Regex = Regex::new(
        r"(?i)\bundefined is not (?:a function|an object)|cannot read propert(?:y|ies) of (?:undefined|null)"
    ).unwrap();

    pub static ref SIG_EXCEPTION: Regex = Regex::new(
        r"(?i)\b\w*exception\b|\b(?:unhandled|uncaught)\s+(?:promise\s+)?rejection"
    ).unwrap();

    pub static ref SIG_TRACEBACK: Regex = Regex::new(
        r"(?i)traceback \(most recent call last\)|\bstack\s?trace\b"
    ).unwrap();

    pub static ref SIG_RUNTIME_NOT_READY: Regex = Regex::new(
        r"(?i)runtime (?:is )?not ready"
    ).unwrap();

    pub static ref SIG_ERROR_ACTIONS: Regex = Regex::new(
        r"(?i)\bdismiss\b.*\breload\b|\breload\s*\(\s*r\s*,\s*r\s*\)"
    ).unwrap();

    pub static ref SIG_INVARIANT: Regex = Regex::new(
        r"(?i)\binvariant violation\b"
    ).unwrap();

    pub static ref SIG_LOG_MARKER: Regex = Regex::new(
        r"(?m)^\s*(?:\[(?:ERROR|WARN|FATAL|DEBUG)\]|(?:ERROR|FATAL|DEBUG)\s*:|[EWID]/[\w.]+\s*\(\s*\d+\s*\))"
    ).unwrap();

    pub static ref SIG_DEV_TOOLING: Regex = Regex::new(
        r"(?i)\b(?:metro bundler|redbox|red box|hermes engine|expo go|bundling failed)\b"
    ).unwrap();

    // Lines that can never be a merchant name
    pub static ref STORE_PURE_TIME: Regex = Regex::new(
        r"(?i)^\d{1,2}:\d{2}(?::\d{2})?\s*(?:am|pm)?$"
    ).unwrap();

    pub static ref STORE_NUMERIC_SYMBOLS: Regex = Regex::new(
        r"^[\d\W_]+$"
    ).unwrap();

    pub static ref STORE_UNKNOWN: Regex = Regex::new(
        r"(?i)^unknown$"
    ).unwrap();

    pub static ref STORE_STATUS_BAR: Regex = Regex::new(
        r"(?i)\b\d{1,3}\s?%|\b(?:battery|charging|loading|error|no service)\b"
    ).unwrap();

    // Date shapes
    pub static ref DATE_NUMERIC: Regex = Regex::new(
        r"\b(\d{1,2})[-/.](\d{1,2})[-/.](\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_TEXTUAL: Regex = Regex::new(&format!(
        r"(?i)\b(?:(?P<m1>{MONTHS})[a-z]*\.?\s+(?P<d1>\d{{1,2}})(?:st|nd|rd|th)?,?|(?P<d2>\d{{1,2}})(?:st|nd|rd|th)?\s+(?P<m2>{MONTHS})[a-z]*\.?,?)\s+(?P<y>\d{{4}})\b"
    )).unwrap();

    pub static ref DATE_ISO: Regex = Regex::new(
        r"\b(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})\b"
    ).unwrap();

    // Totals
    pub static ref TOTAL_LINE: Regex = Regex::new(
        r"(?i)\btotal\b(?:\s+(?:due|amount|sale|paid))?[\s:]*[$€£]?\s*(\d{1,3}(?:[.,]\d{3})+[.,]\d{1,2}|\d+(?:[.,]\d{1,2})?)"
    ).unwrap();

    pub static ref TAX_LINE: Regex = Regex::new(
        r"(?i)\btax\b(?:\s*\d+(?:[.,]\d+)?\s*%)?[\s:]*[$€£]?\s*(\d{1,3}(?:[.,]\d{3})+[.,]\d{1,2}|\d+(?:[.,]\d{1,2})?)"
    ).unwrap();

    pub static ref SUBTOTAL: Regex = Regex::new(
        r"(?i)\bsub\s*-?\s*total\b"
    ).unwrap();

    // Lines that are never items
    pub static ref SKIP_PAYMENT: Regex = Regex::new(
        r"(?i)\b(?:change|cash|card|visa|mastercard|amex|debit|credit|tender(?:ed)?|balance)\b"
    ).unwrap();

    pub static ref SKIP_PHONE: Regex = Regex::new(
        r"(?i)(?:\+?1[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]\d{4}\b|\b(?:tel|phone|ph)\b\.?\s*:?"
    ).unwrap();

    pub static ref SKIP_ADDRESS: Regex = Regex::new(
        r"(?i:^\d+\s+[\w\s.]+\b(?:st|street|ave|avenue|rd|road|blvd|boulevard|dr|drive|ln|lane|way|hwy|highway)\b)|\b[A-Z]{2}\s+\d{5}(?:-\d{4})?\b"
    ).unwrap();

    pub static ref SKIP_GREETING: Regex = Regex::new(
        r"(?i)\b(?:thank(?:s| you)|welcome|come again|have a (?:nice|great|good)|visit us|see you)\b"
    ).unwrap();

    pub static ref SKIP_EMPTYISH: Regex = Regex::new(
        r"^[\W_]*$"
    ).unwrap();

    pub static ref SKIP_KEYWORDS: Regex = Regex::new(
        r"(?i)\b(?:total|tax|receipt|invoice|cashier|register|terminal|trans(?:action)?|auth(?:orization)?|approval|items?\s+sold)\b|(?:store|order)\s*#"
    ).unwrap();

    // Whole-line status bar text only; "Milk 2%" is an item
    pub static ref SKIP_STATUS_BAR: Regex = Regex::new(
        r"(?i)^\s*(?:\d{1,3}\s?%|(?:loading|charging|no service)\W*)\s*$|\bbattery\b.*\d{1,3}\s?%|\d{1,3}\s?%\s*battery\b"
    ).unwrap();

    pub static ref SKIP_DATE_TIME: Regex = Regex::new(
        r"(?i)^\s*\d{1,2}:\d{2}(?::\d{2})?\s*(?:am|pm)?\s*$|\b(?:date|time)\s*:"
    ).unwrap();

    // Item cleanup
    pub static ref QUANTITY_PREFIX: Regex = Regex::new(
        r"(?i)^\s*\d+\s*[x×*](?:\s+|$)"
    ).unwrap();

    pub static ref TRAILING_PRICE: Regex = Regex::new(
        r"\s*[$€£]?\s*(\d{1,3}(?:[.,]\d{3})+[.,]\d{2}|\d+[.,]\d{2})\s*[A-Za-z]?\s*$"
    ).unwrap();

    static ref DEFAULT_TABLES: Arc<PatternTables> = Arc::new(PatternTables::build_default());
}

/// A named error-screen signature.
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: &'static str,
    pub pattern: Regex,
}

impl Signature {
    pub fn new(name: &'static str, pattern: Regex) -> Self {
        Self { name, pattern }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// The three date shapes tried on every line, in order.
#[derive(Debug, Clone)]
pub struct DatePatterns {
    /// `D[-/.]D[-/.]YY(YY)`
    pub numeric: Regex,
    /// `Apr 12, 2024` or `12 April 2024`
    pub textual: Regex,
    /// `YYYY[-/.]M[-/.]D`
    pub iso: Regex,
}

/// Immutable set of compiled patterns used by the detector and classifier.
#[derive(Debug, Clone)]
pub struct PatternTables {
    /// Error-screen signatures, in evaluation order. Also the noise set.
    pub error_signatures: Vec<Signature>,
    /// Lines matching any of these are never a merchant name.
    pub invalid_store_names: Vec<Regex>,
    pub dates: DatePatterns,
    pub total: Regex,
    pub tax: Regex,
    pub subtotal: Regex,
    /// Lines matching any of these are never items.
    pub skip: Vec<Regex>,
    pub quantity_prefix: Regex,
    pub trailing_price: Regex,
}

impl PatternTables {
    /// Shared handle to the built-in English receipt tables.
    pub fn shared_default() -> Arc<PatternTables> {
        Arc::clone(&DEFAULT_TABLES)
    }

    fn build_default() -> Self {
        Self {
            error_signatures: vec![
                Signature::new("stack_frame", SIG_STACK_FRAME.clone()),
                Signature::new("js_error", SIG_JS_ERROR.clone()),
                Signature::new("undefined_access", SIG_UNDEFINED_ACCESS.clone()),
                Signature::new("exception", SIG_EXCEPTION.clone()),
                Signature::new("traceback", SIG_TRACEBACK.clone()),
                Signature::new("runtime_not_ready", SIG_RUNTIME_NOT_READY.clone()),
                Signature::new("error_actions", SIG_ERROR_ACTIONS.clone()),
                Signature::new("invariant", SIG_INVARIANT.clone()),
                Signature::new("log_marker", SIG_LOG_MARKER.clone()),
                Signature::new("dev_tooling", SIG_DEV_TOOLING.clone()),
            ],
            invalid_store_names: vec![
                STORE_PURE_TIME.clone(),
                STORE_NUMERIC_SYMBOLS.clone(),
                STORE_UNKNOWN.clone(),
                STORE_STATUS_BAR.clone(),
            ],
            dates: DatePatterns {
                numeric: DATE_NUMERIC.clone(),
                textual: DATE_TEXTUAL.clone(),
                iso: DATE_ISO.clone(),
            },
            total: TOTAL_LINE.clone(),
            tax: TAX_LINE.clone(),
            subtotal: SUBTOTAL.clone(),
            skip: vec![
                SUBTOTAL.clone(),
                SKIP_PAYMENT.clone(),
                SKIP_PHONE.clone(),
                SKIP_ADDRESS.clone(),
                SKIP_GREETING.clone(),
                SKIP_EMPTYISH.clone(),
                SKIP_KEYWORDS.clone(),
                SKIP_DATE_TIME.clone(),
                SKIP_STATUS_BAR.clone(),
            ],
            quantity_prefix: QUANTITY_PREFIX.clone(),
            trailing_price: TRAILING_PRICE.clone(),
        }
    }

    /// Add an extra error-screen signature, evaluated after the existing ones.
    pub fn with_error_signature(mut self, name: &'static str, pattern: Regex) -> Self {
        self.error_signatures.push(Signature::new(name, pattern));
        self
    }

    /// Add an extra skip pattern.
    pub fn with_skip_pattern(mut self, pattern: Regex) -> Self {
        self.skip.push(pattern);
        self
    }

    pub fn is_noise(&self, line: &str) -> bool {
        self.error_signatures.iter().any(|s| s.is_match(line))
    }

    pub fn is_invalid_store_name(&self, line: &str) -> bool {
        self.invalid_store_names.iter().any(|p| p.is_match(line))
    }

    pub fn is_skippable(&self, line: &str) -> bool {
        self.skip.iter().any(|p| p.is_match(line))
    }
}

impl Default for PatternTables {
    fn default() -> Self {
        Self::build_default()
    }
}
