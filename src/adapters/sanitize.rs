//! Log sanitization for PII and secrets.
//!
//! Formatted log lines pass through `SanitizingMakeWriter`, which redacts:
//! - Phone numbers (patient and doctor keys)
//! - Email addresses
//! - UUIDs, session tokens and other long hex strings
//! - Argon2 PHC credential hashes
//! - `password=...` style secrets
//!
//! Structured logging that never formats these values is the primary
//! protection; this writer is the fallback.
//!
//! Input is capped at `HEPASCREEN_SANITIZE_MAX_BYTES` (default 16 KiB) per
//! call.

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static PII_PATTERNS: OnceLock<PiiPatterns> = OnceLock::new();

const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

struct PiiPattern {
    regex: Regex,
    replacement: &'static str,
}

struct PiiPatterns {
    set: RegexSet,
    patterns: Vec<PiiPattern>,
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }

    let mut end = max_bytes.min(input.len());
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn max_sanitize_bytes() -> usize {
    std::env::var("HEPASCREEN_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn get_patterns() -> &'static PiiPatterns {
    PII_PATTERNS.get_or_init(|| {
        // Order matters: hashes and secrets before the generic hex/phone rules.
        let rules: Vec<(&'static str, &'static str)> = vec![
            (r"\$argon2(?:id|i|d)\$[A-Za-z0-9$=,+/.]+", "[REDACTED-HASH]"),
            (
                r"(?i)\b(?:password|passwd|pwd|secret|token|seed)\b\s*[:=]\s*\S+",
                "[REDACTED-SECRET]",
            ),
            (
                r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b",
                "[REDACTED-UUID]",
            ),
            (r"\b[0-9a-fA-F]{32,}\b", "[REDACTED-TOKEN]"),
            (
                r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
            ),
            // International and local formats, e.g. +91 98765 43210, (555) 010-0100, 555-0100
            (
                r"(?:\+\d{1,3}[-.\s]?)?(?:\(\d{2,4}\)[-.\s]?)?\b\d{3,5}[-.\s]?\d{3,5}(?:[-.\s]?\d{2,5})?\b",
                "[REDACTED-PHONE]",
            ),
        ];

        let set = RegexSet::new(rules.iter().map(|(p, _)| *p)).expect("Valid regex set");
        let patterns = rules
            .into_iter()
            .map(|(pattern, replacement)| PiiPattern {
                regex: Regex::new(pattern).expect("Valid regex"),
                replacement,
            })
            .collect();

        PiiPatterns { set, patterns }
    })
}

/// Sanitize a string by replacing PII patterns.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = get_patterns();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    if patterns.set.is_match(prefix) {
        for pattern in &patterns.patterns {
            if pattern.regex.is_match(&result) {
                result = pattern
                    .regex
                    .replace_all(&result, pattern.replacement)
                    .to_string();
            }
        }
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// A `tracing_subscriber` writer wrapper that sanitizes formatted log output
/// before it reaches the underlying sink.
#[derive(Debug)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<M> Clone for SanitizingMakeWriter<M>
where
    M: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Line-buffering writer produced by `SanitizingMakeWriter`.
pub struct SanitizingWriter<W> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W> SanitizingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }
}

impl<W> SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.drain(..=pos).collect::<Vec<u8>>();
            let sanitized = sanitize(&String::from_utf8_lossy(&line));
            self.inner.write_all(sanitized.as_bytes())?;
        }
        Ok(())
    }
}

impl<W> std::io::Write for SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A single line with no newline must not buffer without bound.
        let hard_cap = max_sanitize_bytes().saturating_mul(2);
        if self.buffer.len() > hard_cap {
            let sanitized = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(sanitized.as_bytes())?;
            self.inner.write_all(b"\n")?;
            self.buffer.clear();
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;

        if !self.buffer.is_empty() {
            let sanitized = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(sanitized.as_bytes())?;
            self.buffer.clear();
        }

        self.inner.flush()
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sanitize_phone() {
        for input in ["login for 555-0100", "call +91 98765 43210", "(555) 010-0100"] {
            let sanitized = sanitize(input);
            assert!(sanitized.contains("[REDACTED-PHONE]"), "{input} -> {sanitized}");
        }
        assert!(!sanitize("login for 555-0100").contains("0100"));
    }

    #[test]
    fn test_sanitize_session_token() {
        let token = "a".repeat(64);
        let sanitized = sanitize(&format!("session {token} established"));
        assert!(sanitized.contains("[REDACTED-TOKEN]"));
        assert!(!sanitized.contains(&token));
    }

    #[test]
    fn test_sanitize_argon2_hash() {
        let input = "stored $argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNo";
        let sanitized = sanitize(input);
        assert!(sanitized.contains("[REDACTED-HASH]"));
        assert!(!sanitized.contains("argon2id"));
    }

    #[test]
    fn test_sanitize_password_field() {
        let sanitized = sanitize("form password=pw123 name=Alice");
        assert!(sanitized.contains("[REDACTED-SECRET]"));
        assert!(!sanitized.contains("pw123"));
    }

    #[test]
    fn test_sanitize_email() {
        assert!(sanitize("Contact: patient@hospital.com").contains("[REDACTED-EMAIL]"));
    }

    #[test]
    fn test_sanitize_truncates_large_inputs() {
        let sanitized = sanitize_with_limit("prefix 0123456789abcdef suffix text", 16);
        assert!(sanitized.ends_with("[TRUNCATED]"));
    }

    #[test]
    fn test_writer_sanitizes_each_line() {
        let mut out = Vec::new();
        {
            let mut writer = SanitizingWriter::new(&mut out);
            writer
                .write_all(b"first 555-0100\nsecond line")
                .expect("Should write");
            writer.flush().expect("Should flush");
        }
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text, "first [REDACTED-PHONE]\nsecond line");
    }
}
