//! Text transforms over the Prometheus exposition format.
//!
//! `normalize` turns one scraped payload into a timestamped block ready to be
//! buffered. `cleanup` prepares a persisted snapshot for parsing.

/// Stamps every metric line of `payload` with `timestamp_ms`.
///
/// Lines are split on `\n` and trimmed. Empty lines and lines starting with
/// `#` (HELP/TYPE/comments) are dropped. Every other line is emitted as
/// `<trimmed-line> <timestamp_ms>\n`, malformed or not.
pub fn normalize(payload: &[u8], timestamp_ms: i64) -> Vec<u8> {
    let text = String::from_utf8_lossy(payload);
    let suffix = format!(" {timestamp_ms}\n");
    let mut out = Vec::with_capacity(payload.len() + suffix.len() * 16);

    for line in text.split('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        out.extend_from_slice(trimmed.as_bytes());
        out.extend_from_slice(suffix.as_bytes());
    }

    out
}

/// Like [`normalize`], with the timestamp taken from the wall clock once.
pub fn normalize_now(payload: &[u8]) -> Vec<u8> {
    normalize(payload, chrono::Utc::now().timestamp_millis())
}

/// Normalizes CRLF to LF and removes comment lines.
///
/// Unlike [`normalize`], blank lines survive and nothing is trimmed or
/// stamped. Every kept line is newline-terminated in the output, and a
/// trailing newline does not produce an extra empty line, so applying
/// `cleanup` twice yields the same bytes as applying it once.
pub fn cleanup(payload: &[u8]) -> Vec<u8> {
    let mut unix = Vec::with_capacity(payload.len());
    for (i, &b) in payload.iter().enumerate() {
        if b == b'\r' && payload.get(i + 1) == Some(&b'\n') {
            continue;
        }
        unix.push(b);
    }

    if unix.is_empty() {
        return unix;
    }

    let body = unix.strip_suffix(b"\n").unwrap_or(&unix);
    let mut out = Vec::with_capacity(unix.len() + 1);
    for line in body.split(|&b| b == b'\n') {
        if line.first() == Some(&b'#') {
            continue;
        }
        out.extend_from_slice(line);
        out.push(b'\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRAPE: &str = "# HELP go_goroutines Number of goroutines.\n\
# TYPE go_goroutines gauge\n\
go_goroutines 42\n\
\n\
   http_requests_total{code=\"200\"} 1027   \n\
# EOF\n";

    #[test]
    fn test_normalize_stamps_metric_lines() {
        let out = normalize(SCRAPE.as_bytes(), 1_700_000_000_123);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "go_goroutines 42 1700000000123\n\
http_requests_total{code=\"200\"} 1027 1700000000123\n"
        );
    }

    #[test]
    fn test_normalize_only_comments_is_empty() {
        assert!(normalize(b"# HELP a\n# TYPE a gauge\n\n   \n", 1).is_empty());
        assert!(normalize(b"", 1).is_empty());
    }

    #[test]
    fn test_normalize_keeps_malformed_lines() {
        let out = normalize(b"this is not a metric", 5);
        assert_eq!(out, b"this is not a metric 5\n");
    }

    #[test]
    fn test_normalize_shares_one_timestamp() {
        let out = normalize_now(b"a 1\nb 2\nc 3\n");
        let text = String::from_utf8(out).unwrap();
        let stamps: Vec<&str> = text
            .lines()
            .map(|l| l.rsplit(' ').next().unwrap())
            .collect();
        assert_eq!(stamps.len(), 3);
        assert!(stamps.iter().all(|s| *s == stamps[0]));
    }

    #[test]
    fn test_normalize_handles_crlf_payloads() {
        let out = normalize(b"a 1\r\nb 2\r\n", 9);
        assert_eq!(out, b"a 1 9\nb 2 9\n");
    }

    #[test]
    fn test_cleanup_removes_comments_keeps_blanks() {
        let out = cleanup(b"# HELP x\r\nx 1 10\r\n\r\ny 2 10\n");
        assert_eq!(out, b"x 1 10\n\ny 2 10\n");
    }

    #[test]
    fn test_cleanup_only_drops_leading_hash() {
        let out = cleanup(b"  # indented\nlabel{v=\"#\"} 1 2");
        assert_eq!(out, b"  # indented\nlabel{v=\"#\"} 1 2\n");
    }

    #[test]
    fn test_cleanup_keeps_lone_carriage_return() {
        assert_eq!(cleanup(b"a\rb 1 2\n"), b"a\rb 1 2\n");
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let inputs: [&[u8]; 4] = [
            b"# c\r\na 1 2\r\n\r\n",
            b"a 1 2\n\nb 3 4\n\n",
            b"",
            b"\n\n# x\n",
        ];
        for input in inputs {
            let once = cleanup(input);
            assert_eq!(cleanup(&once), once);
        }
    }
}
