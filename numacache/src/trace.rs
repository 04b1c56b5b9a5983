use lazy_static::lazy_static;
use regex::Regex;
use crate::error::CacheError;
use crate::system::AccessKind;

lazy_static! {
    // An optional "0x<ip>:" column as pinatrace writes it, the access kind, the address, and an
    // optional thread id
    static ref RECORD: Regex = Regex::new(
        r"^\s*(?:0[xX][0-9a-fA-F]+:\s*)?([RW])\s+(?:0[xX])?([0-9a-fA-F]+)(?:\s+([0-9]+))?\s*$"
    )
    .expect("trace record pattern is valid");
}

/// One memory access from a trace
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TraceRecord {
    pub kind: AccessKind,
    pub address: u64,
    /// Thread id, 0 when the trace doesn't record one
    pub tid: usize,
}

/// Parses one line of a pinatrace-style trace
///
/// Blank lines and comments, such as the `#eof` marker pinatrace writes, produce `None`
///
/// # Arguments
///
/// * `line`: The line, without its terminator
/// * `line_number`: The 1-based line number, used for error reporting
///
/// returns: Result<Option<TraceRecord>, CacheError>
///
/// # Examples
///
/// ```
/// use numacache::system::AccessKind;
/// use numacache::trace::parse_trace_line;
/// let record = parse_trace_line("0x400523: W 0x7ffd1000", 1).unwrap().unwrap();
/// assert_eq!(record.kind, AccessKind::Write);
/// assert_eq!(record.address, 0x7ffd1000);
/// assert_eq!(record.tid, 0);
/// assert!(parse_trace_line("#eof", 2).unwrap().is_none());
/// ```
pub fn parse_trace_line(line: &str, line_number: u64) -> Result<Option<TraceRecord>, CacheError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let malformed = || CacheError::MalformedTrace {
        line: line_number,
        content: line.to_string(),
    };
    let captures = RECORD.captures(trimmed).ok_or_else(malformed)?;
    let kind = match &captures[1] {
        "W" => AccessKind::Write,
        _ => AccessKind::Read,
    };
    // The pattern only admits hex digits, so the only failure is overflow
    let address = u64::from_str_radix(&captures[2], 16).map_err(|_| malformed())?;
    let tid = match captures.get(3) {
        Some(tid) => tid.as_str().parse::<usize>().map_err(|_| malformed())?,
        None => 0,
    };
    Ok(Some(TraceRecord { kind, address, tid }))
}
