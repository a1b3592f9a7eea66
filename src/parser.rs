// Slice-based STOMP frame scanning (structure only; the codec applies the
// version tables and escaping on top of this).

use crate::spec::{self, Version};

/// Raw headers as byte pairs, before unescaping and UTF-8 checks.
pub(crate) type RawHeaders = Vec<(Vec<u8>, Vec<u8>)>;

/// Outcome of scanning the start of `input` for one wire item.
pub(crate) enum Scan {
    /// A complete frame and the number of bytes it occupied.
    Frame {
        command: Vec<u8>,
        headers: RawHeaders,
        body: Vec<u8>,
        consumed: usize,
    },
    /// A single LF or CR LF before any command byte.
    Heartbeat { consumed: usize },
    /// More bytes are required.
    Partial,
}

/// Structural scan failure, with the offset relative to the start of
/// `input`.
pub(crate) struct ScanError {
    pub offset: usize,
    pub message: String,
}

fn err<T>(offset: usize, message: impl Into<String>) -> Result<T, ScanError> {
    Err(ScanError {
        offset,
        message: message.into(),
    })
}

/// Strip one trailing CR from a line, tolerating CR LF line endings.
fn strip_cr(line: &[u8]) -> &[u8] {
    match line.split_last() {
        Some((&spec::CARRIAGE_RETURN, rest)) => rest,
        _ => line,
    }
}

/// First `content-length` value in the raw header list, if any.
fn content_length(headers: &RawHeaders) -> Result<Option<usize>, (usize, String)> {
    for (name, value) in headers {
        if name.eq_ignore_ascii_case(spec::header::CONTENT_LENGTH.as_bytes()) {
            let text = std::str::from_utf8(value).map_err(|_| {
                (0, "content-length is not valid utf8".to_string())
            })?;
            return match text.trim().parse::<usize>() {
                Ok(n) => Ok(Some(n)),
                Err(_) => Err((0, format!("invalid content-length [{}]", text))),
            };
        }
    }
    Ok(None)
}

/// Scan the start of `input` for the next heart-beat or complete frame.
///
/// Returns `Scan::Partial` whenever the item is not yet complete, so the
/// same bytes delivered in any chunking scan identically once enough have
/// arrived.
pub(crate) fn scan(input: &[u8]) -> Result<Scan, ScanError> {
    let len = input.len();
    if len == 0 {
        return Ok(Scan::Partial);
    }

    // Inter-frame newlines: LF or CR LF.
    if input[0] == spec::LINE_DELIMITER {
        return Ok(Scan::Heartbeat { consumed: 1 });
    }
    if input[0] == spec::CARRIAGE_RETURN {
        if len < 2 {
            return Ok(Scan::Partial);
        }
        if input[1] == spec::LINE_DELIMITER {
            return Ok(Scan::Heartbeat { consumed: 2 });
        }
        return err(0, "expected LF after CR between frames");
    }

    // Command line.
    let mut pos = 0usize;
    let command = match input.iter().position(|&b| b == spec::LINE_DELIMITER) {
        Some(end) => {
            let command = strip_cr(&input[..end]).to_vec();
            pos = end + 1;
            command
        }
        None => return Ok(Scan::Partial),
    };
    if command.is_empty() {
        return err(0, "empty command line");
    }

    // Header lines up to the blank separator line.
    let mut headers: RawHeaders = Vec::new();
    loop {
        if pos >= len {
            return Ok(Scan::Partial);
        }
        let line_start = pos;
        let line_end = match input[pos..].iter().position(|&b| b == spec::LINE_DELIMITER) {
            Some(rel) => pos + rel,
            None => return Ok(Scan::Partial),
        };
        let line = strip_cr(&input[line_start..line_end]);
        pos = line_end + 1;
        if line.is_empty() {
            break;
        }
        match line.iter().position(|&b| b == spec::HEADER_SEPARATOR) {
            Some(colon) => {
                headers.push((line[..colon].to_vec(), line[colon + 1..].to_vec()));
            }
            None => {
                return err(
                    line_start,
                    format!(
                        "no separator in header line [{}]",
                        String::from_utf8_lossy(line)
                    ),
                );
            }
        }
    }

    // Body: exact content-length when declared, up to the first NUL
    // otherwise.
    match content_length(&headers) {
        Ok(Some(length)) => {
            if pos + length + 1 > len {
                return Ok(Scan::Partial);
            }
            if input[pos + length] != spec::FRAME_DELIMITER {
                return err(
                    pos + length,
                    "expected frame delimiter after content-length body",
                );
            }
            Ok(Scan::Frame {
                command,
                headers,
                body: input[pos..pos + length].to_vec(),
                consumed: pos + length + 1,
            })
        }
        Ok(None) => match input[pos..].iter().position(|&b| b == spec::FRAME_DELIMITER) {
            Some(rel) => Ok(Scan::Frame {
                command,
                headers,
                body: input[pos..pos + rel].to_vec(),
                consumed: pos + rel + 1,
            }),
            None => Ok(Scan::Partial),
        },
        Err((_, message)) => err(pos, message),
    }
}

/// Apply the version's escape table to a header token for emission.
///
/// Identity under 1.0, which has no escape table.
pub(crate) fn escape(version: Version, text: &str) -> String {
    let table = spec::escaped_characters(version);
    if table.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match table
            .iter()
            .find(|(c, _)| ch.is_ascii() && *c == ch as u8)
        {
            Some((_, letter)) => {
                out.push(spec::ESCAPE_CHARACTER as char);
                out.push(*letter as char);
            }
            None => out.push(ch),
        }
    }
    out
}

/// Decode the version's escape sequences in a raw header token.
///
/// Under 1.0 the bytes pass through untouched. Under 1.1 a backslash
/// followed by anything outside the escape table is an error.
pub(crate) fn unescape(version: Version, raw: &[u8]) -> Result<Vec<u8>, String> {
    let table = spec::escaped_characters(version);
    if table.is_empty() {
        return Ok(raw.to_vec());
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.iter();
    while let Some(&b) = bytes.next() {
        if b != spec::ESCAPE_CHARACTER {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(&letter) => match table.iter().find(|(_, l)| *l == letter) {
                Some((ch, _)) => out.push(*ch),
                None => {
                    return Err(format!(
                        "undefined escape sequence [\\{}]",
                        letter as char
                    ))
                }
            },
            None => return Err("dangling escape character".to_string()),
        }
    }
    Ok(out)
}
