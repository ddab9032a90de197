use super::types::{
    DEFAULT_PORT, Header, Limits, ParseError, ParseErrorKind, ParsedRequest, RequestLine,
};

const CRLF: &str = "\r\n";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const ABSOLUTE_PREFIX: &str = "http://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleStatus {
    NeedMore,
    Complete { request: ParsedRequest },
    Error { error: ParseError },
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Header,
    Body {
        request: ParsedRequest,
        body: Vec<u8>,
    },
}

/// Builds one request out of an arbitrary sequence of reads.
///
/// The header is collected into a buffer bounded by
/// [`Limits::max_header_bytes`]; anything following the header terminator is
/// treated as body. Once a request completes the assembler starts over, so
/// bytes past the declared body are dropped.
#[derive(Debug, Default)]
pub struct RequestAssembler {
    buffer: Vec<u8>,
    scanned: usize,
    limits: Limits,
    phase: Phase,
}

impl RequestAssembler {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            limits,
            phase: Phase::Header,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> AssembleStatus {
        match self.phase {
            Phase::Header => self.push_header(bytes),
            Phase::Body { .. } => self.push_body(bytes),
        }
    }

    /// The error to report when the byte source ends before completion.
    pub fn finish(&self) -> ParseError {
        match &self.phase {
            Phase::Header => ParseError::new(ParseErrorKind::IncompleteHeader, self.buffer.len()),
            Phase::Body { body, .. } => ParseError::new(ParseErrorKind::IncompleteBody, body.len()),
        }
    }

    pub fn in_body(&self) -> bool {
        matches!(self.phase, Phase::Body { .. })
    }

    /// How many bytes the next read may usefully deliver: the room left in
    /// the header buffer, or the body bytes still missing.
    pub fn remaining(&self) -> usize {
        match &self.phase {
            Phase::Header => self.limits.max_header_bytes.saturating_sub(self.buffer.len()),
            Phase::Body { request, body } => request.content_length - body.len(),
        }
    }

    fn push_header(&mut self, bytes: &[u8]) -> AssembleStatus {
        let room = self.remaining();
        let (fits, overflow) = bytes.split_at(bytes.len().min(room));
        self.buffer.extend_from_slice(fits);

        // the terminator may straddle the previous read
        let start = self.scanned.saturating_sub(HEADER_TERMINATOR.len() - 1);
        let Some(index) = twoway::find_bytes(&self.buffer[start..], HEADER_TERMINATOR) else {
            self.scanned = self.buffer.len();
            if self.buffer.len() >= self.limits.max_header_bytes {
                let error = ParseError::new(ParseErrorKind::IncompleteHeader, self.buffer.len());
                self.reset();
                return AssembleStatus::Error { error };
            }
            return AssembleStatus::NeedMore;
        };
        let headers_end = start + index;

        let request = match parse_head(&self.buffer[..headers_end]) {
            Ok(request) => request,
            Err(error) => {
                self.reset();
                return AssembleStatus::Error { error };
            }
        };

        let body_start = headers_end + HEADER_TERMINATOR.len();
        if let Some(max) = self.limits.max_body_bytes {
            if request.content_length > max {
                self.reset();
                return AssembleStatus::Error {
                    error: ParseError::new(ParseErrorKind::BodyTooLarge, body_start),
                };
            }
        }

        if request.content_length == 0 {
            self.reset();
            return AssembleStatus::Complete { request };
        }

        let mut prefix = self.buffer.split_off(body_start);
        prefix.extend_from_slice(overflow);
        self.reset();
        self.phase = Phase::Body {
            request,
            body: Vec::new(),
        };
        self.push_body(&prefix)
    }

    fn push_body(&mut self, bytes: &[u8]) -> AssembleStatus {
        let Phase::Body { request, body } = &mut self.phase else {
            return AssembleStatus::NeedMore;
        };

        let missing = request.content_length - body.len();
        body.extend_from_slice(&bytes[..bytes.len().min(missing)]);
        if body.len() < request.content_length {
            return AssembleStatus::NeedMore;
        }

        match std::mem::take(&mut self.phase) {
            Phase::Body { mut request, body } => {
                request.body = Some(body);
                AssembleStatus::Complete { request }
            }
            Phase::Header => AssembleStatus::NeedMore,
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.phase = Phase::Header;
    }
}

fn parse_head(bytes: &[u8]) -> Result<ParsedRequest, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|err| {
        ParseError::new(ParseErrorKind::MalformedRequest, err.valid_up_to())
    })?;

    let mut lines = text.split(CRLF);
    let first = lines.next().unwrap_or_default();
    let line = parse_request_line(first)?;

    let mut headers = Vec::new();
    let mut host = None;
    let mut content_length = 0;
    let mut offset = first.len() + CRLF.len();

    for raw in lines {
        let line_offset = offset;
        offset += raw.len() + CRLF.len();

        let Some(header) = Header::parse(raw) else {
            continue;
        };
        if header.is("connection") || header.is("proxy-connection") {
            continue;
        }
        if header.is("content-length") {
            content_length = header.value.trim().parse::<usize>().map_err(|_| {
                ParseError::new(ParseErrorKind::MalformedRequest, line_offset)
            })?;
        } else if header.is("host") {
            let value = header.value.trim();
            host = (!value.is_empty()).then(|| value.to_string());
        }
        headers.push(header);
    }
    headers.push(Header::new("Connection", "close"));

    let mut request = ParsedRequest {
        line,
        headers,
        host,
        port: DEFAULT_PORT,
        content_length,
        body: None,
    };
    rewrite_absolute_target(&mut request);
    split_host_port(&mut request);
    Ok(request)
}

/// Runs of spaces separate the tokens; a leading space counts as an empty
/// first token.
fn parse_request_line(line: &str) -> Result<RequestLine, ParseError> {
    if line.starts_with(' ') {
        return Err(ParseError::new(ParseErrorKind::MalformedRequest, 0));
    }
    let parts: Vec<&str> = line.split(' ').filter(|part| !part.is_empty()).collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(ParseError::new(ParseErrorKind::MalformedRequest, 0));
    };

    Ok(RequestLine {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
    })
}

/// `http://host[:port]/path` becomes `/path`; the authority fills in a
/// missing `Host`. A target with no path after the authority is left alone.
fn rewrite_absolute_target(request: &mut ParsedRequest) {
    let target = &request.line.target;
    if !target.starts_with(ABSOLUTE_PREFIX) {
        return;
    }
    let authority_start = ABSOLUTE_PREFIX.len();
    let Some(slash) = target[authority_start..]
        .find('/')
        .map(|index| authority_start + index)
    else {
        return;
    };
    if slash == authority_start {
        return;
    }

    if request.host.is_none() {
        let authority = target[authority_start..slash].to_string();
        request.headers.push(Header::new("Host", authority.as_str()));
        request.host = Some(authority);
    }
    request.line.target = target[slash..].to_string();
}

fn split_host_port(request: &mut ParsedRequest) {
    let Some(host) = request.host.as_deref() else {
        return;
    };
    let parts: Vec<&str> = host.split(':').collect();
    let [name, port] = parts.as_slice() else {
        return;
    };

    if let Ok(port) = port.parse::<u16>() {
        request.port = port;
    }
    request.host = Some(name.to_string());
}
