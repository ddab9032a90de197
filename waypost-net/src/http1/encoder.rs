use super::types::ParsedRequest;

const CRLF: &[u8] = b"\r\n";

/// Serializes a request in origin form: request line, every retained header
/// line as received, a blank line, then the body.
pub fn encode_request(request: &ParsedRequest) -> Vec<u8> {
    let line = &request.line;
    let mut bytes = Vec::with_capacity(256 + request.body().len());
    bytes.extend_from_slice(format!("{} {} {}", line.method, line.target, line.version).as_bytes());
    bytes.extend_from_slice(CRLF);
    for header in &request.headers {
        bytes.extend_from_slice(header.raw.as_bytes());
        bytes.extend_from_slice(CRLF);
    }
    bytes.extend_from_slice(CRLF);
    bytes.extend_from_slice(request.body());
    bytes
}
