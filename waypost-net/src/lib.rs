mod http1;

pub use http1::{
    AssembleStatus, DEFAULT_PORT, Header, Limits, ParseError, ParseErrorKind, ParsedRequest,
    RequestAssembler, RequestLine, encode_request,
};
