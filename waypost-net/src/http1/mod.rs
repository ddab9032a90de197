mod encoder;
mod parser;
mod types;

pub use encoder::encode_request;
pub use parser::{AssembleStatus, RequestAssembler};
pub use types::{
    DEFAULT_PORT, Header, Limits, ParseError, ParseErrorKind, ParsedRequest, RequestLine,
};
