use crate::StatusCode;
use std::io;
use thiserror::Error;

/// Everything that can go wrong between accepting a connection and
/// handing its [`Context`](crate::Context) to the consumer.
///
/// Framing failures ([`is_framing`](ErrorKind::is_framing)) end the
/// connection silently. Parsing failures are answered with a canned
/// client error before the connection is closed.
#[derive(Debug, Error, PartialEq)]
pub enum ErrorKind {
    #[error("malformed endpoint `{0}`")]
    MalformedEndpoint(String),

    #[error("incomplete request header")]
    IncompleteRequest,
    #[error("request header block exceeds {0} bytes")]
    HeaderTooLarge(usize),

    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("unsupported method `{0}`")]
    UnsupportedMethod(String),
    #[error("malformed value for header `{name}`: `{value}`")]
    MalformedHeaderValue { name: String, value: String },

    #[error("body length mismatch: expected {expected}, got {available}")]
    BodyMismatch { expected: u64, available: u64 },

    #[error("operation cancelled by shutdown")]
    Cancelled,
    #[error("i/o error: {0}")]
    Io(IoError),
}

macro_rules! http_errors {
    ($($name:ident: $status:ident, $status_line:literal, $len:literal => $json:literal; )*) => {
        /// Status code of the response sent for this error.
        pub const fn status(&self) -> StatusCode {
            match self { $(
                Self::$name { .. } => StatusCode::$status,
            )* }
        }

        pub(crate) const fn as_http(&self, json: bool) -> &'static [u8] {
            match (json, self) { $(
                (true, Self::$name { .. }) => concat!(
                    "HTTP/1.1 ", $status_line, "\r\n",
                    "connection: close\r\n",
                    "content-length: ", $len, "\r\n",
                    "content-type: application/json\r\n",
                    "\r\n",
                    $json
                ),
                (false, Self::$name { .. }) => concat!(
                    "HTTP/1.1 ", $status_line, "\r\n",
                    "connection: close\r\n",
                    "content-length: 0\r\n\r\n",
                ),
            )* }.as_bytes()
        }
    };
}

impl ErrorKind {
    http_errors! {
        MalformedEndpoint: BadRequest, "400 Bad Request", "65"
            => r#"{"error":"Malformed remote endpoint","code":"MALFORMED_ENDPOINT"}"#;

        IncompleteRequest: RequestTimeout, "408 Request Timeout", "65"
            => r#"{"error":"Incomplete request header","code":"INCOMPLETE_REQUEST"}"#;
        HeaderTooLarge: RequestHeaderFieldsTooLarge, "431 Request Header Fields Too Large", "68"
            => r#"{"error":"Request header block too large","code":"HEADER_TOO_LARGE"}"#;

        MalformedRequestLine: BadRequest, "400 Bad Request", "66"
            => r#"{"error":"Malformed request line","code":"MALFORMED_REQUEST_LINE"}"#;
        UnsupportedMethod: BadRequest, "400 Bad Request", "63"
            => r#"{"error":"Unsupported HTTP method","code":"UNSUPPORTED_METHOD"}"#;
        MalformedHeaderValue: BadRequest, "400 Bad Request", "66"
            => r#"{"error":"Malformed header value","code":"MALFORMED_HEADER_VALUE"}"#;

        BodyMismatch: BadRequest, "400 Bad Request", "55"
            => r#"{"error":"Body length mismatch","code":"BODY_MISMATCH"}"#;

        Cancelled: ServiceUnavailable, "503 Service Unavailable", "54"
            => r#"{"error":"Server is shutting down","code":"CANCELLED"}"#;
        Io: ServiceUnavailable, "503 Service Unavailable", "48"
            => r#"{"error":"I/O error occurred","code":"IO_ERROR"}"#;
    }

    /// `true` for failures that happen while the header block is still being
    /// read off the socket. No response is ever sent for these.
    pub const fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::IncompleteRequest | Self::HeaderTooLarge(_) | Self::Cancelled | Self::Io(_)
        )
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}
