//! Response status codes
//! ([RFC7252 §5.9](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9))
//! and the mapping from handler errors onto them.

use lilypad_msg::Code;

use crate::server::HandlerError;

/// 2.01 Created
pub const CREATED: Code = Code::new(2, 1);
/// 2.02 Deleted
pub const DELETED: Code = Code::new(2, 2);
/// 2.03 Valid
pub const VALID: Code = Code::new(2, 3);
/// 2.04 Changed
pub const CHANGED: Code = Code::new(2, 4);
/// 2.05 Content
pub const CONTENT: Code = Code::new(2, 5);
/// 2.31 Continue (RFC 7959)
pub const CONTINUE: Code = Code::new(2, 31);

/// 4.00 Bad Request
pub const BAD_REQUEST: Code = Code::new(4, 0);
/// 4.01 Unauthorized
pub const UNAUTHORIZED: Code = Code::new(4, 1);
/// 4.02 Bad Option
pub const BAD_OPTION: Code = Code::new(4, 2);
/// 4.03 Forbidden
pub const FORBIDDEN: Code = Code::new(4, 3);
/// 4.04 Not Found
pub const NOT_FOUND: Code = Code::new(4, 4);
/// 4.05 Method Not Allowed
pub const METHOD_NOT_ALLOWED: Code = Code::new(4, 5);
/// 4.06 Not Acceptable
pub const NOT_ACCEPTABLE: Code = Code::new(4, 6);
/// 4.08 Request Entity Incomplete (RFC 7959)
pub const REQUEST_ENTITY_INCOMPLETE: Code = Code::new(4, 8);
/// 4.09 Conflict
pub const CONFLICT: Code = Code::new(4, 9);
/// 4.12 Precondition Failed
pub const PRECONDITION_FAILED: Code = Code::new(4, 12);
/// 4.13 Request Entity Too Large
pub const REQUEST_ENTITY_TOO_LARGE: Code = Code::new(4, 13);
/// 4.15 Unsupported Content-Format
pub const UNSUPPORTED_CONTENT_FORMAT: Code = Code::new(4, 15);
/// 4.29 Too Many Requests (RFC 8516)
pub const TOO_MANY_REQUESTS: Code = Code::new(4, 29);

/// 5.00 Internal Server Error
pub const INTERNAL_SERVER_ERROR: Code = Code::new(5, 0);
/// 5.01 Not Implemented
pub const NOT_IMPLEMENTED: Code = Code::new(5, 1);
/// 5.02 Bad Gateway
pub const BAD_GATEWAY: Code = Code::new(5, 2);
/// 5.03 Service Unavailable
pub const SERVICE_UNAVAILABLE: Code = Code::new(5, 3);
/// 5.04 Gateway Timeout
pub const GATEWAY_TIMEOUT: Code = Code::new(5, 4);
/// 5.05 Proxying Not Supported
pub const PROXYING_NOT_SUPPORTED: Code = Code::new(5, 5);

/// The human-readable phrase for a status, for logs.
pub fn phrase(code: Code) -> &'static str {
  match (code.class, code.detail) {
    | (2, 1) => "Created",
    | (2, 2) => "Deleted",
    | (2, 3) => "Valid",
    | (2, 4) => "Changed",
    | (2, 5) => "Content",
    | (2, 31) => "Continue",
    | (4, 0) => "Bad Request",
    | (4, 1) => "Unauthorized",
    | (4, 2) => "Bad Option",
    | (4, 3) => "Forbidden",
    | (4, 4) => "Not Found",
    | (4, 5) => "Method Not Allowed",
    | (4, 6) => "Not Acceptable",
    | (4, 8) => "Request Entity Incomplete",
    | (4, 9) => "Conflict",
    | (4, 12) => "Precondition Failed",
    | (4, 13) => "Request Entity Too Large",
    | (4, 15) => "Unsupported Content-Format",
    | (4, 29) => "Too Many Requests",
    | (5, 0) => "Internal Server Error",
    | (5, 1) => "Not Implemented",
    | (5, 2) => "Bad Gateway",
    | (5, 3) => "Service Unavailable",
    | (5, 4) => "Gateway Timeout",
    | (5, 5) => "Proxying Not Supported",
    | _ => "?",
  }
}

/// The status sent when a handler fails with an error instead of a
/// status of its own.
pub fn for_handler_error(error: HandlerError) -> Code {
  match error {
    | HandlerError::NotFound => NOT_FOUND,
    | HandlerError::PermissionDenied => FORBIDDEN,
    | HandlerError::InvalidInput => BAD_REQUEST,
    | HandlerError::Other => INTERNAL_SERVER_ERROR,
  }
}
