use reqwest::StatusCode;

/// Boxed error produced by a [`Transport`](crate::Transport) or an external authenticator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every failure a spreadsheet operation can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request had no URL; nothing was sent.
    #[error("Invalid request")]
    MissingUrl,

    /// The transport failed before producing a response (connection refused, timeout, ...).
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The transport completed without a response object.
    #[error("no response")]
    NoResponse,

    /// The service answered with an error status.
    #[error("{}", server_summary(*code))]
    Server { code: u16, body: String },

    /// The service answered with something other than an Atom feed, typically an HTML error page.
    #[error("{body}")]
    UnexpectedContentType {
        content_type: Option<String>,
        body: String,
    },

    /// The response body is not well-formed XML.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// The XML is well-formed but does not have the shape of the expected feed.
    #[error("Error Reading Spreadsheet")]
    MalformedFeed,

    /// Invalid or incomplete options passed to [`Spreadsheet::create`](crate::Spreadsheet::create).
    #[error("{0}")]
    Config(String),

    /// Obtaining an access token failed.
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl Error {
    /// HTTP status carried by a [`Error::Server`] failure.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

fn server_summary(code: u16) -> String {
    let reason = StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status");
    format!("HTTP error {} ({})", code, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_message_names_status() {
        let err = Error::Server {
            code: 500,
            body: "Something broke.".into(),
        };
        assert_eq!(err.to_string(), "HTTP error 500 (Internal Server Error)");
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn test_unknown_status_still_formats() {
        let err = Error::Server {
            code: 599,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "HTTP error 599 (Unknown Status)");
    }

    #[test]
    fn test_literal_messages() {
        assert_eq!(Error::MissingUrl.to_string(), "Invalid request");
        assert_eq!(Error::NoResponse.to_string(), "no response");
        assert_eq!(Error::MalformedFeed.to_string(), "Error Reading Spreadsheet");
        let err = Error::UnexpectedContentType {
            content_type: Some("text/html".into()),
            body: "<!DOCTYPE html>".into(),
        };
        assert_eq!(err.to_string(), "<!DOCTYPE html>");
    }
}
