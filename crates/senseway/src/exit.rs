use std::fmt;
use std::io;

use senseway_session::SessionError;
use senseway_transport::TransportError;

// Exit codes follow sysexits-style conventions.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(err.kind()), format!("{context}: {err}"))
}

fn io_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            DATA_INVALID
        }
        _ => TRANSPORT_ERROR,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Open { source, .. } | TransportError::Serial(source) => match source.kind() {
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => PERMISSION_DENIED,
            serialport::ErrorKind::InvalidInput => USAGE,
            _ => TRANSPORT_ERROR,
        },
        TransportError::Io(source) => match source.kind() {
            io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
            io::ErrorKind::TimedOut => TIMEOUT,
            _ => TRANSPORT_ERROR,
        },
        TransportError::Closed => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    let code = session_code(&err);
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        other => CliError::new(code, format!("{context}: {other}")),
    }
}

fn session_code(err: &SessionError) -> i32 {
    match err {
        SessionError::Transport(_) | SessionError::LinkBroken(_) => TRANSPORT_ERROR,
        SessionError::Timeout(_) => TIMEOUT,
        SessionError::ProtocolMismatch(_) | SessionError::Shutdown => FAILURE,
        SessionError::InvalidParameter(_) => USAGE,
        SessionError::EmptyImage | SessionError::ImageTooLarge { .. } => DATA_INVALID,
        SessionError::Io(err) => io_code(err.kind()),
        SessionError::UpdateFailed { source, .. } => session_code(source),
        SessionError::Frame(_) => INTERNAL,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use senseway_session::UpdatePhase;

    use super::*;

    #[test]
    fn update_failure_uses_cause_code() {
        let err = SessionError::UpdateFailed {
            phase: UpdatePhase::Transfer,
            chunk: Some(3),
            source: Box::new(SessionError::Timeout(Duration::from_secs(1))),
        };
        let cli = session_error("update failed", err);
        assert_eq!(cli.code, TIMEOUT);
        assert!(cli.message.contains("chunk 3"));
    }

    #[test]
    fn image_problems_are_data_errors() {
        assert_eq!(session_error("x", SessionError::EmptyImage).code, DATA_INVALID);
        let missing = SessionError::Io(io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(session_error("x", missing).code, DATA_INVALID);
    }

    #[test]
    fn bad_arguments_are_usage_errors() {
        let err = SessionError::InvalidParameter("sample count".to_string());
        assert_eq!(session_error("x", err).code, USAGE);
    }

    #[test]
    fn closed_link_is_a_transport_error() {
        let err = SessionError::Transport(TransportError::Closed);
        assert_eq!(session_error("x", err).code, TRANSPORT_ERROR);
        assert_eq!(
            session_error("x", SessionError::LinkBroken("gone".into())).code,
            TRANSPORT_ERROR
        );
    }
}
