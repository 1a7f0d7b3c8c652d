use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn type_error(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Type {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn permission(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Permission {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn corrupt_descriptor(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::CorruptDescriptor {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn arity(expected: usize, actual: usize) -> Error {
        Error(ErrorKind::Arity { expected, actual }.into())
    }

    pub fn postcondition(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Postcondition {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn unsupported_request(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::UnsupportedRequest {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn not_implemented(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::NotImplemented {
                message: message.into(),
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("type error: {message}")]
    Type { message: String },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("permission error: {message}")]
    Permission { message: String },

    #[error("corrupt foreign descriptor for '{element}': {message}")]
    CorruptDescriptor { element: String, message: String },

    #[error("operand count mismatch: expected {expected} source operands, received {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("callable postcondition violated: {message}")]
    Postcondition { message: String },

    #[error("unrecognized kernel request: {message}")]
    UnsupportedRequest { message: String },

    #[error("not yet implemented: {message}")]
    NotImplemented { message: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
