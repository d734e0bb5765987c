use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub message: String,
    pub error_type: ErrorType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    NotConnected,
    Transport,
    Registration,
    Decode,
    CallbackFault,
    Stack,
    Channel,
}

impl Error {
    pub fn from_string(message: String, error_type: ErrorType) -> Self {
        Error {
            message,
            error_type,
        }
    }

    pub fn new(message: &str, error_type: ErrorType) -> Self {
        Self::from_string(message.to_string(), error_type)
    }

    pub fn is_not_connected(&self) -> bool {
        self.error_type == ErrorType::NotConnected
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for Error {}
