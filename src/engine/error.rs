use chrono::NaiveDate;
use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    GroundNotFound(Ulid),
    UserNotFound(Ulid),
    BookingNotFound(Ulid),
    PendingNotFound(Ulid),
    InvalidDate(NaiveDate),
    UnavailableSlot(String),
    SlotTaken { date: NaiveDate, time_slot: String },
    InvalidTimeRange { start: String, end: String },
    NotOwner(Ulid),
    AlreadyExists(Ulid),
    UsernameTaken(String),
    AlreadyCanceled(Ulid),
    GroundInUse(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

/// The five stable error kinds reported to callers. The kind string is the
/// HTTP error code, the status-code selector, and the metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ValidationFailed,
    Unauthorized,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::GroundNotFound(_)
            | EngineError::UserNotFound(_)
            | EngineError::BookingNotFound(_)
            | EngineError::PendingNotFound(_) => ErrorKind::NotFound,
            EngineError::InvalidDate(_)
            | EngineError::UnavailableSlot(_)
            | EngineError::SlotTaken { .. }
            | EngineError::InvalidTimeRange { .. }
            | EngineError::LimitExceeded(_) => ErrorKind::ValidationFailed,
            EngineError::NotOwner(_) => ErrorKind::Unauthorized,
            EngineError::AlreadyExists(_)
            | EngineError::UsernameTaken(_)
            | EngineError::AlreadyCanceled(_)
            | EngineError::GroundInUse(_) => ErrorKind::Conflict,
            EngineError::WalError(_) => ErrorKind::Internal,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::GroundNotFound(id) => write!(f, "ground not found: {id}"),
            EngineError::UserNotFound(id) => write!(f, "user not found: {id}"),
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::PendingNotFound(id) => write!(f, "pending slot not found: {id}"),
            EngineError::InvalidDate(date) => {
                write!(f, "invalid date: {date} is not after the current date")
            }
            EngineError::UnavailableSlot(slot) => {
                write!(f, "time slot {slot} is not available on this ground")
            }
            EngineError::SlotTaken { date, time_slot } => {
                write!(f, "slot {time_slot} on {date} is already booked")
            }
            EngineError::InvalidTimeRange { start, end } => {
                write!(f, "invalid time range: {start}..{end}")
            }
            EngineError::NotOwner(id) => {
                write!(f, "booking {id} belongs to another user")
            }
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::UsernameTaken(name) => write!(f, "username taken: {name}"),
            EngineError::AlreadyCanceled(id) => {
                write!(f, "booking {id} is already canceled")
            }
            EngineError::GroundInUse(id) => {
                write!(f, "cannot delete ground {id}: it has live bookings")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
