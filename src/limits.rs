//! Hard limits. Checked at mutation entry; exceeding one surfaces
//! `EngineError::LimitExceeded` rather than unbounded growth.

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_USERNAME_LEN: usize = 64;
pub const MAX_SLOT_LABEL_LEN: usize = 16;
pub const MAX_SPORT_TAG_LEN: usize = 64;

pub const MAX_SLOTS_PER_GROUND: usize = 64;
pub const MAX_SPORTS_PER_GROUND: usize = 32;
pub const MAX_HISTORY_PER_USER: usize = 256;

pub const MAX_GROUNDS: usize = 100_000;
pub const MAX_USERS: usize = 1_000_000;
pub const MAX_PENDING_SLOTS: usize = 100_000;
pub const MAX_BOOKINGS_PER_GROUND: usize = 100_000;
