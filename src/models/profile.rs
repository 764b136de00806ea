//! Profile model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One-to-one extension of a [`User`](super::User).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: i64,
    /// Owning user (unique)
    pub user_id: i64,
    pub bio: String,
    pub location: String,
    pub birth_date: Option<NaiveDate>,
    /// Image path or URL
    pub avatar: Option<String>,
    /// Personal website, empty when unset
    pub website: String,
}

impl Profile {
    /// Blank profile for a freshly registered user
    pub fn empty(user_id: i64) -> Self {
        Self {
            id: 0,
            user_id,
            bio: String::new(),
            location: String::new(),
            birth_date: None,
            avatar: None,
            website: String::new(),
        }
    }
}

/// Input for the profile half of the profile page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub bio: String,
    pub location: String,
    pub birth_date: Option<NaiveDate>,
    pub avatar: Option<String>,
    pub website: String,
}
