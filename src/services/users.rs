use std::collections::HashSet;

use crate::error::{AppError, AppResult};
use crate::models::{ClickRecord, UserId};

/// Set of known users. Members are never removed.
#[derive(Debug, Clone, Default)]
pub struct UserRegistry {
    users: HashSet<UserId>,
}

impl UserRegistry {
    /// Seeds the registry with every distinct user in the click log
    pub fn from_clicks(clicks: &[ClickRecord]) -> Self {
        Self {
            users: clicks.iter().map(|c| c.user_id).collect(),
        }
    }

    /// Registers a new user, failing if the id is already known
    pub fn add_user(&mut self, user_id: UserId) -> AppResult<()> {
        if !self.users.insert(user_id) {
            return Err(AppError::AlreadyExists("User already exists.".to_string()));
        }
        Ok(())
    }

    pub fn exists(&self, user_id: UserId) -> bool {
        self.users.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
