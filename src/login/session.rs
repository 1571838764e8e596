use chrono::{DateTime, Utc};

/// Lifecycle state of a login session.
///
/// `Pending` moves to `Confirmed` once, or ages out. Aged-out sessions are
/// removed from the store, so `Expired` is only ever seen on the record
/// being evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Pending,
    Confirmed,
    Expired,
}

impl LoginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Expired => "Expired",
        }
    }
}

impl std::fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cross-device login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSession {
    /// 32-char URL-safe random id; the lookup key.
    pub id: String,
    /// Address encoded into the QR code. The scanning device opens it to confirm.
    pub confirmation_url: String,
    pub status: LoginStatus,
    pub created_at: DateTime<Utc>,
    /// Set only on the Pending -> Confirmed transition.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Set only on the Pending -> Confirmed transition.
    pub user_info: Option<String>,
}

impl LoginSession {
    pub(crate) fn pending(id: String, confirmation_url: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            confirmation_url,
            status: LoginStatus::Pending,
            created_at: now,
            confirmed_at: None,
            user_info: None,
        }
    }

    /// Age strictly greater than `window` means expired; exactly `window` is still valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now - self.created_at > window
    }

    /// When the session stops being valid.
    pub fn expires_at(&self, window: chrono::Duration) -> DateTime<Utc> {
        self.created_at + window
    }
}
