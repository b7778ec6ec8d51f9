use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// A task update failed
    Mutation,
    Info,
    Error,
}

/// A transient, auto-dismissing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

impl Notice {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Notices in posting order. Expired ones are pruned on each post.
#[derive(Debug, Clone, Default)]
pub struct NoticeBoard {
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn post(&mut self, kind: NoticeKind, message: impl Into<String>, now: DateTime<Utc>, lifetime: Duration) {
        self.notices.retain(|n| n.is_active(now));
        let lifetime = chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::zero());
        self.notices.push(Notice {
            kind,
            message: message.into(),
            expires_at: now + lifetime,
        });
    }

    pub fn active(&self, now: DateTime<Utc>) -> Vec<Notice> {
        self.notices.iter().filter(|n| n.is_active(now)).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.notices.clear();
    }
}
