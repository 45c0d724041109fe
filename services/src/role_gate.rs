//! Pure authorization predicates over (actor, group, session).
//!
//! Nothing here touches the store; callers load the rows and ask.

use chrono::{DateTime, Utc};
use db::models::attendance_session::{self, SessionKind};
use db::models::group;
use std::fmt;

use crate::actor::Actor;

/// Why a self-mark was refused, first failing condition wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotMember,
    NotStudent,
    SelfAttendanceDisabled,
    ManualSession,
    WindowExpired { expired_at: DateTime<Utc> },
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::NotMember => write!(f, "not a member of this group"),
            Denial::NotStudent => write!(f, "only students can mark themselves"),
            Denial::SelfAttendanceDisabled => write!(f, "self attendance is disabled for this group"),
            Denial::ManualSession => write!(f, "this session is marked by the teacher"),
            Denial::WindowExpired { expired_at } => write!(f, "window expired at {expired_at}"),
        }
    }
}

fn belongs_to(actor: &Actor, group: &group::Model) -> bool {
    actor.group_id == group.id
}

/// Only the owning teacher controls sessions.
pub fn can_open_session(actor: &Actor, group: &group::Model) -> bool {
    belongs_to(actor, group) && actor.is_teacher() && actor.profile_id == group.owner_id
}

pub fn can_edit_settings(actor: &Actor, group: &group::Model) -> bool {
    can_open_session(actor, group)
}

pub fn self_mark_denial(
    actor: &Actor,
    group: &group::Model,
    session: &attendance_session::Model,
    now: DateTime<Utc>,
) -> Option<Denial> {
    if !belongs_to(actor, group) || session.group_id != group.id {
        return Some(Denial::NotMember);
    }
    if !actor.is_student() {
        return Some(Denial::NotStudent);
    }
    if !group.allow_self_attendance {
        return Some(Denial::SelfAttendanceDisabled);
    }
    if session.kind != SessionKind::SelfMarked {
        return Some(Denial::ManualSession);
    }
    let expiry = session.expires_at.or_else(|| {
        attendance_session::Model::compute_expiry(
            session.kind,
            session.opened_at,
            group.attendance_window_minutes,
        )
    })?;
    if now >= expiry {
        return Some(Denial::WindowExpired { expired_at: expiry });
    }
    None
}

pub fn can_self_mark(
    actor: &Actor,
    group: &group::Model,
    session: &attendance_session::Model,
    now: DateTime<Utc>,
) -> bool {
    self_mark_denial(actor, group, session, now).is_none()
}

/// Any member may read history.
pub fn can_view_history(actor: &Actor, group: &group::Model) -> bool {
    belongs_to(actor, group)
}
