//! In-memory session and credit bookkeeping.
//!
//! Plan changes are simulated: no payment is verified before credits are
//! granted.

use crate::models::{EmbeddedImage, Plan, UserSession};
use tracing::{debug, info, warn};

pub const FREE_CREDITS: u32 = 5;
pub const PRO_CREDITS: u32 = 50;
/// Stand-in for "unlimited".
pub const UNLIMITED_CREDITS: u32 = 999;

/// What the login form collects.
#[derive(Debug, Default, Clone)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub avatar: Option<EmbeddedImage>,
}

pub fn login(profile: Profile) -> UserSession {
    let name = if profile.name.trim().is_empty() {
        "User".to_string()
    } else {
        profile.name.trim().to_string()
    };
    info!("Signed in as {} <{}>", name, profile.email);
    UserSession {
        name,
        email: profile.email,
        credits: FREE_CREDITS,
        plan: Plan::Free,
        avatar: profile.avatar,
    }
}

pub fn can_dispatch(session: &UserSession) -> bool {
    session.credits > 0
}

/// Spends one credit after a successful analysis. Callers check
/// `can_dispatch` first.
pub fn consume_credit(mut session: UserSession) -> UserSession {
    debug_assert!(can_dispatch(&session), "credit consumed with empty balance");
    session.credits = session.credits.saturating_sub(1);
    debug!("Credit consumed, {} remaining", session.credits);
    session
}

pub fn plan_credits(plan: Plan) -> u32 {
    match plan {
        Plan::Pro => PRO_CREDITS,
        Plan::Free | Plan::Premium => UNLIMITED_CREDITS,
    }
}

/// Simulated upgrade: the chosen plan is trusted as-is.
pub fn apply_plan(mut session: UserSession, plan: Plan) -> UserSession {
    warn!("Applying plan {} without payment verification (simulated)", plan);
    session.plan = plan;
    session.credits = plan_credits(plan);
    session
}

pub fn logout(session: UserSession) {
    info!("Signed out {}", session.email);
}
