//! Subscription lapse evaluation shared by activation, validation, and refresh.

/// Outcome of checking a tenant's subscription against a token's issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionState {
    pub subscription_active: bool,
    /// True when the subscription has lapsed but the caller is inside the
    /// offline-grace window for a token issued before the lapse.
    pub grace_active: bool,
    pub allowed: bool,
}

/// A lapsed subscription is tolerated for `grace_days` after expiry, but only
/// for tokens issued while the subscription was still active. Tokens issued
/// after the lapse are never allowed.
pub fn evaluate_subscription(
    subscription_expires_at: i64,
    issued_at: i64,
    now: i64,
    grace_days: i64,
) -> SubscriptionState {
    if now <= subscription_expires_at {
        return SubscriptionState {
            subscription_active: true,
            grace_active: false,
            allowed: true,
        };
    }

    let grace_deadline = subscription_expires_at + grace_days * 86400;
    let grace_active = now <= grace_deadline && issued_at <= subscription_expires_at;
    SubscriptionState {
        subscription_active: false,
        grace_active,
        allowed: grace_active,
    }
}
