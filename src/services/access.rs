//! Trip access decisions.
//!
//! Everything here is a pure function over already-loaded state: the
//! requesting account, the trip (for its owner) and the trip's grants.
//! Callers load that state and decide how a denial is rendered.

use crate::db::models::{AccessLevel, ShareGrant, Trip};

/// Operation an account wants to perform on a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    /// Create share grants.
    Share,
}

/// The relation an account has to a trip. The owner is treated as holding a
/// synthesized grant that covers every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Grantee(AccessLevel),
}

impl Role {
    pub fn covers(self, access: Access) -> bool {
        match self {
            Role::Owner => true,
            Role::Grantee(AccessLevel::ReadWrite) => {
                matches!(access, Access::Read | Access::Write)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The account has no relation to the trip at all.
    NotVisible,
    /// The account can see the trip but may not perform this operation.
    InsufficientAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(Role),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// The account's role on `trip`, if any. Grants for other trips are ignored.
pub fn role_of(account_id: &str, trip: &Trip, grants: &[ShareGrant]) -> Option<Role> {
    if account_id == trip.owner_account_id {
        return Some(Role::Owner);
    }

    grants
        .iter()
        .find(|g| g.trip_id == trip.id && g.account_id == account_id)
        .map(|g| Role::Grantee(g.access_level))
}

pub fn authorize(
    account_id: &str,
    trip: &Trip,
    grants: &[ShareGrant],
    requested: Access,
) -> Decision {
    match role_of(account_id, trip, grants) {
        Some(role) if role.covers(requested) => Decision::Allow(role),
        Some(_) => Decision::Deny(DenyReason::InsufficientAccess),
        None => Decision::Deny(DenyReason::NotVisible),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn trip(owner: &str) -> Trip {
        Trip {
            id: "trip-x".to_string(),
            owner_account_id: owner.to_string(),
            name: "Lisbon".to_string(),
            start_date: None,
            end_date: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn grant(trip_id: &str, account_id: &str) -> ShareGrant {
        ShareGrant {
            trip_id: trip_id.to_string(),
            account_id: account_id.to_string(),
            access_level: AccessLevel::ReadWrite,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn owner_may_do_anything() {
        let t = trip("owner");
        for access in [Access::Read, Access::Write, Access::Share] {
            assert_eq!(
                authorize("owner", &t, &[], access),
                Decision::Allow(Role::Owner)
            );
        }
    }

    #[test]
    fn grantee_may_read_and_write_but_not_share() {
        let t = trip("owner");
        let grants = vec![grant("trip-x", "bob")];

        assert!(authorize("bob", &t, &grants, Access::Read).is_allowed());
        assert_eq!(
            authorize("bob", &t, &grants, Access::Write),
            Decision::Allow(Role::Grantee(AccessLevel::ReadWrite))
        );
        assert_eq!(
            authorize("bob", &t, &grants, Access::Share),
            Decision::Deny(DenyReason::InsufficientAccess)
        );
    }

    #[test]
    fn stranger_cannot_see_trip() {
        let t = trip("owner");
        let grants = vec![grant("trip-x", "bob")];
        for access in [Access::Read, Access::Write, Access::Share] {
            assert_eq!(
                authorize("carol", &t, &grants, access),
                Decision::Deny(DenyReason::NotVisible)
            );
        }
    }

    #[test]
    fn grant_for_another_trip_does_not_leak() {
        let t = trip("owner");
        let grants = vec![grant("trip-y", "bob")];
        assert_eq!(
            authorize("bob", &t, &grants, Access::Read),
            Decision::Deny(DenyReason::NotVisible)
        );
    }

    #[test]
    fn write_allowed_iff_owner_or_read_write_grantee() {
        let t = trip("owner");
        let grants = vec![grant("trip-x", "bob")];
        let cases = [("owner", true), ("bob", true), ("carol", false), ("", false)];
        for (account, expected) in cases {
            assert_eq!(
                authorize(account, &t, &grants, Access::Write).is_allowed(),
                expected,
                "account {:?}",
                account
            );
        }
    }
}
