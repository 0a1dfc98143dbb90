use sqlx::SqlitePool;

use crate::db::{
    AccessLevel, AccountRepository, ShareGrant, TripRepository, TripShareRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::access::{authorize, Access, Decision};
use crate::services::credentials::CredentialService;

/// Result of a `grant` call. `created` is false when the grant already existed.
#[derive(Debug, Clone)]
pub struct GrantOutcome {
    pub grant: ShareGrant,
    pub created: bool,
}

pub struct ShareService;

impl ShareService {
    /// Grant `target_email` access to a trip. Only the owner may grant;
    /// granting an existing pair again is a no-op returning the stored grant.
    pub async fn grant(
        pool: &SqlitePool,
        trip_id: &str,
        caller_id: &str,
        target_email: &str,
        access_level: AccessLevel,
    ) -> AppResult<GrantOutcome> {
        let trip = TripRepository::find_by_id(pool, trip_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))?;
        let grants = TripShareRepository::list_for_trip(pool, &trip.id).await?;

        // Non-owners get Forbidden whether or not they can otherwise see the trip.
        let decision = authorize(caller_id, &trip, &grants, Access::Share);
        if !decision.is_allowed() {
            tracing::warn!(
                "Share denied: account {} is not the owner of trip {} ({:?})",
                caller_id,
                trip.id,
                decision
            );
            return Err(AppError::Forbidden);
        }

        let email = CredentialService::normalize_email(target_email);
        let target = AccountRepository::find_by_email(pool, &email)
            .await?
            .ok_or_else(|| AppError::NotFound("User to share with was not found".to_string()))?;

        if target.id == caller_id {
            return Err(AppError::BadRequest(
                "Cannot share a trip with yourself".to_string(),
            ));
        }

        let created =
            TripShareRepository::insert_if_absent(pool, &trip.id, &target.id, access_level)
                .await?;

        let grant = TripShareRepository::find(pool, &trip.id, &target.id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "share for trip {} vanished after insert",
                    trip.id
                ))
            })?;

        if created {
            tracing::info!("Trip {} shared with account {}", trip.id, target.id);
        } else {
            tracing::debug!(
                "Trip {} already shared with account {}",
                trip.id,
                target.id
            );
        }

        Ok(GrantOutcome { grant, created })
    }
}
