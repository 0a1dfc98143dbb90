use sqlx::SqlitePool;

use crate::db::{
    Flight, Hotel, ItineraryRepository, NewFlight, NewHotel, NewTrip, ShareGrant, Trip,
    TripRepository, TripShareRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::access::{authorize, Access, Decision, DenyReason};

/// A trip with its itinerary and the ids of the accounts it is shared with.
#[derive(Debug, Clone)]
pub struct TripDetails {
    pub trip: Trip,
    pub flights: Vec<Flight>,
    pub hotels: Vec<Hotel>,
    pub shared_with: Vec<String>,
}

/// Map a denial to the error the HTTP layer renders. A trip the account has
/// no relation to looks exactly like a trip that does not exist.
pub fn deny_error(reason: DenyReason) -> AppError {
    match reason {
        DenyReason::NotVisible => AppError::NotFound("Trip not found".to_string()),
        DenyReason::InsufficientAccess => AppError::Forbidden,
    }
}

pub struct TripService;

impl TripService {
    pub fn validate_trip(new: &NewTrip) -> AppResult<()> {
        if new.name.trim().is_empty() {
            return Err(AppError::Validation(
                "Trip name cannot be empty".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (new.start_date, new.end_date) {
            if end < start {
                return Err(AppError::Validation(
                    "Trip end date cannot be before its start date".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn validate_flight(flight: &NewFlight) -> AppResult<()> {
        for (field, value) in [
            ("airline", &flight.airline),
            ("departure_airport", &flight.departure_airport),
            ("arrival_airport", &flight.arrival_airport),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{} cannot be empty", field)));
            }
        }
        if flight.arrival_time < flight.departure_time {
            return Err(AppError::Validation(
                "Flight cannot arrive before it departs".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_hotel(hotel: &NewHotel) -> AppResult<()> {
        if hotel.name.trim().is_empty() || hotel.city.trim().is_empty() {
            return Err(AppError::Validation(
                "Hotel name and city cannot be empty".to_string(),
            ));
        }
        if hotel.check_out < hotel.check_in {
            return Err(AppError::Validation(
                "Hotel check-out cannot be before check-in".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a trip owned by `owner_id` together with its initial itinerary.
    pub async fn create(
        pool: &SqlitePool,
        owner_id: &str,
        new: NewTrip,
        flights: Vec<NewFlight>,
        hotels: Vec<NewHotel>,
    ) -> AppResult<TripDetails> {
        let new = NewTrip {
            name: new.name.trim().to_string(),
            ..new
        };
        Self::validate_trip(&new)?;
        flights.iter().try_for_each(Self::validate_flight)?;
        hotels.iter().try_for_each(Self::validate_hotel)?;

        let mut tx = pool.begin().await?;

        let trip = TripRepository::create(&mut *tx, owner_id, &new).await?;

        let mut stored_flights = Vec::with_capacity(flights.len());
        for flight in &flights {
            stored_flights.push(ItineraryRepository::add_flight(&mut *tx, &trip.id, flight).await?);
        }

        let mut stored_hotels = Vec::with_capacity(hotels.len());
        for hotel in &hotels {
            stored_hotels.push(ItineraryRepository::add_hotel(&mut *tx, &trip.id, hotel).await?);
        }

        tx.commit().await?;

        tracing::info!("Account {} created trip {}", owner_id, trip.id);

        Ok(TripDetails {
            trip,
            flights: stored_flights,
            hotels: stored_hotels,
            shared_with: Vec::new(),
        })
    }

    /// Trips the account owns, then trips shared with it.
    pub async fn list(pool: &SqlitePool, account_id: &str) -> AppResult<Vec<TripDetails>> {
        let mut trips = TripRepository::list_owned(pool, account_id).await?;
        for shared in TripRepository::list_shared_with(pool, account_id).await? {
            if !trips.iter().any(|t| t.id == shared.id) {
                trips.push(shared);
            }
        }

        let mut out = Vec::with_capacity(trips.len());
        for trip in trips {
            let grants = TripShareRepository::list_for_trip(pool, &trip.id).await?;
            out.push(Self::details(pool, trip, &grants).await?);
        }
        Ok(out)
    }

    pub async fn get(pool: &SqlitePool, account_id: &str, trip_id: &str) -> AppResult<TripDetails> {
        let (trip, grants) = Self::load_authorized(pool, account_id, trip_id, Access::Read).await?;
        Self::details(pool, trip, &grants).await
    }

    pub async fn add_flight(
        pool: &SqlitePool,
        account_id: &str,
        trip_id: &str,
        flight: NewFlight,
    ) -> AppResult<TripDetails> {
        let (trip, grants) = Self::load_authorized(pool, account_id, trip_id, Access::Write).await?;
        Self::validate_flight(&flight)?;

        ItineraryRepository::add_flight(pool, &trip.id, &flight).await?;
        tracing::debug!("Account {} added a flight to trip {}", account_id, trip.id);

        Self::details(pool, trip, &grants).await
    }

    pub async fn add_hotel(
        pool: &SqlitePool,
        account_id: &str,
        trip_id: &str,
        hotel: NewHotel,
    ) -> AppResult<TripDetails> {
        let (trip, grants) = Self::load_authorized(pool, account_id, trip_id, Access::Write).await?;
        Self::validate_hotel(&hotel)?;

        ItineraryRepository::add_hotel(pool, &trip.id, &hotel).await?;
        tracing::debug!("Account {} added a hotel to trip {}", account_id, trip.id);

        Self::details(pool, trip, &grants).await
    }

    /// Load a trip and its grants, failing unless `account_id` may perform
    /// `access` on it.
    pub async fn load_authorized(
        pool: &SqlitePool,
        account_id: &str,
        trip_id: &str,
        access: Access,
    ) -> AppResult<(Trip, Vec<ShareGrant>)> {
        let trip = TripRepository::find_by_id(pool, trip_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))?;
        let grants = TripShareRepository::list_for_trip(pool, &trip.id).await?;

        match authorize(account_id, &trip, &grants, access) {
            Decision::Allow(role) => {
                tracing::debug!(
                    "Account {} granted {:?} on trip {} as {:?}",
                    account_id,
                    access,
                    trip.id,
                    role
                );
                Ok((trip, grants))
            }
            Decision::Deny(reason) => {
                tracing::warn!(
                    "Access denied: account {} requested {:?} on trip {} ({:?})",
                    account_id,
                    access,
                    trip.id,
                    reason
                );
                Err(deny_error(reason))
            }
        }
    }

    async fn details(pool: &SqlitePool, trip: Trip, grants: &[ShareGrant]) -> AppResult<TripDetails> {
        let flights = ItineraryRepository::flights_for_trip(pool, &trip.id).await?;
        let hotels = ItineraryRepository::hotels_for_trip(pool, &trip.id).await?;
        let shared_with = grants.iter().map(|g| g.account_id.clone()).collect();

        Ok(TripDetails {
            trip,
            flights,
            hotels,
            shared_with,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, AccessLevel, Account, AccountRepository};
    use crate::services::sharing::ShareService;
    use chrono::NaiveDate;

    async fn account(pool: &SqlitePool, email: &str) -> Account {
        AccountRepository::create(pool, email, "not-a-real-hash")
            .await
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_trip(name: &str) -> NewTrip {
        NewTrip {
            name: name.to_string(),
            start_date: Some(date(2024, 7, 1)),
            end_date: Some(date(2024, 7, 10)),
        }
    }

    fn flight() -> NewFlight {
        NewFlight {
            airline: "TAP".to_string(),
            departure_airport: "LHR".to_string(),
            arrival_airport: "LIS".to_string(),
            departure_time: date(2024, 7, 1).and_hms_opt(9, 0, 0).unwrap(),
            arrival_time: date(2024, 7, 1).and_hms_opt(11, 45, 0).unwrap(),
        }
    }

    fn hotel() -> NewHotel {
        NewHotel {
            name: "Casa Azul".to_string(),
            city: "Lisbon".to_string(),
            check_in: date(2024, 7, 1),
            check_out: date(2024, 7, 5),
        }
    }

    #[tokio::test]
    async fn create_stores_itinerary() {
        let pool = test_pool().await;
        let owner = account(&pool, "o@example.com").await;

        let created = TripService::create(
            &pool,
            &owner.id,
            new_trip("  Lisbon  "),
            vec![flight()],
            vec![hotel()],
        )
        .await
        .unwrap();
        assert_eq!(created.trip.name, "Lisbon");
        assert_eq!(created.trip.owner_account_id, owner.id);
        assert_eq!(created.flights.len(), 1);
        assert_eq!(created.hotels.len(), 1);

        let fetched = TripService::get(&pool, &owner.id, &created.trip.id)
            .await
            .unwrap();
        assert_eq!(fetched.flights[0].airline, "TAP");
        assert_eq!(fetched.hotels[0].city, "Lisbon");
        assert!(fetched.shared_with.is_empty());
    }

    #[tokio::test]
    async fn invalid_itinerary_creates_nothing() {
        let pool = test_pool().await;
        let owner = account(&pool, "o@example.com").await;

        let mut bad_hotel = hotel();
        bad_hotel.check_out = date(2024, 6, 30);
        let err = TripService::create(&pool, &owner.id, new_trip("Lisbon"), vec![], vec![bad_hotel])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = TripService::create(&pool, &owner.id, new_trip("   "), vec![], vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(TripService::list(&pool, &owner.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stranger_gets_not_found_and_grantee_may_append() {
        let pool = test_pool().await;
        let owner = account(&pool, "o@example.com").await;
        let bob = account(&pool, "b@example.com").await;
        let carol = account(&pool, "c@example.com").await;

        let trip = TripService::create(&pool, &owner.id, new_trip("Lisbon"), vec![], vec![])
            .await
            .unwrap()
            .trip;

        let err = TripService::get(&pool, &bob.id, &trip.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        ShareService::grant(
            &pool,
            &trip.id,
            &owner.id,
            "b@example.com",
            AccessLevel::ReadWrite,
        )
        .await
        .unwrap();

        let updated = TripService::add_flight(&pool, &bob.id, &trip.id, flight())
            .await
            .unwrap();
        assert_eq!(updated.flights.len(), 1);
        assert_eq!(updated.shared_with, vec![bob.id.clone()]);

        let updated = TripService::add_hotel(&pool, &bob.id, &trip.id, hotel())
            .await
            .unwrap();
        assert_eq!(updated.hotels.len(), 1);

        let err = TripService::add_hotel(&pool, &carol.id, &trip.id, hotel())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_includes_owned_and_shared_once() {
        let pool = test_pool().await;
        let owner = account(&pool, "o@example.com").await;
        let bob = account(&pool, "b@example.com").await;

        let mine = TripService::create(&pool, &bob.id, new_trip("Mine"), vec![], vec![])
            .await
            .unwrap()
            .trip;
        let theirs = TripService::create(&pool, &owner.id, new_trip("Theirs"), vec![], vec![])
            .await
            .unwrap()
            .trip;
        ShareService::grant(
            &pool,
            &theirs.id,
            &owner.id,
            "b@example.com",
            AccessLevel::ReadWrite,
        )
        .await
        .unwrap();

        let ids: Vec<String> = TripService::list(&pool, &bob.id)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.trip.id)
            .collect();
        assert_eq!(ids, vec![mine.id, theirs.id.clone()]);

        let owner_view = TripService::list(&pool, &owner.id).await.unwrap();
        assert_eq!(owner_view.len(), 1);
        assert_eq!(owner_view[0].trip.id, theirs.id);
    }

    #[test]
    fn deny_reasons_render_differently() {
        assert!(matches!(
            deny_error(DenyReason::NotVisible),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            deny_error(DenyReason::InsufficientAccess),
            AppError::Forbidden
        ));
    }

    #[test]
    fn flight_must_not_arrive_before_departure() {
        let mut f = flight();
        f.arrival_time = date(2024, 6, 30).and_hms_opt(8, 0, 0).unwrap();
        assert!(TripService::validate_flight(&f).is_err());
        assert!(TripService::validate_flight(&flight()).is_ok());
    }
}
