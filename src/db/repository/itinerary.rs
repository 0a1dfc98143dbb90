use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::db::models::{Flight, Hotel, NewFlight, NewHotel};
use crate::error::{AppError, AppResult};

// ============================================================================
// Itinerary Repository (flights and hotels; append-only)
// ============================================================================

pub struct ItineraryRepository;

impl ItineraryRepository {
    pub async fn add_flight<'e, E>(executor: E, trip_id: &str, flight: &NewFlight) -> AppResult<Flight>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        sqlx::query_as::<_, Flight>(
            r#"
            INSERT INTO flights (
                id, trip_id, airline, departure_airport, arrival_airport,
                departure_time, arrival_time, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id, trip_id, airline, departure_airport, arrival_airport,
                departure_time, arrival_time
            "#,
        )
        .bind(&id)
        .bind(trip_id)
        .bind(&flight.airline)
        .bind(&flight.departure_airport)
        .bind(&flight.arrival_airport)
        .bind(flight.departure_time)
        .bind(flight.arrival_time)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn add_hotel<'e, E>(executor: E, trip_id: &str, hotel: &NewHotel) -> AppResult<Hotel>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        sqlx::query_as::<_, Hotel>(
            r#"
            INSERT INTO hotels (id, trip_id, name, city, check_in, check_out, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, trip_id, name, city, check_in, check_out
            "#,
        )
        .bind(&id)
        .bind(trip_id)
        .bind(&hotel.name)
        .bind(&hotel.city)
        .bind(hotel.check_in)
        .bind(hotel.check_out)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Flights of a trip in insertion order.
    pub async fn flights_for_trip(pool: &SqlitePool, trip_id: &str) -> AppResult<Vec<Flight>> {
        sqlx::query_as::<_, Flight>(
            r#"
            SELECT
                id, trip_id, airline, departure_airport, arrival_airport,
                departure_time, arrival_time
            FROM flights
            WHERE trip_id = ?
            ORDER BY created_at, rowid
            "#,
        )
        .bind(trip_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Hotels of a trip in insertion order.
    pub async fn hotels_for_trip(pool: &SqlitePool, trip_id: &str) -> AppResult<Vec<Hotel>> {
        sqlx::query_as::<_, Hotel>(
            r#"
            SELECT id, trip_id, name, city, check_in, check_out
            FROM hotels
            WHERE trip_id = ?
            ORDER BY created_at, rowid
            "#,
        )
        .bind(trip_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
