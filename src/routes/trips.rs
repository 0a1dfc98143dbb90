use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::db::{AccessLevel, Flight, Hotel, NewFlight, NewHotel, NewTrip, ShareGrant};
use crate::error::AppResult;
use crate::routes::auth::AuthAccount;
use crate::routes::extract::{AppJson, AppPath};
use crate::services::access::Access;
use crate::services::sharing::ShareService;
use crate::services::trips::{TripDetails, TripService};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_trips).post(create_trip))
        .route("/:trip_id", get(get_trip))
        .route("/:trip_id/share", post(share_trip))
        .route("/:trip_id/shares", get(list_shares))
        .route("/:trip_id/flights", post(add_flight))
        .route("/:trip_id/hotels", post(add_hotel))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub flights: Vec<NewFlight>,
    #[serde(default)]
    pub hotels: Vec<NewHotel>,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub email: String,
    #[serde(default)]
    pub access_level: AccessLevel,
}

#[derive(Debug, Serialize)]
pub struct FlightResponse {
    pub id: String,
    pub airline: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
}

impl From<Flight> for FlightResponse {
    fn from(f: Flight) -> Self {
        Self {
            id: f.id,
            airline: f.airline,
            departure_airport: f.departure_airport,
            arrival_airport: f.arrival_airport,
            departure_time: f.departure_time,
            arrival_time: f.arrival_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HotelResponse {
    pub id: String,
    pub name: String,
    pub city: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl From<Hotel> for HotelResponse {
    fn from(h: Hotel) -> Self {
        Self {
            id: h.id,
            name: h.name,
            city: h.city,
            check_in: h.check_in,
            check_out: h.check_out,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TripResponse {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub flights: Vec<FlightResponse>,
    pub hotels: Vec<HotelResponse>,
    pub shared_with_user_ids: Vec<String>,
}

impl From<TripDetails> for TripResponse {
    fn from(d: TripDetails) -> Self {
        Self {
            id: d.trip.id,
            name: d.trip.name,
            owner_id: d.trip.owner_account_id,
            start_date: d.trip.start_date,
            end_date: d.trip.end_date,
            flights: d.flights.into_iter().map(Into::into).collect(),
            hotels: d.hotels.into_iter().map(Into::into).collect(),
            shared_with_user_ids: d.shared_with,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub trip_id: String,
    pub user_id: String,
    pub access_level: AccessLevel,
    pub created_at: NaiveDateTime,
}

impl From<ShareGrant> for ShareResponse {
    fn from(g: ShareGrant) -> Self {
        Self {
            trip_id: g.trip_id,
            user_id: g.account_id,
            access_level: g.access_level,
            created_at: g.created_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a trip owned by the caller, with optional initial flights and hotels
async fn create_trip(
    State(state): State<Arc<AppState>>,
    AuthAccount(account_id): AuthAccount,
    AppJson(request): AppJson<CreateTripRequest>,
) -> AppResult<(StatusCode, Json<TripResponse>)> {
    let new = NewTrip {
        name: request.name,
        start_date: request.start_date,
        end_date: request.end_date,
    };
    let details =
        TripService::create(&state.db, &account_id, new, request.flights, request.hotels).await?;

    Ok((StatusCode::CREATED, Json(details.into())))
}

/// List trips the caller owns or has been granted
async fn list_trips(
    State(state): State<Arc<AppState>>,
    AuthAccount(account_id): AuthAccount,
) -> AppResult<Json<Vec<TripResponse>>> {
    let trips = TripService::list(&state.db, &account_id).await?;
    Ok(Json(trips.into_iter().map(Into::into).collect()))
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    AuthAccount(account_id): AuthAccount,
    AppPath(trip_id): AppPath<String>,
) -> AppResult<Json<TripResponse>> {
    let details = TripService::get(&state.db, &account_id, &trip_id).await?;
    Ok(Json(details.into()))
}

/// Share a trip with another registered account (owner only).
/// Responds 201 for a new grant and 200 when the grant already existed.
async fn share_trip(
    State(state): State<Arc<AppState>>,
    AuthAccount(account_id): AuthAccount,
    AppPath(trip_id): AppPath<String>,
    AppJson(request): AppJson<ShareRequest>,
) -> AppResult<(StatusCode, Json<ShareResponse>)> {
    let outcome = ShareService::grant(
        &state.db,
        &trip_id,
        &account_id,
        &request.email,
        request.access_level,
    )
    .await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.grant.into())))
}

/// List the grants of a trip the caller can see
async fn list_shares(
    State(state): State<Arc<AppState>>,
    AuthAccount(account_id): AuthAccount,
    AppPath(trip_id): AppPath<String>,
) -> AppResult<Json<Vec<ShareResponse>>> {
    let (_, grants) =
        TripService::load_authorized(&state.db, &account_id, &trip_id, Access::Read).await?;
    Ok(Json(grants.into_iter().map(Into::into).collect()))
}

async fn add_flight(
    State(state): State<Arc<AppState>>,
    AuthAccount(account_id): AuthAccount,
    AppPath(trip_id): AppPath<String>,
    AppJson(flight): AppJson<NewFlight>,
) -> AppResult<Json<TripResponse>> {
    let details = TripService::add_flight(&state.db, &account_id, &trip_id, flight).await?;
    Ok(Json(details.into()))
}

async fn add_hotel(
    State(state): State<Arc<AppState>>,
    AuthAccount(account_id): AuthAccount,
    AppPath(trip_id): AppPath<String>,
    AppJson(hotel): AppJson<NewHotel>,
) -> AppResult<Json<TripResponse>> {
    let details = TripService::add_hotel(&state.db, &account_id, &trip_id, hotel).await?;
    Ok(Json(details.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::test_support::{login, register, request, send, test_app};

    #[tokio::test]
    async fn owner_shares_trip_and_grantee_collaborates() {
        let (app, _) = test_app().await;

        register(&app, "owner@example.com", "password123").await;
        let (_, bob) = register(&app, "bob@example.com", "password123").await;
        let owner_token = login(&app, "owner@example.com", "password123").await;
        let bob_token = login(&app, "bob@example.com", "password123").await;

        let (status, trip) = request(
            &app,
            Method::POST,
            "/trips",
            Some(&owner_token),
            Some(json!({
                "name": "Porto weekend",
                "start_date": "2024-09-06",
                "end_date": "2024-09-08",
                "hotels": [{
                    "name": "Ribeira Inn",
                    "city": "Porto",
                    "check_in": "2024-09-06",
                    "check_out": "2024-09-08"
                }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(trip["hotels"].as_array().unwrap().len(), 1);
        let trip_id = trip["id"].as_str().unwrap().to_string();
        let trip_path = format!("/trips/{}", trip_id);

        // Bob has no relation to the trip yet.
        let (status, _) = request(&app, Method::GET, &trip_path, Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let share_path = format!("{}/share", trip_path);
        let (status, grant) = request(
            &app,
            Method::POST,
            &share_path,
            Some(&owner_token),
            Some(json!({ "email": "bob@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(grant["user_id"], bob["id"]);
        assert_eq!(grant["access_level"], "read_write");

        // Sharing again is a no-op.
        let (status, _) = request(
            &app,
            Method::POST,
            &share_path,
            Some(&owner_token),
            Some(json!({ "email": "bob@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, updated) = request(
            &app,
            Method::POST,
            &format!("{}/flights", trip_path),
            Some(&bob_token),
            Some(json!({
                "airline": "TAP",
                "departure_airport": "LIS",
                "arrival_airport": "OPO",
                "departure_time": "2024-09-06T08:00:00",
                "arrival_time": "2024-09-06T09:00:00"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["flights"].as_array().unwrap().len(), 1);
        assert_eq!(updated["shared_with_user_ids"], json!([bob["id"]]));

        let (status, shares) = request(
            &app,
            Method::GET,
            &format!("{}/shares", trip_path),
            Some(&bob_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shares.as_array().unwrap().len(), 1);

        let (status, listed) = request(&app, Method::GET, "/trips", Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["id"], trip_id.as_str());
    }

    #[tokio::test]
    async fn grantee_cannot_reshare_and_stranger_sees_nothing() {
        let (app, _) = test_app().await;

        register(&app, "owner@example.com", "password123").await;
        register(&app, "bob@example.com", "password123").await;
        register(&app, "carol@example.com", "password123").await;
        let owner_token = login(&app, "owner@example.com", "password123").await;
        let bob_token = login(&app, "bob@example.com", "password123").await;
        let carol_token = login(&app, "carol@example.com", "password123").await;

        let (_, trip) = request(
            &app,
            Method::POST,
            "/trips",
            Some(&owner_token),
            Some(json!({ "name": "Madeira" })),
        )
        .await;
        let trip_path = format!("/trips/{}", trip["id"].as_str().unwrap());
        let share_path = format!("{}/share", trip_path);

        request(
            &app,
            Method::POST,
            &share_path,
            Some(&owner_token),
            Some(json!({ "email": "bob@example.com" })),
        )
        .await;

        let (status, _) = request(
            &app,
            Method::POST,
            &share_path,
            Some(&bob_token),
            Some(json!({ "email": "carol@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = request(&app, Method::GET, &trip_path, Some(&carol_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, listed) =
            request(&app, Method::GET, "/trips", Some(&carol_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(listed.as_array().unwrap().is_empty());

        let (status, _) = request(
            &app,
            Method::POST,
            &share_path,
            Some(&owner_token),
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_trip_body_gets_json_error() {
        let (app, _) = test_app().await;
        register(&app, "owner@example.com", "password123").await;
        let token = login(&app, "owner@example.com", "password123").await;

        let req = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/trips")
            .header(axum::http::header::AUTHORIZATION, format!("Bearer {}", token))
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from("not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");

        let (status, body) = request(
            &app,
            Method::POST,
            "/trips",
            Some(&token),
            Some(json!({ "name": "Lisbon", "start_date": "not-a-date" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn trips_require_authentication() {
        let (app, _) = test_app().await;
        let (status, body) = request(&app, Method::GET, "/trips", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }
}
