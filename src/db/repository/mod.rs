pub mod account;
pub mod itinerary;
pub mod trip;
pub mod trip_shares;

pub use account::AccountRepository;
pub use itinerary::ItineraryRepository;
pub use trip::TripRepository;
pub use trip_shares::TripShareRepository;
