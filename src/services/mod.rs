pub mod auth;
pub mod overlap;
pub mod reservation;
pub mod spots;
pub mod sweeper;
pub mod users;
pub mod vehicles;
