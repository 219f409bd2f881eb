pub mod reservation;
pub mod spot;
pub mod user;
pub mod vehicle;

pub use reservation::{Payment, Reservation, ReservationStatus};
pub use spot::{CapacityModel, SlotEntry, SlotInfo, SlotStatus, Spot};
pub use user::User;
pub use vehicle::Vehicle;
