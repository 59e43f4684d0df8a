//! This crate fetches the "scone of the day" calendar of Arizmendi Bakery in San Rafael,
//! filters the scones by ingredients and publishes them as calendar events.
//! It also builds a cumulative history of every scone ever served.
//!
//! The dates are read from <http://www.arizmendi-sanrafael.com/api/open/GetItemsByMonth>.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod publisher;
pub mod retry;
pub mod scone_client;
pub mod time_window;

pub use error::{Result, SconeError};
