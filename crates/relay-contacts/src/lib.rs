//! relay-contacts: spreadsheet contacts and the startup broadcast
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_contacts::send_bulk_from_spreadsheet;
//!
//! let summary = send_bulk_from_spreadsheet(&api, "contacts.xlsx").await?;
//! println!("sent {} templates", summary.sent);
//! ```

pub mod broadcast;
pub mod error;
pub mod spreadsheet;

pub use broadcast::{broadcast_template, send_bulk_from_spreadsheet, BroadcastSummary};
pub use error::{ContactsError, Result};
pub use spreadsheet::{read_phone_numbers, PHONE_COLUMN};
