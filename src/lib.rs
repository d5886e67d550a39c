//! A small Rust client for spreadsheet XML cell feeds.
//!
//! This crate implements a read-only feed flow:
//! authenticate, GET a feed, coerce the XML into a value tree, then project
//! the tree onto rows and cells.
//!
//! ## Quick start
//! - Configure authentication via environment variables (`SHEETFEED_TOKEN`, or
//!   `SHEETFEED_CLIENT_ID` / `SHEETFEED_CLIENT_SECRET` / `SHEETFEED_REFRESH_TOKEN`)
//!   or a `.sheetfeedrc` file (supported in the current directory and in your home directory).
//! - Call [`Spreadsheet::receive`] to read every cell of the worksheet.
//!
//! ```no_run
//! use anyhow::Result;
//! use sheetfeed::{ReceiveOptions, Spreadsheet};
//!
//! fn main() -> Result<()> {
//!     let mut sheet = Spreadsheet::from_env()?;
//!     let (rows, info) = sheet.receive(&ReceiveOptions::default(), None)?;
//!     println!("{} has {} rows, next free row is {}", info.worksheet_title, info.total_rows, info.next_row);
//!     for (row, cells) in &rows {
//!         for (col, value) in cells {
//!             println!("R{}C{} = {}", row, col, value);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Lower layers are public too: [`Spreadsheet::request`] returns the raw
//! [`xml::Value`] tree of any feed URL, and [`xml::parse`] works on any XML
//! document.

#![forbid(unsafe_code)]

mod auth;
mod client;
mod config;
mod error;
pub mod feed;
mod transport;
mod util;
pub mod xml;

pub use auth::{AuthParams, AuthToken, Authenticator, DEFAULT_TOKEN_URL, OAuth2Refresh};
pub use client::{Protocol, RequestOptions, Spreadsheet, SpreadsheetOptions};
pub use error::{BoxError, Error};
pub use feed::{FeedInfo, ReceiveOptions, Rows, SheetRef, WorksheetMetadata};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Query, Transport};
