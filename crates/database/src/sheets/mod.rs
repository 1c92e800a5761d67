//! Google Sheets record store over the spreadsheet values API.
//!
//! Worksheets hold one header row followed by records. Dates are written as
//! `%Y-%m-%d %H:%M:%S` text in UTC.

pub mod auth;
pub mod client;
pub mod repository;
mod table;

pub use auth::{ServiceAccountAuth, SheetsAuth};
pub use client::SheetsClient;
pub use repository::SheetsRepository;
