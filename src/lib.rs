//! Client SDK for the MegaKassa payment gateway.
//!
//! MegaKassa is an HTTP JSON API: every request is a GET with the
//! parameters in the query string plus an MD5 `sign` digest, and payment
//! outcomes come back as signed forms posted to the shop's callback URL.
//! This crate covers both directions:
//!
//! - [`client::Megakassa`] calls the merchant API: payment method and
//!   balance queries, withdraw creation, withdraw history.
//! - [`callback`] validates inbound callbacks and hands back a typed
//!   payload once the signature and every field check out.
//! - [`filter`] screens callback traffic by sender address before the
//!   handler runs.
//!
//! # Calling the API
//!
//! ```no_run
//! use megakassa::client::Megakassa;
//! use megakassa::models::{CreateWithdraw, Currency};
//!
//! # async fn demo() -> megakassa::MegakassaResult<()> {
//! let client = Megakassa::new(42, "secret");
//! let balance = client.balance().await?;
//!
//! let withdraw = CreateWithdraw::new(2, Currency::Rub, "410011234567890")
//!     .amount(500.0)
//!     .comment("weekly payout");
//! let created = client.create_withdraw(withdraw).await?;
//! # let _ = (balance, created);
//! # Ok(())
//! # }
//! ```
//!
//! # Verifying a callback
//!
//! ```
//! use megakassa::callback::CallbackForm;
//!
//! fn handle(form: CallbackForm) {
//!     match form.validate("secret") {
//!         Ok(payload) if payload.is_success() => { /* credit the order */ }
//!         Ok(_) => { /* nothing was paid */ }
//!         Err(errors) => println!("rejected: {errors}"),
//!     }
//! }
//! ```

pub mod callback;
pub mod client;
pub mod errors;
pub mod filter;
pub mod models;
pub mod sign;

pub use client::Megakassa;
pub use errors::{MegakassaError, MegakassaResult};
