//! Request handlers.
//!
//! Handlers decode the request, resolve the calling [`Actor`] from the
//! bearer token, delegate to the [`HearingComposer`] and map errors via
//! [`AppError`].
//!
//! [`Actor`]: hearing_core::visibility::Actor
//! [`HearingComposer`]: hearing_core::composer::HearingComposer
//! [`AppError`]: crate::error::AppError

pub mod hearing;
