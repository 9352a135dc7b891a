//! Dispatch layer for AI image and video generation.
//!
//! A [`dispatch::Dispatcher`] accepts a [`media::GenerationRequest`], picks a
//! provider from the [`registry`], checks and debits credits through
//! [`metering`], and gives inline results a durable home through [`persist`].
//! Vendor adapters live in [`providers`].

pub mod color;
pub mod config;
pub mod dispatch;
pub mod media;
pub mod metering;
pub mod persist;
pub mod providers;
pub mod registry;
pub mod utils;
