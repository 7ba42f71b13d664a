//! Command implementations, one module per command group.

pub mod audio;
pub mod auth;
pub mod devices;
pub mod icons;
pub mod playlists;
