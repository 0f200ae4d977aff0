//! Data model and wire types shared by the server, the client and the
//! capture components.

pub mod api;
pub mod models;
