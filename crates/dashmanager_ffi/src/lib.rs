//! Flutter bridge surface for the dashboard core.

pub mod api;
