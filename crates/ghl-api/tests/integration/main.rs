//! Integration tests for ghl-api
//!
//! Uses wiremock to simulate the GoHighLevel API and drives the real
//! reqwest transport through the request engine and resource clients.

mod common;

mod test_client;
mod test_pagination;
mod test_resources;
