//! HTTP adapters exposing the gateway to API callers.

pub mod scoring;
