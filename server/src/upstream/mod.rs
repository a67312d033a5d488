pub mod client;

pub use client::{ArrClient, RequestOptions};
