pub mod client;

pub use client::NotifyClient;
