mod client;
pub mod page;
pub mod xml;

pub use client::PmcClient;
