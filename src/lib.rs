#![allow(async_fn_in_trait)]
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod download;
pub mod error;
pub mod espa;
pub mod jobs;
pub mod logging;
pub mod order;
pub mod pipeline;
pub mod poller;
pub mod product_filter;
#[cfg(test)]
mod test_server;
pub mod unpack;
