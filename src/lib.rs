pub mod api;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod domain;
pub mod output;
pub mod pagination;
pub mod reconciler;

#[cfg(test)]
mod tests;
