//! Unit tests for the channel module.

mod fixtures;
mod ssh;
mod upload;
