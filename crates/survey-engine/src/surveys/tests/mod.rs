mod common;
mod listing;
