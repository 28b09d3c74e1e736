#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod export;
pub mod formats;
pub mod gateway;
pub mod html;
pub mod letters;
pub mod locale;
pub mod logging;
pub mod output;
pub mod quiz;
pub mod session;
pub mod terminology;
pub mod translate;
