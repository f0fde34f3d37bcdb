//! HTTP transport used by the game-record wrappers and resource sync.

mod client;
mod reqwest_client;

pub use client::{Headers, HttpClient, HttpError, Params};
pub use reqwest_client::ReqwestClient;
