//! Remote inference endpoint
//!
//! Request/response shape of the `/predict` endpoint and a transport-free
//! handler. Any HTTP server can wrap [`handle_predict_json`]; the CLI's
//! `predict` command calls it directly.

pub mod service;

pub use service::{handle_predict, handle_predict_json, PredictReply, PredictRequest, PredictResponse, PREDICT_PATH};
