//! Error types for the graph engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Mutation error: {0}")]
    Mutation(#[from] crate::mutations::MutationError),

    #[error("Op error: {0}")]
    Op(#[from] crate::ot::OpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
