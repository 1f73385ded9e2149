use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;
use crate::pipeline::RecordingPipeline;

pub type GuardedPipeline = Arc<RecordingPipeline>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub pipeline: GuardedPipeline,
    pub hash: String,
}

impl ServerState {
    pub fn new(config: ServerConfig, pipeline: GuardedPipeline, hash: impl Into<String>) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            pipeline,
            hash: hash.into(),
        }
    }
}

impl FromRef<ServerState> for GuardedPipeline {
    fn from_ref(input: &ServerState) -> Self {
        input.pipeline.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
