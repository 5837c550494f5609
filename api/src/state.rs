use std::sync::Arc;

use gateway_crawler::CrawlerRegistry;
use gateway_processor::TaskProcessor;
use gateway_staging::StagingService;
use gateway_state::JobStore;

/// Shared application state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub staging: Arc<StagingService>,
    pub crawlers: CrawlerRegistry,
    pub processor: Arc<TaskProcessor>,
    pub default_engine_name: String,
    pub ffmpeg_program: String,
}
