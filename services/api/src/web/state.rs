//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use vibeprep_core::{AuthService, CalendarService, ScheduleOptimizationService};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub calendar: Arc<CalendarService>,
    /// `None` when no LLM key is configured; the optimize endpoint then answers 503.
    pub optimizer: Option<Arc<dyn ScheduleOptimizationService>>,
    pub config: Arc<Config>,
}
