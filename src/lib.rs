pub mod backend;
pub mod core;
pub mod models;
pub mod session;

#[cfg(test)]
mod test_support;

pub use crate::backend::http::HttpExamBackend;
pub use crate::backend::{AttemptBundle, ExamBackend};
pub use crate::core::config::Settings;
pub use crate::session::violations::{ExamSignal, SignalSource};
pub use crate::session::{
    ExamSession, SessionError, SessionEvent, SessionStart, SessionTuning, SubmitTrigger,
};

/// One-call process setup for embedders: loads `.env`, reads settings, and
/// installs tracing plus the optional Prometheus recorder.
pub fn init() -> anyhow::Result<Settings> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    crate::core::telemetry::init_tracing(&settings)?;
    crate::core::metrics::init(&settings)?;

    Ok(settings)
}
