use posture_coach::app::{DashboardApp, headless};
use posture_coach::{AppError, CoordinatorBuilder, Settings};
use tracing::{Level, info};

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let settings = Settings::load()?;
    init_logging(settings.log_level());

    let headless_mode = settings.ui.headless;
    let coordinator = CoordinatorBuilder::new(settings).build()?;

    if headless_mode {
        info!("Starting headless");
        return headless::run(&coordinator).await;
    }

    coordinator.start().await;
    let orchestrator = coordinator.orchestrator();
    let runtime = tokio::runtime::Handle::current();
    // the window owns this thread until closed
    let result = tokio::task::block_in_place(|| DashboardApp::start_gui(orchestrator, runtime));
    coordinator.shutdown().await;
    result
}
