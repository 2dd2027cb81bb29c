pub mod dashboard_app;
pub mod headless;
pub mod views;

pub use dashboard_app::DashboardApp;
pub use views::camera_view::CameraView;
pub use views::result_view::ResultView;
