pub mod cases;
pub mod dashboard;
pub mod files;
pub mod interventions;
pub mod meetings;
pub mod resource;
pub mod sessions;
pub mod students;
pub mod users;

pub use cases::CaseService;
pub use dashboard::DashboardService;
pub use files::FileService;
pub use interventions::InterventionService;
pub use meetings::MeetingService;
pub use resource::{EntityDef, Resource};
pub use sessions::SessionService;
pub use students::StudentService;
pub use users::UserService;
