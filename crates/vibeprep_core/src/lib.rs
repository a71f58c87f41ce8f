pub mod auth;
pub mod calendar;
pub mod domain;
pub mod error;
pub mod otp;
pub mod ports;
pub mod slots;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use auth::AuthService;
pub use calendar::CalendarService;
pub use domain::{
    CalendarDay, Claims, DayKey, LoginGrant, NewUser, OptimizationRequest, OptimizedSchedule,
    PendingVerification, SignupForm, Slot, Task, TaskFilter, TaskHit, TaskPriority, TaskStatus,
    User,
};
pub use error::{ServiceError, ServiceResult};
pub use ports::{
    CalendarRepository, CredentialHasher, CredentialStore, NotificationService, OtpGenerator,
    OutgoingEmail, PortError, PortResult, ScheduleOptimizationService, TokenService,
};
