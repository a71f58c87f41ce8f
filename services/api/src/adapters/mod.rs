pub mod db;
pub mod mailer;
pub mod password;
pub mod schedule_llm;
pub mod token;

pub use db::DbAdapter;
pub use mailer::{LogMailer, SmtpMailer};
pub use password::Argon2Hasher;
pub use schedule_llm::OpenAiScheduleAdapter;
pub use token::JwtTokenService;
