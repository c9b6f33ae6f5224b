mod envelope;
pub use self::envelope::{Envelope, EnvelopeStatus};

mod admin;
pub use self::admin::{AdminFile, AdminReport, AdminUser};

mod user;
pub use self::user::{UserFile, UserProfile};
