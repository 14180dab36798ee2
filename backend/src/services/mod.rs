pub mod identity;
pub mod notifier;
pub mod registrar;
pub mod reminder;

pub use identity::{GoogleIdentityResolver, IdentityResolver, PgUserDirectory, ResolutionError, UserDirectory};
pub use notifier::{FcmNotifier, Notifier, SendError};
pub use registrar::{RegistrationError, SessionRegistrar};
pub use reminder::{
    DispatchGuard, FailedDispatch, FireOutcome, GuardError, ReminderScheduler, TickEvaluator,
    TickReport,
};
