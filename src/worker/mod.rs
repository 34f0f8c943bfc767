pub mod balance_rules;
pub mod batch;
pub mod fallback;
pub mod finder;
pub mod internal;
pub mod notifier;
pub mod synchronizer;
pub mod tenant_cache;
pub mod withdraw;

pub use fallback::FallbackWorker;
pub use finder::Finder;
pub use internal::InternalWorker;
pub use notifier::Notifier;
pub use synchronizer::Synchronizer;
pub use withdraw::WithdrawWorker;
