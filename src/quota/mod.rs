// Quota rotation: spreading quota-limited API calls over a pool of keys.
//
// `fetcher` holds the rotation loop, `attempt` the outcome types and fatal
// error policy, `pagination` the single-credential cursor loop, and
// `credential` the key type plus env/database loading.

pub mod attempt;
pub mod credential;
pub mod fetcher;
pub mod pagination;

pub use attempt::{AttemptResult, FatalClass, FatalError, FatalPolicy, OnFatal};
pub use credential::Credential;
pub use fetcher::{Deadline, FetchError, QuotaRotatingFetcher};
pub use pagination::Page;
