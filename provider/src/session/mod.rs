pub mod context;
pub mod provider;
pub mod state;

pub use context::{ScoContext, with_scorm};
pub use provider::{LinkState, ProviderConfig, ScoreWrite, ScormError, ScormProvider};
pub use state::{CompletionStatus, Score, ScormState, ScormVersion, SuspendData};
