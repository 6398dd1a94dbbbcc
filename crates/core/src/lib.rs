//! OmniVerse Core
//!
//! Module dispatch, action-tag routing and conversation memory for the
//! OmniVerse chat service. Text, image and speech generation and the record
//! store are collaborators behind traits; the HTTP service wires real
//! implementations in.

pub mod conversation;
pub mod directive;
pub mod dispatcher;
pub mod greeting;
pub mod llm_client;
pub mod media;
pub mod module;
pub mod outcome;
pub mod prompt;
pub mod router;
pub mod session;
pub mod settings;
pub mod store;

pub use dispatcher::Dispatcher;
pub use module::ModuleId;
pub use outcome::ResponseOutcome;
pub use router::{RoutedResponse, route_response};
pub use session::{ChatSession, SessionError, SessionServices, SubmitResult};
pub use settings::Settings;
