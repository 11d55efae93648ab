//! Sessions, identity resolution and role policy for the dashboard.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod resolver;
mod authorizer;

pub use principal::{Identity, Profile};
pub use session::{Session, SessionState, SessionStore, SessionToken, Subscription};
pub use provider::{AuthEvent, AuthListener, AuthListeners, AuthProvider, ProviderSubscription};
pub use resolver::{role_names, Filter, IdentityResolver, RelationalStore, ResolveError, Row, PROFILE_TABLE, ROLE_TABLE};
pub use authorizer::{decide, is_allowed, Decision, Role, ViewRequirement};
