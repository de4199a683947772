pub mod authenticator;
pub mod policy;
pub mod replay;

pub use authenticator::{AuthError, AuthMode, Authenticator, Credentials};
pub use policy::NetworkPolicy;
pub use replay::ReplayCache;
