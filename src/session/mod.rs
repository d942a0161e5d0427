mod refresher;
mod store;

pub use refresher::{REFRESH_PATH, SessionRefresher};
pub use store::{CredentialPair, CredentialStore, MemoryCredentialStore};
