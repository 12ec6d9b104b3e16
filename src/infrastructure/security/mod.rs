pub mod keyring;

pub use self::keyring::{KeyringManager, SecretStore};
