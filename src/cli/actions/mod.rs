pub mod server;

use secrecy::SecretString;

/// Action to take after parsing the command line.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        secret_key: SecretString,
        domain: String,
    },
}
