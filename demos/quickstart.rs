use std::sync::Arc;

use accountable_http::{AuthenticatedClient, Config, CredentialPair, Error, MemoryCredentialStore};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional: enable basic logging for the example
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    // Reads ACCOUNTABLE_API_URL and friends
    let cfg = Config::from_env()?;
    let store = Arc::new(MemoryCredentialStore::new());
    let client = AuthenticatedClient::from_config(&cfg, store)?;
    client.sign_in(CredentialPair::new(
        std::env::var("ACCOUNTABLE_ACCESS_TOKEN")?,
        std::env::var("ACCOUNTABLE_REFRESH_TOKEN").ok(),
    ));

    match client.get("/contracts", &[("role", "CONTRACTOR")]).await {
        Ok(contracts) => println!("{:?}", contracts),
        Err(Error::AuthExpired(msg)) => {
            client.sign_out();
            eprintln!("please sign in again: {}", msg);
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
