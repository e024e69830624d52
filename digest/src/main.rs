use digest::errors::DigestError;
use digest::launcher;

#[tokio::main]
async fn main() -> Result<(), DigestError> {
    launcher::launch("config/settings").await
}
