pub async fn index() -> &'static str {
    "Welcome to VerseVault Backend!"
}

pub async fn health() -> &'static str {
    "ok"
}
