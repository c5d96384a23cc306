//! Twitter Token Refresh Utility
//!
//! This script helps you refresh the OAuth 2.0 User Context access token used
//! for auto-posting when it expires, and prints the values to store in the
//! repository secrets.

use std::io::{self, Write};

use threadsmith::config::ApiEndpoints;
use threadsmith::TwitterCredentials;

fn prompt(label: &str) -> io::Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("🔄 Twitter Token Refresh Utility");
    println!("================================");

    let client_id = prompt("Enter your Twitter App Client ID")?;
    let client_secret = prompt("Enter your Twitter App Client Secret")?;
    let refresh_token = prompt("Enter your refresh token")?;

    if client_id.is_empty() || client_secret.is_empty() || refresh_token.is_empty() {
        println!("❌ Client ID, client secret and refresh token are all required!");
        return Err("missing credentials".into());
    }

    let mut credentials = TwitterCredentials {
        access_token: String::new(),
        refresh_token: Some(refresh_token),
        client_id: Some(client_id),
        client_secret: Some(client_secret),
    };

    println!("\n🔄 Refreshing access token...");
    let client = reqwest::Client::new();
    credentials
        .refresh_access_token(&client, &ApiEndpoints::default().twitter_token_url)
        .await?;

    println!("\n✅ Success! Update your repository secrets:");
    println!(
        "   gh secret set TWITTER_ACCESS_TOKEN --body \"{}\"",
        credentials.access_token
    );
    if let Some(refresh_token) = &credentials.refresh_token {
        println!(
            "   gh secret set TWITTER_REFRESH_TOKEN --body \"{}\"",
            refresh_token
        );
        println!("\n⚠️  IMPORTANT: Your old refresh token is now invalid!");
    }

    Ok(())
}
