//! Terminal output for the demo

use console::style;
use powerbi_auth::{AuthenticationSession, Authenticator};

/// Print the client id and scopes about to be used
pub fn print_banner(authenticator: &Authenticator) {
    println!();
    println!("{}", style("Power BI sign-in").bold().cyan());
    println!("  {} {}", style("Client id:").dim(), authenticator.client_id());
    for scope in authenticator.scopes() {
        println!("  {} {}", style("Scope:").dim(), scope);
    }
    println!();
}

/// Print what the session exposes
pub fn print_session(session: &AuthenticationSession, show_token: bool) {
    println!();
    println!("{}", style("✓ Signed in").green().bold());
    print_token(session, show_token);

    let details = session.access_token_details();
    let mut keys: Vec<&String> = details.as_map().keys().collect();
    keys.sort();
    println!(
        "  {} {}",
        style("Payload keys:").dim(),
        keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
    );
}

/// Print the session after a refresh
pub fn print_refreshed(session: &AuthenticationSession, show_token: bool) {
    println!();
    println!("{}", style("✓ Token refreshed").green().bold());
    print_token(session, show_token);
}

fn print_token(session: &AuthenticationSession, show_token: bool) {
    if show_token {
        println!("  {} {}", style("Access token:").dim(), session.access_token());
    } else {
        let token = session.access_token();
        let preview: String = token.chars().take(12).collect();
        println!(
            "  {} {preview}... ({} chars)",
            style("Access token:").dim(),
            token.len()
        );
    }

    match session.remaining_validity() {
        Some(remaining) => {
            let mins = remaining.as_secs() / 60;
            let secs = remaining.as_secs() % 60;
            println!("  {} {mins}m {secs}s", style("Expires in:").dim());
        }
        None => println!("  {} unknown", style("Expires in:").dim()),
    }
}
