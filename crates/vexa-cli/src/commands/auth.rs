//! Session commands.

use crate::app::{failed, App};

pub(crate) async fn login(app: &App, username: &str, password: &str) -> miette::Result<()> {
    let user = app
        .client
        .login(username, password)
        .await
        .map_err(|e| failed("log in", e))?;

    println!("Logged in as {}", user.username);
    Ok(())
}

pub(crate) async fn register(
    app: &App,
    username: &str,
    password: &str,
    email: Option<&str>,
) -> miette::Result<()> {
    let user = app
        .client
        .register(username, password, email)
        .await
        .map_err(|e| failed("register", e))?;

    println!("Account {} created.", user.username);
    println!();
    println!("To sign in, run:");
    println!("  vexa login {} --password <password>", user.username);
    Ok(())
}

pub(crate) fn logout(app: &App) -> miette::Result<()> {
    if !app.client.guard().is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }
    app.client.logout();
    println!("Logged out.");
    Ok(())
}

pub(crate) fn whoami(app: &App) -> miette::Result<()> {
    let Some(user) = app.client.guard().user() else {
        println!("Not logged in.");
        return Ok(());
    };

    println!("User:     {}", user.username);
    if let Some(email) = &user.email {
        println!("Email:    {}", email);
    }
    println!("Backend:  {}", app.client.base_url());
    Ok(())
}
