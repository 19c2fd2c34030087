use anyhow::{Context, anyhow};
use argon2::{Argon2, PasswordHasher};
use argon2::password_hash::{SaltString, rand_core::OsRng};

/// Usage: hashpass <password> [username]
///
/// Prints the PHC string, plus a seed statement when a username is given.
fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let password = args.next().context("Usage: hashpass <password> [username]")?;
    let username = args.next();

    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("hashing failed: {e}"))?
        .to_string();

    println!("{phc}");

    if let Some(username) = username {
        let username = username.replace('\'', "''");
        println!(
            "INSERT INTO admin_user (username, display_name, password_hash, role) \
             VALUES ('{username}', '{username}', '{phc}', 1);"
        );
    }
    Ok(())
}
