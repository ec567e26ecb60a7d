use anyhow::Result;

use crate::config::Config;

pub(crate) fn cmd_user_add(config: &Config, name: &str, secret: &str, json: bool) -> Result<()> {
    let mut credentials = config.credentials()?;
    credentials.set(name, secret)?;
    credentials.save(&config.credentials_path)?;

    if json {
        println!("{}", serde_json::json!({ "user": name.trim() }));
    } else {
        println!("Saved credentials for {}", name.trim());
    }

    Ok(())
}

pub(crate) fn cmd_user_list(config: &Config, json: bool) -> Result<()> {
    let credentials = config.credentials()?;
    let users: Vec<&str> = credentials.users().collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
    } else if users.is_empty() {
        eprintln!("No users configured. Add one with `weighboard user add <name> <secret>`.");
    } else {
        for user in users {
            println!("{user}");
        }
    }

    Ok(())
}
