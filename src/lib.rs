pub mod config;
pub mod engine;
pub mod error;
pub mod hex;
pub mod otp;
pub mod store;
pub mod token;

pub use engine::{Decision, PinValidator};
pub use error::{Error, Result};

pub fn run(cli: config::Cli) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .init();

    let config = config::Config {
        users_file: cli.users_file.clone(),
        max_offset: cli.max_offset,
        max_linger: cli.max_linger,
    };

    if let Some(realm) = &cli.realm {
        match engine::get_realm_hash(&config, &cli.username, realm)? {
            Some(hash) => {
                println!("{hash}");
                Ok(())
            }
            None => anyhow::bail!("user \"{}\" not found", cli.username),
        }
    } else {
        let otp = cli
            .otp
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("an OTP argument is required unless --realm is given"))?;
        match engine::check_password(&config, None, &cli.username, otp)? {
            engine::Decision::Granted => {
                println!("granted");
                Ok(())
            }
            engine::Decision::Denied => anyhow::bail!("denied"),
            engine::Decision::UserNotFound => {
                anyhow::bail!("user \"{}\" not found", cli.username)
            }
        }
    }
}
