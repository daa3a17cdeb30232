use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = otpauth::config::Cli::parse();
    otpauth::run(cli)
}
