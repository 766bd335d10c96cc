//! Host listing commands

use clap::Args;
use deckhand_core::remote::CommandOutput;
use deckhand_core::tasks::{self, DEFAULT_EC2_TAG};
use miette::Result;

use super::App;

/// Arguments for the ec2 command
#[derive(Debug, Args)]
pub struct Ec2Args {
    /// Application group to look up
    pub group: String,

    /// Tag holding the application group
    #[arg(long, default_value = DEFAULT_EC2_TAG)]
    pub tag: String,
}

/// Print every role and its hosts
pub fn print_hosts(app: &App) -> Result<()> {
    if app.config.roles.is_empty() {
        tracing::warn!("No roles configured in {}", app.config_dir);
    }
    for (role, hosts) in &app.config.roles {
        println!("{}:", role);
        for host in hosts {
            println!("  {}", host);
        }
    }
    Ok(())
}

/// Print the instances of an EC2 application group
pub fn ec2(app: &App, args: Ec2Args) -> Result<()> {
    let instances = app.with_local(
        |recorder| recorder.respond("describe-tags", CommandOutput::ok(r#"{"Tags": []}"#)),
        |local| tasks::ec2_cluster(local, &args.group, &args.tag),
    )?;

    for instance in &instances {
        println!(
            "{}\t{}\t{}",
            instance.instance_id,
            instance.state.as_deref().unwrap_or("-"),
            instance.address().unwrap_or("-")
        );
    }
    Ok(())
}
