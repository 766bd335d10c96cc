//! Commands with SSH agent forwarding
//!
//! Runs the system `ssh` with `-A` from the operator's machine, after making
//! sure the agent holds a key.

use crate::command::{Arg, quote};
use crate::context::DeployContext;
use crate::remote::{Remote, parse_ssh_target};
use crate::session::Session;
use crate::Result;

/// Local shell line running `command` on `host` with agent forwarding
pub fn agent_command(host: &str, command: &str) -> Result<String> {
    let target = parse_ssh_target(host);
    let port = match target.port {
        Some(port) => format!("-p {} ", port),
        None => String::new(),
    };

    Ok(format!(
        "ssh-add && ssh-add -l && ssh {}-A {} {}",
        port,
        quote(&target.destination())?,
        quote(command)?
    ))
}

/// Run `command` on `host` with agent forwarding, through `local`
pub fn agent_run(local: &dyn Remote, host: &str, command: &str) -> Result<String> {
    let line = agent_command(host, command)?;
    Session::new(local, DeployContext::new()).run(Arg::literal(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RecordingRemote;

    #[test]
    fn test_agent_command() {
        assert_eq!(
            agent_command("web1", "git pull").unwrap(),
            "ssh-add && ssh-add -l && ssh -A web1 'git pull'"
        );
        assert!(
            agent_command("deploy@web1", "id")
                .unwrap()
                .contains("deploy@web1")
        );
        assert_eq!(
            agent_command("web1:2222", "uptime").unwrap(),
            "ssh-add && ssh-add -l && ssh -p 2222 -A web1 uptime"
        );
    }

    #[test]
    fn test_agent_run_goes_through_local() {
        let local = RecordingRemote::labelled("localhost");

        agent_run(&local, "web1", "hostname").unwrap();

        assert_eq!(
            local.commands(),
            vec!["ssh-add && ssh-add -l && ssh -A web1 hostname"]
        );
    }
}
