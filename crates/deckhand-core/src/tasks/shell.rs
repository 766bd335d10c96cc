//! Small shell helpers: init-file aliases, pid files, in-place sed

use crate::command::{Arg, quote};
use crate::session::Session;
use crate::Result;

/// Alias lines appended by [`install_bash_aliases`]
pub const BASH_ALIASES: &[&str] = &[
    r#"alias psa="ps faux |egrep ^`egrep ^$USER /etc/passwd | cut -f3 -d:`""#,
    r#"alias activate="source ~/bin/activate""#,
];

/// Append the helper aliases to `initfile` unless already present
pub fn install_bash_aliases(session: &Session<'_>, initfile: &str) -> Result<()> {
    let file = quote(initfile)?;
    for line in BASH_ALIASES {
        let line = quote(line)?;
        session.run(Arg::literal(format!(
            "grep -qxF {line} {file} || echo {line} >> {file}"
        )))?;
    }
    Ok(())
}

/// Signal the process recorded in `pidfile`
///
/// Returns `false` (and only warns) when the pid file does not exist.
pub fn kill(
    session: &Session<'_>,
    pidfile: Arg,
    remove_pidfile: bool,
    signal: Option<&str>,
) -> Result<bool> {
    let pidfile = session.render(&pidfile)?;
    if !session.exists(Arg::literal(pidfile.as_str()))? {
        tracing::warn!(host = %session.host(), "PID file {} does not exist", pidfile);
        return Ok(false);
    }

    let quoted = quote(&pidfile)?;
    let command = match signal {
        Some(signal) => format!("kill -{} $(cat {})", quote(signal)?, quoted),
        None => format!("kill $(cat {})", quoted),
    };
    session.run(Arg::literal(command))?;

    if remove_pidfile {
        session.run(Arg::literal(format!("rm -f {}", quoted)))?;
    }
    Ok(true)
}

/// Run the sed expression `expr` in place on `file`
pub fn sed(session: &Session<'_>, file: Arg, expr: &str) -> Result<()> {
    let file = session.render(&file)?;
    session.run(Arg::literal(format!(
        "sed -i {} {}",
        quote(expr)?,
        quote(&file)?
    )))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DeployContext;
    use crate::remote::{CommandOutput, RecordingRemote};

    fn context() -> DeployContext {
        DeployContext::new().with([("home", "/srv/app")])
    }

    #[test]
    fn test_install_bash_aliases_is_guarded() {
        let remote = RecordingRemote::new();
        let session = Session::new(&remote, context());

        install_bash_aliases(&session, ".profile").unwrap();

        let commands = remote.commands();
        assert_eq!(commands.len(), BASH_ALIASES.len());
        for command in &commands {
            assert!(command.starts_with("grep -qxF "));
            assert!(command.ends_with(" >> .profile"));
        }
        assert!(commands[1].contains("source ~/bin/activate"));
    }

    #[test]
    fn test_kill_with_signal_and_cleanup() {
        let remote = RecordingRemote::new();
        let session = Session::new(&remote, context());

        let killed = kill(
            &session,
            Arg::template("{home}/shared/run/redis.pid"),
            true,
            Some("HUP"),
        )
        .unwrap();

        assert!(killed);
        assert_eq!(
            remote.commands(),
            vec![
                "test -e /srv/app/shared/run/redis.pid",
                "kill -HUP $(cat /srv/app/shared/run/redis.pid)",
                "rm -f /srv/app/shared/run/redis.pid",
            ]
        );
    }

    #[test]
    fn test_kill_missing_pidfile_only_warns() {
        let remote = RecordingRemote::new();
        remote.respond("test -e", CommandOutput::failed(1, ""));
        let session = Session::new(&remote, context());

        let killed = kill(&session, Arg::literal("/tmp/x.pid"), true, None).unwrap();

        assert!(!killed);
        assert_eq!(remote.commands(), vec!["test -e /tmp/x.pid"]);
    }

    #[test]
    fn test_kill_keeps_pidfile() {
        let remote = RecordingRemote::new();
        let session = Session::new(&remote, context());

        kill(&session, Arg::literal("/tmp/x.pid"), false, None).unwrap();

        assert_eq!(
            remote.commands(),
            vec!["test -e /tmp/x.pid", "kill $(cat /tmp/x.pid)"]
        );
    }

    #[test]
    fn test_sed_quotes_expression() {
        let remote = RecordingRemote::new();
        let session = Session::new(&remote, context());

        sed(&session, Arg::template("{home}/etc/app.conf"), "s/a b/c/").unwrap();

        assert_eq!(
            remote.commands(),
            vec!["sed -i 's/a b/c/' /srv/app/etc/app.conf"]
        );
    }
}
