//! Service account provisioning
//!
//! A service account is a system user with a home under `/srv` (by default),
//! a managed `authorized_keys2` and a per-user runit supervisor that runs the
//! services found in `{home}/service`.

use crate::command::Arg;
use crate::materialize::UploadOptions;
use crate::session::Session;
use crate::{Error, Result};

/// Header of the managed `authorized_keys2` file
pub const AUTHORIZED_KEYS_HEADER: &str = "# DO NOT EDIT, MANAGED BY deckhand";

const RUNIT_RUNFILE: &str = "#!/bin/sh\n\
exec 2>&1\n\
exec chpst -u{acct} runsvdir {home}/service\n";

const RUNIT_LOG_RUNFILE: &str = "#!/bin/sh\n\
exec chpst -u{acct} svlogd -tt {runit_log_dir}/\n";

/// Resolved account name and home directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub acct: String,
    pub home: String,
}

impl Account {
    /// Resolve the account from explicit values, falling back to the
    /// `acct` and `home` variables; `home` defaults to `/srv/<acct>`
    pub fn resolve(session: &Session<'_>, acct: Option<&str>, home: Option<&str>) -> Result<Self> {
        let ctx = session.context();
        let acct = acct
            .or_else(|| ctx.get("acct"))
            .ok_or_else(|| Error::missing_substitution("acct"))?
            .to_string();
        let home = home
            .or_else(|| ctx.get("home"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("/srv/{}", acct));

        Ok(Self { acct, home })
    }

    /// A session whose `acct` and `home` variables are this account's
    pub fn session<'r>(&self, session: &Session<'r>) -> Session<'r> {
        session.derive([("acct", self.acct.as_str()), ("home", self.home.as_str())])
    }
}

/// Create the account, its home and its managed SSH keys
pub fn setup_user_account(
    session: &Session<'_>,
    account: &Account,
    authorized_keys: Option<&[String]>,
) -> Result<()> {
    let user = account.session(session);
    tracing::info!(host = %user.host(), "Setting up account {} at {}", account.acct, account.home);

    user.sudo(Arg::template(
        "id -u {acct} >/dev/null 2>&1 || yes '' | adduser --shell /bin/bash \
         --quiet --disabled-password --home {home} {acct}",
    ))?;
    user.sudo(Arg::template("mkdir -m 700 -p {home}/.ssh"))?;

    if let Some(authorized_keys) = authorized_keys {
        let content = format!("{}\n{}", AUTHORIZED_KEYS_HEADER, authorized_keys.join("\n"));
        user.put_string(
            Arg::literal(content),
            Arg::template("{home}/.ssh/authorized_keys2"),
            &UploadOptions::sudo().with_mode("600"),
        )?;
    }

    user.sudo(Arg::template("chown -R {acct}:{acct} {home}"))?;
    Ok(())
}

/// Register a per-user runit supervisor with svlogd logging
pub fn setup_user_runit(session: &Session<'_>, account: &Account) -> Result<()> {
    let mut user = account.session(session);
    let log_dir = user.render(&Arg::template("{home}/shared/log/runit"))?;
    user.context_mut().set("runit_log_dir", log_dir);

    user.sudo(Arg::template("mkdir -p {runit_log_dir}"))?;
    user.sudo(Arg::template("mkdir -p {home}/shared {home}/service"))?;
    user.sudo(Arg::template("chown -R {acct}:{acct} {home}"))?;

    user.sudo(Arg::template("mkdir -p /etc/service/{acct}/log"))?;
    user.sudo(Arg::template("mkdir -p /etc/sv/{acct}"))?;
    user.sudo(Arg::template("ln -sf /etc/service/{acct}/run /etc/sv/{acct}/run"))?;
    user.sudo(Arg::template("ln -sf /etc/service/{acct}/log /etc/sv/{acct}/log"))?;

    user.put_string(
        Arg::template(RUNIT_RUNFILE),
        Arg::template("/etc/service/{acct}/run"),
        &UploadOptions::sudo(),
    )?;
    user.put_string(
        Arg::template(RUNIT_LOG_RUNFILE),
        Arg::template("/etc/service/{acct}/log/run"),
        &UploadOptions::sudo(),
    )?;

    for file in ["/etc/service/{acct}/run", "/etc/service/{acct}/log/run"] {
        user.sudo(Arg::template(format!("chown root:root {}", file)))?;
    }
    for file in ["/etc/service/{acct}/run", "/etc/service/{acct}/log/run"] {
        user.sudo(Arg::template(format!("chmod 755 {}", file)))?;
    }
    Ok(())
}

/// Create the account and its runit supervisor
pub fn setup_user(
    session: &Session<'_>,
    account: &Account,
    authorized_keys: Option<&[String]>,
) -> Result<()> {
    setup_user_account(session, account, authorized_keys)?;
    setup_user_runit(session, account)
}
