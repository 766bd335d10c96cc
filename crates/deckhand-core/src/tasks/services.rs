//! Service management: nginx vhosts, crontabs, runit services and Redis

use camino::{Utf8Path, Utf8PathBuf};

use crate::command::{Arg, quote};
use crate::materialize::UploadOptions;
use crate::session::Session;
use crate::{Error, Result};

/// Install `conf` as nginx vhost `name`, enable it and restart nginx
pub fn configure_nginx(session: &Session<'_>, conf: &Utf8Path, name: &str) -> Result<()> {
    let vhost = session.derive([("nginx_vhost_name", name)]);

    vhost.put_template(
        conf,
        Arg::template("/etc/nginx/sites-available/{nginx_vhost_name}"),
        &UploadOptions::sudo(),
    )?;
    vhost.sudo(Arg::template(
        "ln -sf /etc/nginx/sites-available/{nginx_vhost_name} \
         /etc/nginx/sites-enabled/{nginx_vhost_name}",
    ))?;
    vhost.sudo(Arg::literal("/etc/init.d/nginx restart"))?;
    Ok(())
}

/// Install the `crontab` variable as the remote user's crontab
///
/// Returns `false` without touching the host when `crontab` is unset or
/// empty.
pub fn deploy_crontab(session: &Session<'_>) -> Result<bool> {
    let crontab = match session.context().get("crontab") {
        Some(crontab) if !crontab.is_empty() => format!("{}\n\n", crontab),
        _ => {
            tracing::info!(host = %session.host(), "No crontab configured, skipping");
            return Ok(false);
        }
    };

    session.put_string(
        Arg::template(crontab),
        Arg::template("{home}/tmp/crontab"),
        &UploadOptions::default(),
    )?;
    session.run(Arg::template("crontab {home}/tmp/crontab"))?;
    Ok(true)
}

/// Run `sv <command> <service>` against the per-user service directory
pub fn sv(session: &Session<'_>, command: &str, service: &str) -> Result<String> {
    let svdir = session.render(&Arg::template("{home}/service"))?;
    session.run(Arg::literal(format!(
        "SVDIR={} sv {} {}",
        quote(&svdir)?,
        quote(command)?,
        quote(service)?
    )))
}

/// Create runit service `name` under `{home}/service` with `runfile` as run script
pub fn install_service(session: &Session<'_>, name: &str, runfile: Arg) -> Result<()> {
    let dir = session.render(&Arg::template("{home}/service"))?;
    let dir = format!("{}/{}", dir, name);

    session.run(Arg::literal(format!("mkdir -p {}", quote(&dir)?)))?;
    session.put_string(
        runfile,
        Arg::literal(format!("{}/run", dir)),
        &UploadOptions::default().with_mode("755"),
    )?;
    Ok(())
}

/// Default Redis source tarball
pub const DEFAULT_REDIS_SOURCE: &str = "http://redis.googlecode.com/files/redis-2.2.12.tar.gz";

/// Default Redis configuration template
pub const DEFAULT_REDIS_CONF: &str = "etc/redis.conf.template";

const REDIS_RUNFILE: &str = "#!/bin/bash\n\n\
REDIS={home}/redis/bin/redis-server\n\
CONF={home}/redis/etc/redis/redis.conf\n\
PID={home}/shared/run/redis.pid\n\
if [ -f $PID ]; then rm $PID; fi\n\
exec $REDIS $CONF\n";

/// Archive suffixes and the tar flags that unpack them
const ARCHIVE_FORMATS: &[(&str, &str)] = &[
    (".tar.gz", "zxf"),
    (".tgz", "zxf"),
    (".tar.bz2", "jxf"),
    (".tbz2", "jxf"),
    (".tar", "xf"),
];

/// Settings for [`install_redis`]
#[derive(Debug, Clone)]
pub struct RedisInstall {
    /// Local template of `redis.conf`
    pub conf: Utf8PathBuf,
    /// Source tarball URL
    pub source_url: String,
}

impl Default for RedisInstall {
    fn default() -> Self {
        Self {
            conf: Utf8PathBuf::from(DEFAULT_REDIS_CONF),
            source_url: DEFAULT_REDIS_SOURCE.to_string(),
        }
    }
}

/// Split an archive name into its unpacked directory and tar flags
fn archive_layout(archive: &str) -> Option<(&str, &'static str)> {
    ARCHIVE_FORMATS.iter().find_map(|(suffix, flags)| {
        archive
            .strip_suffix(suffix)
            .filter(|dir| !dir.is_empty())
            .map(|dir| (dir, *flags))
    })
}

/// Build Redis from source into `{home}/redis` and register it with runit
pub fn install_redis(session: &mut Session<'_>, options: &RedisInstall) -> Result<()> {
    let archive = options
        .source_url
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    let (src_dir, flags) = archive_layout(&archive).ok_or_else(|| {
        Error::task(
            format!("Unsupported Redis archive: '{}'", archive),
            "Use a .tar, .tar.gz, .tgz, .tar.bz2 or .tbz2 tarball",
        )
    })?;
    let src_dir = src_dir.to_string();

    session.run(Arg::template("mkdir -p {home}/redis/etc/redis"))?;
    session.run(Arg::template("mkdir -p {home}/redis/src"))?;
    session.put_template(
        &options.conf,
        Arg::template("{home}/redis/etc/redis/redis.conf"),
        &UploadOptions::default(),
    )?;

    session.cd(Arg::template("{home}/redis/src"), |s| {
        s.run(Arg::literal(format!("wget {}", quote(&options.source_url)?)))?;
        s.run(Arg::literal(format!("tar {} {}", flags, quote(&archive)?)))?;
        s.cd(Arg::literal(src_dir.as_str()), |s| {
            s.run(Arg::literal("make"))?;
            s.run(Arg::template("make PREFIX={home}/redis/ install"))?;
            Ok(())
        })
    })?;

    install_service(session, "redis", Arg::template(REDIS_RUNFILE))
}

/// Start the Redis runit service
pub fn start_redis(session: &Session<'_>) -> Result<String> {
    sv(session, "start", "redis")
}

/// Stop the Redis runit service
pub fn stop_redis(session: &Session<'_>) -> Result<String> {
    sv(session, "stop", "redis")
}
