//! Deployment tasks
//!
//! Every task takes a [`Session`](crate::session::Session) and composes its
//! commands through the session, so templates see the session's variables
//! and the active `cd` scope applies. Tasks that run on the operator's
//! machine (packaging, agent forwarding, EC2 discovery) take a
//! [`Remote`](crate::remote::Remote) that is normally a
//! [`LocalRemote`](crate::remote::LocalRemote).

pub mod accounts;
pub mod agent;
pub mod ec2;
pub mod packages;
pub mod services;
pub mod shell;
pub mod virtualenv;

pub use accounts::{Account, setup_user, setup_user_account, setup_user_runit};
pub use agent::{agent_command, agent_run};
pub use ec2::{DEFAULT_EC2_TAG, Ec2Instance, ec2_cluster};
pub use packages::build_packages;
pub use services::{
    RedisInstall, configure_nginx, deploy_crontab, install_redis, install_service, start_redis,
    stop_redis, sv,
};
pub use shell::{install_bash_aliases, kill, sed};
pub use virtualenv::{BootstrapOptions, bootstrap_virtualenv, vrun};
