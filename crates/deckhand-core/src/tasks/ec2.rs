//! EC2 host discovery through the AWS CLI
//!
//! Instances belong to an application group when they carry a tag (by
//! default `application-group`) whose value is the group name.

use serde::Deserialize;

use crate::command::{Arg, quote};
use crate::context::DeployContext;
use crate::remote::Remote;
use crate::session::Session;
use crate::Result;

/// Tag naming an instance's application group
pub const DEFAULT_EC2_TAG: &str = "application-group";

/// An instance in an application group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ec2Instance {
    pub instance_id: String,
    pub state: Option<String>,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub public_dns: Option<String>,
}

impl Ec2Instance {
    /// Best address to reach the instance: public DNS, then public IP,
    /// then private IP
    pub fn address(&self) -> Option<&str> {
        [&self.public_dns, &self.public_ip, &self.private_ip]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|a| !a.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTags {
    #[serde(default)]
    tags: Vec<TagDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TagDescription {
    resource_id: String,
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstances {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instance {
    instance_id: String,
    state: Option<InstanceState>,
    private_ip_address: Option<String>,
    public_ip_address: Option<String>,
    public_dns_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceState {
    name: String,
}

/// Resource ids tagged `tag = group` in `describe-tags` output
fn tagged_resources(json: &str, group: &str, tag: &str) -> Result<Vec<String>> {
    let tags: DescribeTags = serde_json::from_str(json)?;
    Ok(tags
        .tags
        .into_iter()
        .filter(|t| t.key == tag && t.value == group)
        .map(|t| t.resource_id)
        .collect())
}

/// Instances in `describe-instances` output, restricted to `ids`
fn parse_instances(json: &str, ids: &[String]) -> Result<Vec<Ec2Instance>> {
    let described: DescribeInstances = serde_json::from_str(json)?;
    Ok(described
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .filter(|i| ids.contains(&i.instance_id))
        .map(|i| Ec2Instance {
            instance_id: i.instance_id,
            state: i.state.map(|s| s.name),
            private_ip: i.private_ip_address,
            public_ip: i.public_ip_address,
            public_dns: i.public_dns_name,
        })
        .collect())
}

/// Instances whose `tag` equals `group`, found with the AWS CLI via `local`
pub fn ec2_cluster(local: &dyn Remote, group: &str, tag: &str) -> Result<Vec<Ec2Instance>> {
    let session = Session::new(local, DeployContext::new());

    let tags = session.run(Arg::literal(format!(
        "aws ec2 describe-tags --output json --filters {} {}",
        quote(&format!("Name=key,Values={}", tag))?,
        quote(&format!("Name=value,Values={}", group))?
    )))?;
    let ids = tagged_resources(&tags, group, tag)?;
    if ids.is_empty() {
        tracing::warn!("No EC2 resources tagged {}={}", tag, group);
        return Ok(Vec::new());
    }

    let mut command = String::from("aws ec2 describe-instances --output json --instance-ids");
    for id in &ids {
        command.push(' ');
        command.push_str(&quote(id)?);
    }
    let instances = session.run(Arg::literal(command))?;
    parse_instances(&instances, &ids)
}
