//! Provider-agnostic view of a Dasein Cloud provider
//!
//! The harness never talks to a cloud directly. Everything goes through the
//! small [`CloudProvider`] surface defined here: capability queries plus
//! create/get/list/delete per [`ResourceKind`]. Real provider bindings live
//! outside this crate; [`crate::providers::memory`] ships a simulated one.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Provider-assigned resource identifier
pub type ResourceId = String;

/// Categories of cloud objects the harness provisions and tears down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// SSH keypair (identity)
    Keypair,
    /// Identity group
    Group,
    /// Identity user, usually a member of a group
    User,
    /// Virtual network
    Vlan,
    /// Subnet inside a VLAN
    Subnet,
    /// Firewall, optionally scoped to a VLAN
    Firewall,
    /// Reserved public IP address
    StaticIp,
    /// Load balancer fronting virtual machines
    LoadBalancer,
    /// Virtual machine (must reach a terminal state before its dependents go)
    VirtualMachine,
    /// Block volume
    Volume,
    /// Snapshot of a volume
    Snapshot,
    /// Machine image, usually captured from a virtual machine
    MachineImage,
    /// Blob storage bucket (container); may be nested under another bucket
    Bucket,
    /// Blob storage object inside a bucket
    Object,
    /// Managed relational database
    Database,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 15] = [
        ResourceKind::Keypair,
        ResourceKind::Group,
        ResourceKind::User,
        ResourceKind::Vlan,
        ResourceKind::Subnet,
        ResourceKind::Firewall,
        ResourceKind::StaticIp,
        ResourceKind::LoadBalancer,
        ResourceKind::VirtualMachine,
        ResourceKind::Volume,
        ResourceKind::Snapshot,
        ResourceKind::MachineImage,
        ResourceKind::Bucket,
        ResourceKind::Object,
        ResourceKind::Database,
    ];

    /// Get teardown priority (lower number = released first)
    ///
    /// Dependents go before the things they depend on:
    /// - 0: load balancers (before the VMs behind them)
    /// - 1: VMs and databases (before volumes, images, networks they use)
    /// - 2: images, snapshots, objects, users, static IPs
    /// - 3: volumes, buckets, groups, firewalls, subnets, keypairs
    /// - 4: VLANs (everything network-attached is gone by now)
    pub fn cleanup_priority(self) -> u8 {
        match self {
            ResourceKind::LoadBalancer => 0,
            ResourceKind::VirtualMachine | ResourceKind::Database => 1,
            ResourceKind::MachineImage
            | ResourceKind::Snapshot
            | ResourceKind::Object
            | ResourceKind::User
            | ResourceKind::StaticIp => 2,
            ResourceKind::Volume
            | ResourceKind::Bucket
            | ResourceKind::Group
            | ResourceKind::Firewall
            | ResourceKind::Subnet
            | ResourceKind::Keypair => 3,
            ResourceKind::Vlan => 4,
        }
    }

    /// Whether teardown must wait for this kind to disappear before
    /// releasing lower-priority kinds
    pub fn settles(self) -> bool {
        matches!(self, ResourceKind::VirtualMachine | ResourceKind::Database)
    }

    /// Longest generated name the kind accepts across common providers
    pub fn max_name_len(self) -> usize {
        match self {
            ResourceKind::Bucket => 63,
            ResourceKind::Object => 128,
            ResourceKind::VirtualMachine | ResourceKind::Database => 30,
            _ => 32,
        }
    }

    /// Whether generated names must be lowercase DNS-style labels
    pub fn dns_style_name(self) -> bool {
        matches!(self, ResourceKind::Bucket | ResourceKind::Database)
    }

    /// Short name used in generated resource names
    pub fn short_name(self) -> &'static str {
        match self {
            ResourceKind::Keypair => "key",
            ResourceKind::Group => "grp",
            ResourceKind::User => "usr",
            ResourceKind::Vlan => "vlan",
            ResourceKind::Subnet => "sub",
            ResourceKind::Firewall => "fw",
            ResourceKind::StaticIp => "ip",
            ResourceKind::LoadBalancer => "lb",
            ResourceKind::VirtualMachine => "vm",
            ResourceKind::Volume => "vol",
            ResourceKind::Snapshot => "snap",
            ResourceKind::MachineImage => "img",
            ResourceKind::Bucket => "bkt",
            ResourceKind::Object => "obj",
            ResourceKind::Database => "db",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Keypair => "keypair",
            ResourceKind::Group => "group",
            ResourceKind::User => "user",
            ResourceKind::Vlan => "VLAN",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Firewall => "firewall",
            ResourceKind::StaticIp => "static IP",
            ResourceKind::LoadBalancer => "load balancer",
            ResourceKind::VirtualMachine => "virtual machine",
            ResourceKind::Volume => "volume",
            ResourceKind::Snapshot => "snapshot",
            ResourceKind::MachineImage => "machine image",
            ResourceKind::Bucket => "bucket",
            ResourceKind::Object => "object",
            ResourceKind::Database => "database",
        };
        f.write_str(name)
    }
}

/// Resource states across all providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    Pending,
    Available,
    Stopped,
    Deleting,
    Deleted,
    Error(String),
    Unknown,
}

impl ResourceState {
    /// No further transition is expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResourceState::Deleted | ResourceState::Error(_))
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceState::Pending => f.write_str("pending"),
            ResourceState::Available => f.write_str("available"),
            ResourceState::Stopped => f.write_str("stopped"),
            ResourceState::Deleting => f.write_str("deleting"),
            ResourceState::Deleted => f.write_str("deleted"),
            ResourceState::Error(msg) => write!(f, "error ({})", msg),
            ResourceState::Unknown => f.write_str("unknown"),
        }
    }
}

/// What a provider reports about one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub name: Option<String>,
    pub region: Option<String>,
    /// Enclosing resource (bucket for objects, VLAN for subnets, ...)
    pub parent_id: Option<ResourceId>,
    /// Bucket owner or equivalent account-level owner
    pub owner: Option<String>,
    pub state: ResourceState,
    /// Can hold children (buckets, directories)
    pub is_container: bool,
    /// Number of direct children when known
    pub child_count: Option<usize>,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            region: None,
            parent_id: None,
            owner: None,
            state: ResourceState::Available,
            is_container: kind == ResourceKind::Bucket,
            child_count: None,
            created_at: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<ResourceId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_state(mut self, state: ResourceState) -> Self {
        self.state = state;
        self
    }

    pub fn with_child_count(mut self, count: usize) -> Self {
        self.child_count = Some(count);
        self
    }
}

/// Parameters for a create call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionParams {
    pub name: String,
    pub description: String,
    pub region: Option<String>,
    /// Enclosing resource, e.g. the bucket an object goes into
    pub parent_id: Option<ResourceId>,
    /// Kind-specific hints (CIDR, product, keypair id, member VMs, ...)
    pub attributes: BTreeMap<String, String>,
}

impl ProvisionParams {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("Dasein test resource {}", name),
            name,
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<ResourceId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// What a provider says up front about a resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    Supported,
    Unsupported,
    /// Provider can't tell without trying
    Unknown,
}

/// Connection parameters handed to a [`ProviderFactory`]
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderContext {
    pub provider_name: String,
    pub cloud_name: String,
    pub account: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub api_shared_key: Option<String>,
    pub api_secret_key: Option<String>,
}

impl fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderContext")
            .field("provider_name", &self.provider_name)
            .field("cloud_name", &self.cloud_name)
            .field("account", &self.account)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("api_shared_key", &self.api_shared_key.as_ref().map(|_| "<redacted>"))
            .field("api_secret_key", &self.api_secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The operations the harness needs from a provider implementation
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Provider name (e.g., "aws", "openstack", "memory")
    fn provider_name(&self) -> String;

    /// Cloud name within the provider (e.g., "us-east-1 public cloud")
    fn cloud_name(&self) -> String;

    /// Up-front capability report for a resource kind
    fn supports(&self, kind: ResourceKind) -> Capability;

    /// Whether the account can use the service backing `kind` at all
    async fn is_subscribed(&self, kind: ResourceKind) -> Result<bool>;

    /// Create a resource and return its identifier
    async fn create(&self, kind: ResourceKind, params: &ProvisionParams) -> Result<ResourceId>;

    /// Fetch one resource; `Ok(None)` when it doesn't exist
    async fn get(&self, kind: ResourceKind, id: &str) -> Result<Option<ResourceDescriptor>>;

    /// List resources of a kind, optionally under a parent
    async fn list(
        &self,
        kind: ResourceKind,
        parent_id: Option<ResourceId>,
    ) -> Result<Vec<ResourceDescriptor>>;

    /// Delete a resource
    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()>;

    /// End the session
    async fn close(&self) -> Result<()>;
}

/// Establishes provider sessions
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn connect(&self, ctx: &ProviderContext) -> Result<Arc<dyn CloudProvider>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_released_before_what_it_uses() {
        let vm = ResourceKind::VirtualMachine.cleanup_priority();
        for kind in [
            ResourceKind::Volume,
            ResourceKind::MachineImage,
            ResourceKind::Subnet,
            ResourceKind::Firewall,
            ResourceKind::Keypair,
            ResourceKind::Vlan,
        ] {
            assert!(vm < kind.cleanup_priority(), "VM must go before {}", kind);
        }
        assert!(
            ResourceKind::LoadBalancer.cleanup_priority() < vm,
            "Load balancer must go before its VMs"
        );
    }

    #[test]
    fn test_children_before_parents() {
        assert!(ResourceKind::Object.cleanup_priority() < ResourceKind::Bucket.cleanup_priority());
        assert!(ResourceKind::User.cleanup_priority() < ResourceKind::Group.cleanup_priority());
        assert!(ResourceKind::Subnet.cleanup_priority() < ResourceKind::Vlan.cleanup_priority());
    }

    #[test]
    fn test_context_debug_redacts_secrets() {
        let ctx = ProviderContext {
            provider_name: "memory".to_string(),
            api_secret_key: Some("hunter2".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", ctx);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
