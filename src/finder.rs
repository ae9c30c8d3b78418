//! Discovery of pre-existing resources for read-only suites
//!
//! Stateless suites must not change cloud state, so instead of provisioning
//! they adopt something already in the account. The finder lists, takes the
//! first structurally valid match and stops. "Not subscribed" and listing
//! failures both come back as `None`: across many providers an absent
//! service is an ordinary outcome.

use crate::error::Result;
use crate::provider::{CloudProvider, ResourceDescriptor, ResourceKind, ResourceState};
use tracing::{debug, info, warn};

type Predicate = fn(&ResourceDescriptor) -> bool;

/// How to find a usable resource of one kind
#[derive(Debug, Clone)]
pub struct StatelessFinder {
    kind: ResourceKind,
    accept: Predicate,
    prefer: Option<Predicate>,
    /// Kind to list first when `kind` only exists inside a parent
    parent: Option<(ResourceKind, Predicate)>,
}

fn any(_: &ResourceDescriptor) -> bool {
    true
}

fn usable(d: &ResourceDescriptor) -> bool {
    !matches!(
        d.state,
        ResourceState::Deleting | ResourceState::Deleted | ResourceState::Error(_)
    )
}

fn is_container(d: &ResourceDescriptor) -> bool {
    d.is_container && usable(d)
}

fn is_leaf(d: &ResourceDescriptor) -> bool {
    !d.is_container && usable(d)
}

fn has_children(d: &ResourceDescriptor) -> bool {
    d.child_count.map(|n| n > 0).unwrap_or(false)
}

impl StatelessFinder {
    /// First listed resource that isn't on its way out
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            accept: usable,
            prefer: None,
            parent: None,
        }
    }

    pub fn accepting(mut self, accept: Predicate) -> Self {
        self.accept = accept;
        self
    }

    /// Prefer matches satisfying `prefer`, falling back to any accepted one
    pub fn preferring(mut self, prefer: Predicate) -> Self {
        self.prefer = Some(prefer);
        self
    }

    /// Look for `kind` inside resources of `parent_kind` matching `parent_accept`
    pub fn nested_in(mut self, parent_kind: ResourceKind, parent_accept: Predicate) -> Self {
        self.parent = Some((parent_kind, parent_accept));
        self
    }

    /// Defaults per kind
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Bucket => Self::new(kind).accepting(is_container).preferring(has_children),
            ResourceKind::Object => Self::new(kind)
                .accepting(is_leaf)
                .nested_in(ResourceKind::Bucket, is_container),
            ResourceKind::MachineImage | ResourceKind::VirtualMachine | ResourceKind::Volume => {
                Self::new(kind).preferring(|d| d.state == ResourceState::Available)
            }
            _ => Self::new(kind),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Find a resource, or `None` when the service is unavailable or empty
    pub async fn find(&self, provider: &dyn CloudProvider) -> Option<ResourceDescriptor> {
        match provider.is_subscribed(self.kind).await {
            Ok(true) => {}
            Ok(false) => {
                info!(kind = %self.kind, "Not subscribed, nothing to discover");
                return None;
            }
            Err(e) => {
                warn!(kind = %self.kind, error = %e, "Subscription check failed");
                return None;
            }
        }

        match self.search(provider).await {
            Ok(Some(found)) => {
                debug!(kind = %self.kind, id = %found.id, "Discovered existing resource");
                Some(found)
            }
            Ok(None) => {
                info!(kind = %self.kind, "No existing resource to use");
                None
            }
            Err(e) => {
                warn!(kind = %self.kind, error = %e, "Listing failed during discovery");
                None
            }
        }
    }

    async fn search(&self, provider: &dyn CloudProvider) -> Result<Option<ResourceDescriptor>> {
        let Some((parent_kind, parent_accept)) = self.parent else {
            let items = provider.list(self.kind, None).await?;
            return Ok(self.pick(items));
        };

        // Parent candidates with children first, then the rest
        let mut parents: Vec<ResourceDescriptor> = provider
            .list(parent_kind, None)
            .await?
            .into_iter()
            .filter(|p| parent_accept(p))
            .collect();
        parents.sort_by_key(|p| !has_children(p));

        for parent in parents {
            let children = provider.list(self.kind, Some(parent.id.clone())).await?;
            if let Some(found) = self.pick(children) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn pick(&self, items: Vec<ResourceDescriptor>) -> Option<ResourceDescriptor> {
        let prefer = self.prefer.unwrap_or(any);
        let mut fallback = None;
        for item in items {
            if !(self.accept)(&item) {
                continue;
            }
            if prefer(&item) {
                return Some(item);
            }
            if fallback.is_none() {
                fallback = Some(item);
            }
        }
        fallback
    }
}
