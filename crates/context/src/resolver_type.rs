use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Resource resolver flavour a [`MockContext`](crate::MockContext) is set up
/// with.
///
/// Every flavour except [`None`](ResourceResolverType::None) is backed by an
/// in-memory resource store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceResolverType {
    #[default]
    #[serde(rename = "RESOURCERESOLVER_MOCK")]
    ResourceResolverMock,
    #[serde(rename = "RESOURCEPROVIDER_MOCK")]
    ResourceProviderMock,
    #[serde(rename = "JCR_MOCK")]
    JcrMock,
    #[serde(rename = "NONE")]
    None,
}

impl ResourceResolverType {
    pub fn has_resource_store(&self) -> bool {
        !matches!(self, ResourceResolverType::None)
    }
}

impl Display for ResourceResolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceResolverType::ResourceResolverMock => "RESOURCERESOLVER_MOCK",
            ResourceResolverType::ResourceProviderMock => "RESOURCEPROVIDER_MOCK",
            ResourceResolverType::JcrMock => "JCR_MOCK",
            ResourceResolverType::None => "NONE",
        };
        f.write_str(name)
    }
}
