//! Copies item permissions from the source to the published item.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ItemPublishedContext, MigrationHook};
use crate::content::{Content, GranteeCapability, Permissions, Publishable};
use crate::endpoints::PermissionsEndpoint;
use crate::error::Result;
use crate::manifest::MigrationManifest;

/// Post-publish hook that reads the source item's permissions and applies
/// them to the destination item, with grantees translated to destination
/// users and groups. Rules for grantees that were not migrated are dropped.
pub struct PermissionsPostPublishHook {
    source: Arc<dyn PermissionsEndpoint>,
    destination: Arc<dyn PermissionsEndpoint>,
    manifest: Arc<MigrationManifest>,
}

impl PermissionsPostPublishHook {
    pub fn new(
        source: Arc<dyn PermissionsEndpoint>,
        destination: Arc<dyn PermissionsEndpoint>,
        manifest: Arc<MigrationManifest>,
    ) -> Self {
        Self {
            source,
            destination,
            manifest,
        }
    }

    fn translate(&self, permissions: Permissions) -> Permissions {
        let grantee_capabilities = permissions
            .grantee_capabilities
            .into_iter()
            .filter_map(|rule| {
                let content_type = rule.grantee_type.content_type();
                match self.manifest.destination_for(content_type, rule.grantee_id) {
                    Some(destination) => Some(GranteeCapability {
                        grantee_id: destination.id,
                        ..rule
                    }),
                    None => {
                        warn!(
                            "Dropping permissions for {} {}: no destination found",
                            content_type, rule.grantee_id
                        );
                        None
                    }
                }
            })
            .collect();
        Permissions {
            grantee_capabilities,
        }
    }
}

#[async_trait]
impl<P, R> MigrationHook<ItemPublishedContext<P, R>> for PermissionsPostPublishHook
where
    P: Publishable,
    R: Content,
{
    async fn execute(
        &self,
        context: ItemPublishedContext<P, R>,
        cancel: &CancellationToken,
    ) -> Result<ItemPublishedContext<P, R>> {
        let entry = context.manifest_entry.clone();
        let permissions = self
            .source
            .get_permissions(entry.content_type(), entry.source().id, cancel)
            .await?;
        if permissions.is_empty() {
            return Ok(context);
        }

        let translated = self.translate(permissions);
        debug!(
            "Applying {} permission rules to {} {}",
            translated.grantee_capabilities.len(),
            R::CONTENT_TYPE,
            context.destination_item.location()
        );
        self.destination
            .update_permissions(R::CONTENT_TYPE, context.destination_item.id(), &translated, cancel)
            .await?;
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{
        Capability, CapabilityMode, ContentReference, ContentType, GranteeType, Group, User,
        Workbook,
    };
    use crate::endpoints::{InMemorySite, SiteSnapshot};
    use crate::manifest::ManifestEntry;

    fn rule(grantee_type: GranteeType, grantee_id: uuid::Uuid) -> GranteeCapability {
        GranteeCapability {
            grantee_type,
            grantee_id,
            capabilities: vec![Capability {
                name: "Read".to_string(),
                mode: CapabilityMode::Allow,
            }],
        }
    }

    #[tokio::test]
    async fn test_permissions_are_translated_and_applied() {
        let manifest = Arc::new(MigrationManifest::new("run", "hash"));

        let alice = User::new("local", "alice");
        let alice_destination = ContentReference::generate("local/alice");
        manifest
            .get_or_create(ContentType::User, &alice.reference)
            .destination_found(alice_destination.clone());
        let ghosts = Group::new("local", "Ghosts");

        let workbook = Workbook::new("Finance/Sales", alice.reference.clone());
        let source = Arc::new(InMemorySite::new("source", SiteSnapshot::default()));
        source.set_permissions(
            ContentType::Workbook,
            workbook.id(),
            Permissions {
                grantee_capabilities: vec![
                    rule(GranteeType::User, alice.id()),
                    rule(GranteeType::Group, ghosts.id()),
                ],
            },
        );
        let destination = Arc::new(InMemorySite::new("destination", SiteSnapshot::default()));

        let published = Workbook::new("Finance/Sales", alice_destination.clone());
        let entry = Arc::new(ManifestEntry::new(ContentType::Workbook, workbook.reference.clone()));
        let hook = PermissionsPostPublishHook::new(source, destination.clone(), manifest);

        hook.execute(
            ItemPublishedContext::new(entry, workbook, published.clone()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let applied = destination.permissions(ContentType::Workbook, published.id());
        assert_eq!(applied.grantee_capabilities.len(), 1);
        assert_eq!(applied.grantee_capabilities[0].grantee_id, alice_destination.id);
    }

    #[tokio::test]
    async fn test_empty_permissions_are_not_written() {
        let manifest = Arc::new(MigrationManifest::new("run", "hash"));
        let source = Arc::new(InMemorySite::new("source", SiteSnapshot::default()));
        let destination = Arc::new(InMemorySite::new("destination", SiteSnapshot::default()));

        let workbook = Workbook::new("Finance/Sales", User::new("local", "a").reference);
        let entry = Arc::new(ManifestEntry::new(ContentType::Workbook, workbook.reference.clone()));
        let hook = PermissionsPostPublishHook::new(source, destination.clone(), manifest);

        hook.execute(
            ItemPublishedContext::new(entry, workbook.clone(), workbook.clone()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(destination.snapshot().permissions.is_empty());
    }
}
