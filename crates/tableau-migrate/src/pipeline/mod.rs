//! Migration pipeline: the per content type wiring of the engine.
//!
//! The pipeline resolves, once per content type, the preparer that builds
//! publish payloads and the batch migrator that publishes them, registers
//! the built-in hooks, and migrates content types in dependency order.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ConfigReader;
use crate::content::{
    Content, ContentType, DataSource, Group, Project, Publishable, User, Workbook,
};
use crate::endpoints::{
    DestinationEndpoint, PermissionsEndpoint, PullEndpoint, SiteDestination, SiteSource,
    SourceEndpoint,
};
use crate::engine::{
    BulkPublishStrategy, ContentBatchMigrator, ContentItemPreparer, ContentMigrationResult,
    ContentMigrator, EndpointContentItemPreparer, ItemPublishStrategy,
    ParallelContentBatchMigrator, SourceContentItemPreparer,
};
use crate::error::{MigrateError, Result};
use crate::hooks::{
    ContentFilterRunner, ContentMappingRunner, ContentTransformerRunner, GroupUsersTransformer,
    ItemPublishedContext, LocationExclusionFilter, MigrationHookRunner, OwnershipTransformer,
    PermissionsPostPublishHook, PrefixLocationMapping, PreviouslyMigratedFilter, TypedRegistry,
};
use crate::manifest::{ManifestEntryBuilder, MigrationManifest};

/// Caller-supplied hooks, filters, mappings and transformers.
///
/// The built-in ones are registered after these, so they run last.
#[derive(Debug, Default)]
pub struct MigrationPlugins {
    pub hooks: MigrationHookRunner,
    pub filters: ContentFilterRunner,
    pub mappings: ContentMappingRunner,
    pub transformers: ContentTransformerRunner,
}

/// Migration of every content type from `S` to `D`.
pub struct MigrationPipeline<S, D> {
    source: Arc<S>,
    destination: Arc<D>,
    manifest: Arc<MigrationManifest>,
    config: Arc<dyn ConfigReader>,
    hooks: Arc<MigrationHookRunner>,
    filters: Arc<ContentFilterRunner>,
    mappings: Arc<ContentMappingRunner>,
    transformers: Arc<ContentTransformerRunner>,
    components: TypedRegistry,
}

impl<S: SiteSource, D: SiteDestination> MigrationPipeline<S, D> {
    pub fn new(
        source: Arc<S>,
        destination: Arc<D>,
        manifest: Arc<MigrationManifest>,
        config: Arc<dyn ConfigReader>,
        plugins: MigrationPlugins,
    ) -> Result<Self> {
        let MigrationPlugins {
            mut hooks,
            mut filters,
            mut mappings,
            mut transformers,
        } = plugins;

        register_filters::<User>(&mut filters, &config);
        register_filters::<Group>(&mut filters, &config);
        register_filters::<Project>(&mut filters, &config);
        register_filters::<DataSource>(&mut filters, &config);
        register_filters::<Workbook>(&mut filters, &config);

        mappings.register::<User, _>(PrefixLocationMapping::new(config.clone()));
        mappings.register::<Group, _>(PrefixLocationMapping::new(config.clone()));
        mappings.register::<Project, _>(PrefixLocationMapping::new(config.clone()));
        mappings.register::<DataSource, _>(PrefixLocationMapping::new(config.clone()));
        mappings.register::<Workbook, _>(PrefixLocationMapping::new(config.clone()));

        transformers.register::<Group, _>(GroupUsersTransformer::new(manifest.clone()));
        transformers.register::<Project, _>(OwnershipTransformer::new(manifest.clone()));
        transformers.register::<DataSource, _>(OwnershipTransformer::new(manifest.clone()));
        transformers.register::<Workbook, _>(OwnershipTransformer::new(manifest.clone()));

        let source_permissions: Arc<dyn PermissionsEndpoint> = source.clone();
        let destination_permissions: Arc<dyn PermissionsEndpoint> = destination.clone();
        let permissions = || {
            PermissionsPostPublishHook::new(
                source_permissions.clone(),
                destination_permissions.clone(),
                manifest.clone(),
            )
        };
        hooks.register::<ItemPublishedContext<Project, Project>, _>(permissions());
        hooks.register::<ItemPublishedContext<DataSource, DataSource>, _>(permissions());
        hooks.register::<ItemPublishedContext<Workbook, Workbook>, _>(permissions());

        let mut pipeline = Self {
            source,
            destination,
            manifest,
            config,
            hooks: Arc::new(hooks),
            filters: Arc::new(filters),
            mappings: Arc::new(mappings),
            transformers: Arc::new(transformers),
            components: TypedRegistry::new(),
        };

        pipeline.register_source_preparer::<User>();
        pipeline.register_source_preparer::<Group>();
        pipeline.register_source_preparer::<Project>();
        pipeline.register_endpoint_preparer::<DataSource>();
        pipeline.register_endpoint_preparer::<Workbook>();

        pipeline.register_user_migrator()?;
        pipeline.register_item_migrator::<Group>()?;
        pipeline.register_item_migrator::<Project>()?;
        pipeline.register_item_migrator::<DataSource>()?;
        pipeline.register_item_migrator::<Workbook>()?;

        Ok(pipeline)
    }

    pub fn manifest(&self) -> &Arc<MigrationManifest> {
        &self.manifest
    }

    /// The preparer resolved for `T`.
    pub fn preparer<T: Content + Publishable>(
        &self,
    ) -> Result<Arc<dyn ContentItemPreparer<T, T>>> {
        self.components
            .get::<Arc<dyn ContentItemPreparer<T, T>>>()
            .cloned()
            .ok_or_else(|| {
                MigrateError::Config(format!("no preparer registered for {}", T::CONTENT_TYPE))
            })
    }

    /// The batch migrator resolved for `T`.
    pub fn batch_migrator<T: Content>(&self) -> Result<Arc<dyn ContentBatchMigrator<T>>> {
        self.components
            .get::<Arc<dyn ContentBatchMigrator<T>>>()
            .cloned()
            .ok_or_else(|| {
                MigrateError::Config(format!(
                    "no batch migrator registered for {}",
                    T::CONTENT_TYPE
                ))
            })
    }

    /// Migrate every content type in dependency order.
    ///
    /// A content type that fails does not stop the later ones; its errors
    /// are in its result. Cancellation of `cancel` stops the run.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<Vec<ContentMigrationResult>> {
        let mut results = Vec::with_capacity(ContentType::MIGRATION_ORDER.len());
        for content_type in ContentType::MIGRATION_ORDER {
            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }
            info!("Migrating {} content", content_type);
            let result = match content_type {
                ContentType::User => self.migrate::<User>(cancel).await?,
                ContentType::Group => self.migrate::<Group>(cancel).await?,
                ContentType::Project => self.migrate::<Project>(cancel).await?,
                ContentType::DataSource => self.migrate::<DataSource>(cancel).await?,
                ContentType::Workbook => self.migrate::<Workbook>(cancel).await?,
            };
            results.push(result);
        }
        Ok(results)
    }

    async fn migrate<T: Content>(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ContentMigrationResult>
    where
        S: SourceEndpoint<T>,
    {
        let migrator = ContentMigrator::<T>::new(
            self.source.clone(),
            ManifestEntryBuilder::new(self.manifest.clone(), self.mappings.clone()),
            self.filters.clone(),
            self.hooks.clone(),
            self.batch_migrator::<T>()?,
            self.config.clone(),
        );
        migrator.migrate(cancel).await
    }

    fn register_source_preparer<T: Content + Publishable>(&mut self) {
        let preparer: Arc<dyn ContentItemPreparer<T, T>> =
            Arc::new(SourceContentItemPreparer::<T>::new(self.transformers.clone()));
        self.components.insert(preparer);
    }

    fn register_endpoint_preparer<T: Content + Publishable>(&mut self)
    where
        S: PullEndpoint<T, T>,
    {
        let pull: Arc<dyn PullEndpoint<T, T>> = self.source.clone();
        let preparer: Arc<dyn ContentItemPreparer<T, T>> = Arc::new(
            EndpointContentItemPreparer::new(pull, self.transformers.clone()),
        );
        self.components.insert(preparer);
    }

    fn register_item_migrator<T: Content + Publishable>(&mut self) -> Result<()>
    where
        D: DestinationEndpoint<T, T>,
    {
        if self.config.snapshot().batch_publishing_enabled(T::CONTENT_TYPE) {
            return Err(MigrateError::BulkPublishUnsupported(T::CONTENT_TYPE));
        }

        let destination: Arc<dyn DestinationEndpoint<T, T>> = self.destination.clone();
        let migrator: Arc<dyn ContentBatchMigrator<T>> =
            Arc::new(ParallelContentBatchMigrator::new(
                self.preparer::<T>()?,
                ItemPublishStrategy::<T, T>::new(destination, self.hooks.clone()),
                self.config.clone(),
            ));
        self.components.insert(migrator);
        Ok(())
    }

    fn register_user_migrator(&mut self) -> Result<()> {
        if !self.config.snapshot().batch_publishing_enabled(ContentType::User) {
            return self.register_item_migrator::<User>();
        }

        info!("Users are published in bulk");
        let migrator: Arc<dyn ContentBatchMigrator<User>> =
            Arc::new(ParallelContentBatchMigrator::new(
                self.preparer::<User>()?,
                BulkPublishStrategy::<User>::new(self.destination.clone(), self.hooks.clone()),
                self.config.clone(),
            ));
        self.components.insert(migrator);
        Ok(())
    }
}

fn register_filters<T: Content>(
    filters: &mut ContentFilterRunner,
    config: &Arc<dyn ConfigReader>,
) {
    filters.register::<T, _>(PreviouslyMigratedFilter::new(config.clone()));
    filters.register::<T, _>(LocationExclusionFilter::new(config.clone()));
}
