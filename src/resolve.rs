//! Name to identifier resolution
//!
//! Every reference in the run settings may be given either as a canonical
//! identifier or as the resource's name. Identifiers pass through untouched;
//! names are looked up page by page, and the first exact match wins.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ResourceKind, RunnerError};
use crate::paging::{find_first, pages};
use crate::service::DeviceFarm;
use crate::settings::is_arn;

pub struct IdentifierResolver {
    service: Arc<dyn DeviceFarm>,
}

impl IdentifierResolver {
    pub fn new(service: Arc<dyn DeviceFarm>) -> Self {
        Self { service }
    }

    /// Resolve a project, device pool, network profile or VPCE configuration
    ///
    /// `project_arn` scopes device pool and network profile lookups and is
    /// ignored for the other kinds. Uploads need a type, see
    /// [`IdentifierResolver::resolve_upload`].
    pub async fn resolve(
        &self,
        kind: ResourceKind,
        project_arn: &str,
        name_or_arn: &str,
    ) -> Result<String> {
        if is_arn(name_or_arn) {
            return Ok(name_or_arn.to_string());
        }
        debug!("Looking up {} named \"{}\"", kind, name_or_arn);

        let service = self.service.as_ref();
        let stream = match kind {
            ResourceKind::Project => pages(move |token| service.list_projects(token)),
            ResourceKind::DevicePool => {
                pages(move |token| service.list_device_pools(project_arn, token))
            }
            ResourceKind::NetworkProfile => {
                pages(move |token| service.list_network_profiles(project_arn, token))
            }
            ResourceKind::VpceConfiguration => {
                pages(move |token| service.list_vpce_configurations(token))
            }
            ResourceKind::Upload => {
                return self.resolve_upload(project_arn, None, name_or_arn).await;
            }
        };

        find_first(stream, |resource| resource.name == name_or_arn)
            .await?
            .map(|resource| resource.arn)
            .ok_or_else(|| RunnerError::not_found(kind, name_or_arn).into())
    }

    pub async fn resolve_project(&self, name_or_arn: &str) -> Result<String> {
        self.resolve(ResourceKind::Project, "", name_or_arn).await
    }

    /// Resolve each VPCE configuration, keeping the input order
    pub async fn resolve_vpce_configurations(
        &self,
        names_or_arns: &[String],
    ) -> Result<Vec<String>> {
        let mut arns = Vec::with_capacity(names_or_arns.len());
        for name_or_arn in names_or_arns {
            arns.push(
                self.resolve(ResourceKind::VpceConfiguration, "", name_or_arn)
                    .await?,
            );
        }
        Ok(arns)
    }

    /// Find an existing upload of the project by name, optionally narrowed to
    /// one upload type
    pub async fn resolve_upload(
        &self,
        project_arn: &str,
        upload_type: Option<&str>,
        name_or_arn: &str,
    ) -> Result<String> {
        if is_arn(name_or_arn) {
            return Ok(name_or_arn.to_string());
        }
        debug!("Looking up upload named \"{}\"", name_or_arn);

        let service = self.service.as_ref();
        let stream = pages(move |token| service.list_uploads(project_arn, upload_type, token));

        find_first(stream, |upload| upload.name == name_or_arn)
            .await?
            .map(|upload| upload.arn)
            .ok_or_else(|| RunnerError::not_found(ResourceKind::Upload, name_or_arn).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{NamedResource, UploadStatus};
    use crate::testing::{FakeDeviceFarm, PROJECT_ARN, upload};

    fn resolver(fake: &Arc<FakeDeviceFarm>) -> IdentifierResolver {
        IdentifierResolver::new(Arc::clone(fake) as Arc<dyn DeviceFarm>)
    }

    #[tokio::test]
    async fn test_arn_passes_through_without_lookup() {
        let fake = Arc::new(FakeDeviceFarm::default());
        let resolver = resolver(&fake);

        for kind in [
            ResourceKind::Project,
            ResourceKind::DevicePool,
            ResourceKind::NetworkProfile,
            ResourceKind::VpceConfiguration,
            ResourceKind::Upload,
        ] {
            let arn = "arn:aws:devicefarm:us-west-2:account-id:devicepool:x";
            assert_eq!(resolver.resolve(kind, PROJECT_ARN, arn).await.unwrap(), arn);
        }
        assert!(fake.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_match_on_first_page_skips_remaining_pages() {
        let fake = Arc::new(FakeDeviceFarm {
            device_pools: vec![
                vec![
                    NamedResource::new("arn:pool-1", "Top Devices"),
                    NamedResource::new("arn:pool-2", "Android"),
                ],
                vec![NamedResource::new("arn:pool-3", "Android")],
            ],
            ..Default::default()
        });

        let arn = resolver(&fake)
            .resolve(ResourceKind::DevicePool, PROJECT_ARN, "Android")
            .await
            .unwrap();

        assert_eq!(arn, "arn:pool-2");
        assert_eq!(fake.count("ListDevicePools"), 1);
    }

    #[tokio::test]
    async fn test_network_profile_found_on_later_page() {
        let fake = Arc::new(FakeDeviceFarm {
            network_profiles: vec![
                vec![NamedResource::new("arn:np-1", "Fast")],
                vec![NamedResource::new("arn:np-2", "Slow 3G")],
            ],
            ..Default::default()
        });

        let arn = resolver(&fake)
            .resolve(ResourceKind::NetworkProfile, PROJECT_ARN, "Slow 3G")
            .await
            .unwrap();

        assert_eq!(arn, "arn:np-2");
        assert_eq!(fake.count("ListNetworkProfiles"), 2);
    }

    #[tokio::test]
    async fn test_name_match_is_exact() {
        let fake = Arc::new(FakeDeviceFarm {
            projects: vec![vec![NamedResource::new("arn:p", "my project")]],
            ..Default::default()
        });

        let err = resolver(&fake).resolve_project("My Project").await.unwrap_err();
        assert_eq!(err.to_string(), "No Project with name \"My Project\" was found.");
    }

    #[tokio::test]
    async fn test_not_found_after_all_pages() {
        let fake = Arc::new(FakeDeviceFarm {
            device_pools: vec![
                vec![NamedResource::new("arn:pool-1", "A")],
                vec![NamedResource::new("arn:pool-2", "B")],
            ],
            ..Default::default()
        });

        let err = resolver(&fake)
            .resolve(ResourceKind::DevicePool, PROJECT_ARN, "X")
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RunnerError>(),
            Some(RunnerError::NotFound {
                kind: ResourceKind::DevicePool,
                ..
            })
        ));
        assert_eq!(err.to_string(), "No Device Pool with name \"X\" was found.");
        assert_eq!(fake.count("ListDevicePools"), 2);
    }

    #[tokio::test]
    async fn test_vpce_configurations_mix_names_and_arns() {
        let fake = Arc::new(FakeDeviceFarm {
            vpce_configurations: vec![vec![NamedResource::new("arn:vpce-2", "Private API")]],
            ..Default::default()
        });

        let arns = resolver(&fake)
            .resolve_vpce_configurations(&["arn:vpce-1".to_string(), "Private API".to_string()])
            .await
            .unwrap();

        assert_eq!(arns, vec!["arn:vpce-1", "arn:vpce-2"]);
        assert_eq!(fake.count("ListVPCEConfigurations"), 1);
    }

    #[tokio::test]
    async fn test_vpce_configuration_not_found() {
        let fake = Arc::new(FakeDeviceFarm::default());

        let err = resolver(&fake)
            .resolve_vpce_configurations(&["Bad Name".to_string()])
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "No VPCE Configuration with name \"Bad Name\" was found."
        );
    }

    #[tokio::test]
    async fn test_upload_lookup_is_scoped_by_type() {
        let mut fake = FakeDeviceFarm::default();
        fake.uploads.insert(
            "IOS_APP".to_string(),
            vec![vec![upload("arn:upload-ios", "app.ipa", UploadStatus::Succeeded)]],
        );
        let fake = Arc::new(fake);

        let arn = resolver(&fake)
            .resolve_upload(PROJECT_ARN, Some("IOS_APP"), "app.ipa")
            .await
            .unwrap();

        assert_eq!(arn, "arn:upload-ios");
        assert_eq!(fake.count("ListUploads:IOS_APP"), 1);
    }
}
