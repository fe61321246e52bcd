//! S3-compatible remote tier backed by the AWS SDK.

use crate::{
    config::RemoteConfig,
    services::remote_store::{ObjectBody, RemoteError, RemoteObject, RemoteStore},
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client as S3Client,
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Remote store writing private objects into a single bucket.
#[derive(Clone)]
pub struct S3RemoteStore {
    client: S3Client,
    bucket: String,
}

impl S3RemoteStore {
    /// Build a client from the remote configuration.
    ///
    /// Static credentials are used when both halves are configured; otherwise
    /// the default provider chain (env, profile, IMDS) applies.
    pub async fn connect(settings: &RemoteConfig) -> Self {
        let config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()));

        let config_loader = if let Some(creds) = &settings.credentials {
            let credentials = Credentials::new(
                &creds.access_key,
                &creds.secret_key,
                None,
                None,
                "file-proxy",
            );
            config_loader.credentials_provider(credentials)
        } else {
            config_loader
        };

        let sdk_config = config_loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::from_client(S3Client::from_conf(builder.build()), settings.bucket.clone())
    }

    pub fn from_client(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl RemoteStore for S3RemoteStore {
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), RemoteError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|err| RemoteError::Put {
                key: key.to_string(),
                message: err.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::Private)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|err| RemoteError::Put {
                key: key.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })?;

        debug!("mirrored {} to s3://{}/{}", path.display(), self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<RemoteObject>, RemoteError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(RemoteError::Get {
                    key: key.to_string(),
                    message: DisplayErrorContext(&service_err).to_string(),
                });
            }
        };

        let content_type = output.content_type().map(str::to_string);
        let content_length = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok());
        let body: ObjectBody = Box::pin(ReaderStream::new(output.body.into_async_read()));

        Ok(Some(RemoteObject {
            content_type,
            content_length,
            body: Some(body),
        }))
    }

    async fn check(&self) -> Result<(), RemoteError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| RemoteError::Unavailable(DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
