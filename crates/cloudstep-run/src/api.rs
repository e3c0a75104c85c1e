use crate::executor::{GcloudExecutor, RealExecutor};
use crate::gcloud::GcloudError;
use crate::model::ServiceDefinition;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

/// Remote operations the reconciler needs from Cloud Run.
///
/// Production code uses [`RunApiClient`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait ServiceApi: Send + Sync {
    /// Fetch a service. A missing service is [`ApiError::NotFound`].
    async fn get_service(&self, name: &str) -> Result<ServiceDefinition, ApiError>;

    /// Create a service in the client's project.
    async fn create_service(
        &self,
        service: &ServiceDefinition,
    ) -> Result<ServiceDefinition, ApiError>;

    /// Replace an existing service with the full definition.
    async fn replace_service(
        &self,
        service: &ServiceDefinition,
    ) -> Result<ServiceDefinition, ApiError>;
}

/// Cloud Run Admin API v1 client, parameterized over the executor used for
/// access tokens.
pub struct RunApiClient<E: GcloudExecutor = RealExecutor> {
    http: reqwest::Client,
    executor: E,
    endpoint: String,
    project_id: String,
    token: OnceCell<String>,
}

impl RunApiClient<RealExecutor> {
    pub fn new(project_id: &str, region: &str) -> Self {
        Self::with_executor(RealExecutor::default(), project_id, region)
    }
}

impl<E: GcloudExecutor> RunApiClient<E> {
    pub fn with_executor(executor: E, project_id: &str, region: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            executor,
            endpoint: regional_endpoint(region),
            project_id: project_id.to_owned(),
            token: OnceCell::new(),
        }
    }

    /// Point the client at a different API root, e.g. a private endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_owned();
        self
    }

    /// Use a pre-issued access token instead of asking gcloud.
    pub fn with_access_token(mut self, token: &str) -> Self {
        self.token = OnceCell::new_with(Some(token.to_owned()));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn services_url(&self) -> String {
        format!(
            "{}/apis/serving.knative.dev/v1/namespaces/{}/services",
            self.endpoint, self.project_id
        )
    }

    pub fn service_url(&self, name: &str) -> String {
        format!("{}/{name}", self.services_url())
    }

    async fn access_token(&self) -> Result<&str, ApiError> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let out = self
                    .executor
                    .exec(&["auth", "print-access-token", "--quiet"].map(str::to_owned))
                    .await
                    .map_err(|e| ApiError::Token { source: e })?;
                Ok::<_, ApiError>(out.trim().to_owned())
            })
            .await?;
        Ok(token.as_str())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        name: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                operation,
                source: e,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                name: name.to_owned(),
            });
        }
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("<unreadable response body: {e}>"),
            };
            return Err(ApiError::Status {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| ApiError::Decode {
            operation,
            source: e,
        })
    }
}

impl<E: GcloudExecutor> ServiceApi for RunApiClient<E> {
    async fn get_service(&self, name: &str) -> Result<ServiceDefinition, ApiError> {
        let request = self.http.get(self.service_url(name));
        self.send("get service", name, request).await
    }

    async fn create_service(
        &self,
        service: &ServiceDefinition,
    ) -> Result<ServiceDefinition, ApiError> {
        let request = self.http.post(self.services_url()).json(service);
        self.send("create service", service.name(), request).await
    }

    async fn replace_service(
        &self,
        service: &ServiceDefinition,
    ) -> Result<ServiceDefinition, ApiError> {
        let request = self.http.put(self.service_url(service.name())).json(service);
        self.send("replace service", service.name(), request).await
    }
}

pub fn regional_endpoint(region: &str) -> String {
    format!("https://{region}-run.googleapis.com")
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("service '{name}' not found")]
    NotFound { name: String },

    #[error("failed to obtain access token")]
    Token { source: GcloudError },

    #[error("{operation} request failed")]
    Transport {
        operation: &'static str,
        source: reqwest::Error,
    },

    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation} returned an unreadable service")]
    Decode {
        operation: &'static str,
        source: reqwest::Error,
    },
}
