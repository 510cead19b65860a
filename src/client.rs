use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use tracing::{Instrument, debug, info_span};

use crate::EchoResult;
use crate::body::EchoBody;
use crate::config::EchoConfig;
use crate::decode;
use crate::error::EchoError;
use crate::interceptor::Interceptors;
use crate::merge::merge_configs;
use crate::request;
use crate::response::EchoResponse;
use crate::transport::{HyperTransport, Transport};
use crate::util::redact_url_for_logs;

struct EchoInner {
    config: EchoConfig,
    transport: Arc<dyn Transport>,
    interceptors: Interceptors,
}

/// The client: a base configuration, a transport, and the two interceptor
/// chains. Cloning is cheap and clones share state; clients built by
/// separate builder calls are fully independent.
#[derive(Clone)]
pub struct Echo {
    inner: Arc<EchoInner>,
}

pub struct EchoBuilder {
    config: EchoConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl EchoBuilder {
    pub(crate) fn new() -> Self {
        Self {
            config: EchoConfig::default(),
            transport: None,
        }
    }

    /// Replaces the whole base configuration.
    pub fn config(mut self, config: EchoConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn response_type(mut self, tag: impl Into<String>) -> Self {
        self.config.response_type = Some(tag.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn transport<T>(self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport_arc(Arc::new(transport))
    }

    pub fn transport_arc(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn try_build(self) -> EchoResult<Echo> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::try_new()?),
        };
        Ok(Echo {
            inner: Arc::new(EchoInner {
                config: self.config,
                transport,
                interceptors: Interceptors::new(),
            }),
        })
    }

    pub fn build(self) -> Echo {
        self.try_build()
            .unwrap_or_else(|error| panic!("failed to build echox client: {error}"))
    }
}

impl Echo {
    pub fn builder() -> EchoBuilder {
        EchoBuilder::new()
    }

    pub fn interceptors(&self) -> &Interceptors {
        &self.inner.interceptors
    }

    /// The long-lived base configuration every call is merged onto.
    pub fn base_config(&self) -> &EchoConfig {
        &self.inner.config
    }

    /// Merges `config` onto the base configuration and runs it through the
    /// interceptor pipeline.
    pub async fn request(&self, config: EchoConfig) -> EchoResult<EchoResponse> {
        let merged = merge_configs(&self.inner.config, config);
        self.execute(merged).await
    }

    pub async fn get(&self, url: impl Into<String>, options: EchoConfig) -> EchoResult<EchoResponse> {
        self.request(with_method(Method::GET, url, None, options)).await
    }

    pub async fn post(
        &self,
        url: impl Into<String>,
        body: Option<EchoBody>,
        options: EchoConfig,
    ) -> EchoResult<EchoResponse> {
        self.request(with_method(Method::POST, url, body, options)).await
    }

    pub async fn put(
        &self,
        url: impl Into<String>,
        body: Option<EchoBody>,
        options: EchoConfig,
    ) -> EchoResult<EchoResponse> {
        self.request(with_method(Method::PUT, url, body, options)).await
    }

    pub async fn patch(
        &self,
        url: impl Into<String>,
        body: Option<EchoBody>,
        options: EchoConfig,
    ) -> EchoResult<EchoResponse> {
        self.request(with_method(Method::PATCH, url, body, options)).await
    }

    pub async fn delete(
        &self,
        url: impl Into<String>,
        options: EchoConfig,
    ) -> EchoResult<EchoResponse> {
        self.request(with_method(Method::DELETE, url, None, options)).await
    }

    /// One traversal of the pipeline, run fresh per call.
    ///
    /// Request-fulfilled hooks thread the merged configuration; a failure
    /// there enters the request-rejected chain, whose recovery value is the
    /// configuration used going forward and whose exhaustion returns the
    /// error without the request ever being attempted. Every post-flight
    /// failure, transport-level and HTTP-status alike, is routed to the
    /// response-rejected chain (see DESIGN.md for the routing decision).
    /// Re-entrant calls from inside a hook traverse independently.
    async fn execute(&self, merged: EchoConfig) -> EchoResult<EchoResponse> {
        let interceptors = self.interceptors();

        let config = match interceptors.request().run_fulfilled(merged).await {
            Ok(config) => config,
            Err(error) => interceptors.request().run_rejected(error).await?,
        };

        let response = match self.dispatch(&config).await {
            Ok(response) => response,
            Err(error) => interceptors.response().run_rejected(error).await?,
        };

        match interceptors.response().run_fulfilled(response).await {
            Ok(response) => Ok(response),
            Err(error) => interceptors.response().run_rejected(error).await,
        }
    }

    /// Builds the transport request, performs it and decodes the outcome
    /// into a response or an error.
    async fn dispatch(&self, config: &EchoConfig) -> EchoResult<EchoResponse> {
        let request = request::build(config);
        let span = info_span!(
            "echox.request",
            method = %request.method,
            url = %redact_url_for_logs(&request.url),
        );

        async {
            debug!("sending request");
            let raw = match self.inner.transport.perform(request.clone()).await {
                Ok(raw) => raw,
                Err(failure) => {
                    return Err(EchoError::from_transport_failure(
                        config.clone(),
                        request,
                        failure,
                    ));
                }
            };

            let status = raw.status;
            let status_text = raw.status_text.clone();
            let headers = raw.headers.clone();
            debug!(status = status.as_u16(), "received response");

            let data = decode::decode(config, &request, raw).await?;
            let response = EchoResponse {
                data,
                status,
                status_text,
                headers,
                config: config.clone(),
                request,
            };
            if !status.is_success() {
                return Err(EchoError::from_http_failure(response));
            }
            Ok(response)
        }
        .instrument(span)
        .await
    }
}

fn with_method(
    method: Method,
    url: impl Into<String>,
    body: Option<EchoBody>,
    options: EchoConfig,
) -> EchoConfig {
    let mut config = options;
    config.method = Some(method);
    config.url = url.into();
    if config.body.is_none() {
        config.body = body;
    }
    config
}
