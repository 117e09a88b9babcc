//! In-process invocation of a user function, simulating the sub-runtime.

use crate::error::AdapterError;
use crate::function::invoker::{full_body, ForwardedHeaders, InvokeBody, Invoker};
use crate::function::{ExecutionContext, FunctionHandler};
use crate::runtime::infra::inject_ingress_headers;
use async_trait::async_trait;
use bytes::Bytes;
use http::request::Parts;
use http::{header, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, warn};
use url::form_urlencoded;

/// Part of the core runtime envelope a sub-runtime needs to rebuild the
/// function's request.
#[derive(Debug, Default, Deserialize)]
struct SubRuntimeRequest {
    #[serde(default)]
    event: SubRuntimeEvent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubRuntimeEvent {
    http_method: String,
    headers: Option<HashMap<String, String>>,
    query_string_parameters: Option<HashMap<String, String>>,
    body: String,
}

/// Serves a [`FunctionHandler`] in-process, the way the local test server
/// runs a handler without any sub-runtime.
pub struct LocalInvoker<F> {
    function: F,
    context: ExecutionContext,
}

impl<F: FunctionHandler> LocalInvoker<F> {
    pub fn new(function: F, context: ExecutionContext) -> Self {
        Self { function, context }
    }
}

#[async_trait]
impl<F: FunctionHandler> Invoker for LocalInvoker<F> {
    async fn invoke(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<InvokeBody>, AdapterError> {
        let (parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };

        let mut function_request = match sub_process(&parts, &body) {
            Ok(request) => request,
            Err(e) => {
                warn!("Cannot unmarshal event from core runtime: {}", e);
                let mut response =
                    Response::new(full_body("Cannot unmarshal event from core runtime"));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                return Ok(response);
            }
        };

        let host = function_request
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        inject_ingress_headers(function_request.headers_mut(), &host);
        let forwarded = function_request.headers().clone();

        debug!(
            "Invoking function '{}': {} {}",
            self.function.name(),
            function_request.method(),
            function_request.uri()
        );

        let response = match self.function.handle(function_request, &self.context).await {
            Ok(response) => response,
            Err(e) => {
                error!("Function '{}' error: {}", self.function.name(), e);
                e.into()
            }
        };

        let mut response = response.map(|body| full_body(body));
        response
            .extensions_mut()
            .insert(ForwardedHeaders(forwarded));
        Ok(response)
    }
}

/// Rebuild the plain request a function sees from a forward request.
///
/// Method, flattened headers, query parameters and body come from the event;
/// the path is the one the forward request was addressed to.
pub fn sub_process(parts: &Parts, body: &[u8]) -> Result<Request<Bytes>, AdapterError> {
    let envelope: SubRuntimeRequest = serde_json::from_slice(body)?;
    let event = envelope.event;

    let method = if event.http_method.is_empty() {
        Method::GET
    } else {
        Method::from_bytes(event.http_method.as_bytes())
            .map_err(|e| AdapterError::MalformedEnvelope(e.to_string()))?
    };

    // query keys are encoded in sorted order
    let params: BTreeMap<String, String> = event
        .query_string_parameters
        .unwrap_or_default()
        .into_iter()
        .collect();
    let mut target = parts.uri.path().to_string();
    if !params.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        target.push('?');
        target.push_str(&query);
    }
    let uri: Uri = target
        .parse()
        .map_err(|e| AdapterError::MalformedEnvelope(format!("invalid request target: {e}")))?;

    let mut request = Request::new(Bytes::from(event.body));
    *request.method_mut() = method;
    *request.uri_mut() = uri;

    let headers = request.headers_mut();
    for (key, value) in event.headers.unwrap_or_default() {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("Skipping event header '{}'", key),
        }
    }

    Ok(request)
}
