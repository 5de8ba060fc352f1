use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HOST, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::routes::AppState;

/// Header carrying an explicit tenant slug, for clients not reached through
/// a tenant subdomain.
pub const TENANT_HEADER: &str = "x-tenant-slug";

/// Where the tenant slug came from, recorded for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    Subdomain,
    Header,
    Claim,
}

impl TenantSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantSource::Subdomain => "subdomain",
            TenantSource::Header => "header",
            TenantSource::Claim => "claim",
        }
    }
}

/// Resolved tenant identity attached to the request.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub slug: String,
    pub source: TenantSource,
}

/// Claims extracted by the authentication layer in front of this service.
/// The tenant slug inside counts as the weakest resolution source.
#[derive(Debug, Clone, Default)]
pub struct AuthClaims {
    pub subject: Option<String>,
    pub tenant_slug: Option<String>,
}

/// Resolution precedence: subdomain, then explicit header, then auth claim.
/// The strongest source wins even when a weaker one disagrees.
pub fn resolve_slug(
    headers: &HeaderMap,
    claims: Option<&AuthClaims>,
    base_domain: &str,
    reserved: &[String],
) -> Option<(String, TenantSource)> {
    if let Some(slug) = subdomain_slug(headers, base_domain, reserved) {
        return Some((slug, TenantSource::Subdomain));
    }

    if let Some(value) = headers.get(TENANT_HEADER) {
        if let Ok(slug) = value.to_str() {
            let slug = slug.trim().to_lowercase();
            if !slug.is_empty() {
                return Some((slug, TenantSource::Header));
            }
        }
    }

    if let Some(slug) = claims.and_then(|c| c.tenant_slug.as_deref()) {
        return Some((slug.to_lowercase(), TenantSource::Claim));
    }

    None
}

fn subdomain_slug(headers: &HeaderMap, base_domain: &str, reserved: &[String]) -> Option<String> {
    let host = headers.get(HOST)?.to_str().ok()?;
    let host = host.split(':').next()?.trim().to_lowercase();

    let suffix = format!(".{base_domain}");
    let prefix = host.strip_suffix(&suffix)?;

    // Only a single leading label names a tenant; deeper nesting does not.
    if prefix.is_empty() || prefix.contains('.') {
        return None;
    }
    if reserved.iter().any(|r| r == prefix) {
        return None;
    }
    Some(prefix.to_string())
}

/// Peer address, present when the server is built with connect info.
fn caller_addr(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rejects requests whose tenant cannot be resolved or is not active, and
/// attaches the [`TenantContext`] and live data handle for handlers.
pub async fn require_tenant(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = request.extensions().get::<AuthClaims>().cloned();
    let (slug, source) = resolve_slug(
        request.headers(),
        claims.as_ref(),
        &state.config.base_domain,
        &state.config.reserved_subdomains,
    )
    .ok_or(ApiError::TenantUnresolved)?;

    let handle = state.handles.handle(&slug).await?;

    info!(
        tenant = %slug,
        tenant_id = %handle.tenant.id,
        schema = %handle.tenant.schema_name,
        source = source.as_str(),
        method = %request.method(),
        path = %request.uri().path(),
        caller = %caller_addr(&request),
        "tenant resolved"
    );

    request.extensions_mut().insert(TenantContext { slug, source });
    request.extensions_mut().insert(handle);
    Ok(next.run(request).await)
}

/// Like [`require_tenant`] but lets unresolved or inactive tenants through
/// without a context, for endpoints that merely personalize when one is
/// present.
pub async fn optional_tenant(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = request.extensions().get::<AuthClaims>().cloned();
    let resolved = resolve_slug(
        request.headers(),
        claims.as_ref(),
        &state.config.base_domain,
        &state.config.reserved_subdomains,
    );

    if let Some((slug, source)) = resolved {
        match state.handles.handle(&slug).await {
            Ok(handle) => {
                info!(tenant = %slug, source = source.as_str(), "tenant resolved");
                request.extensions_mut().insert(TenantContext { slug, source });
                request.extensions_mut().insert(handle);
            }
            Err(e) => {
                debug!(tenant = %slug, error = %e, "optional tenant not attached");
            }
        }
    }

    next.run(request).await
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
}

pub fn trace_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn reserved() -> Vec<String> {
        vec!["www".to_string(), "api".to_string()]
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_subdomain_resolves() {
        let headers = headers(&[("host", "acme.conductor.dev")]);
        let (slug, source) = resolve_slug(&headers, None, "conductor.dev", &reserved()).unwrap();
        assert_eq!(slug, "acme");
        assert_eq!(source, TenantSource::Subdomain);
    }

    #[test]
    fn test_subdomain_beats_header_and_claim() {
        let headers = headers(&[
            ("host", "acme.conductor.dev"),
            (TENANT_HEADER, "other_org"),
        ]);
        let claims = AuthClaims {
            subject: Some("user_1".to_string()),
            tenant_slug: Some("third_org".to_string()),
        };
        let (slug, source) =
            resolve_slug(&headers, Some(&claims), "conductor.dev", &reserved()).unwrap();
        assert_eq!(slug, "acme");
        assert_eq!(source, TenantSource::Subdomain);
    }

    #[test]
    fn test_header_beats_claim() {
        let headers = headers(&[("host", "conductor.dev"), (TENANT_HEADER, "acme")]);
        let claims = AuthClaims {
            subject: None,
            tenant_slug: Some("other_org".to_string()),
        };
        let (slug, source) =
            resolve_slug(&headers, Some(&claims), "conductor.dev", &reserved()).unwrap();
        assert_eq!(slug, "acme");
        assert_eq!(source, TenantSource::Header);
    }

    #[test]
    fn test_claim_is_the_fallback() {
        let headers = headers(&[("host", "conductor.dev")]);
        let claims = AuthClaims {
            subject: None,
            tenant_slug: Some("acme".to_string()),
        };
        let (slug, source) =
            resolve_slug(&headers, Some(&claims), "conductor.dev", &reserved()).unwrap();
        assert_eq!(slug, "acme");
        assert_eq!(source, TenantSource::Claim);
    }

    #[test]
    fn test_reserved_subdomain_is_skipped() {
        let headers = headers(&[("host", "www.conductor.dev"), (TENANT_HEADER, "acme")]);
        let (slug, source) = resolve_slug(&headers, None, "conductor.dev", &reserved()).unwrap();
        assert_eq!(slug, "acme");
        assert_eq!(source, TenantSource::Header);
    }

    #[test]
    fn test_port_is_stripped() {
        let headers = headers(&[("host", "acme.localhost:8080")]);
        let (slug, _) = resolve_slug(&headers, None, "localhost", &reserved()).unwrap();
        assert_eq!(slug, "acme");
    }

    #[test]
    fn test_nested_subdomain_does_not_resolve() {
        let headers = headers(&[("host", "a.b.conductor.dev")]);
        assert!(resolve_slug(&headers, None, "conductor.dev", &reserved()).is_none());
    }

    #[test]
    fn test_bare_domain_without_hints_resolves_nothing() {
        let headers = headers(&[("host", "conductor.dev")]);
        assert!(resolve_slug(&headers, None, "conductor.dev", &reserved()).is_none());
    }
}
