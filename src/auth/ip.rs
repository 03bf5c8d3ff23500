//! Client IP extraction.

use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::request::Parts};

/// Types that expose HTTP headers and extensions, so IP extraction works on
/// both `Parts` and full requests.
pub trait HasHeadersAndExtensions {
    fn headers(&self) -> &axum::http::HeaderMap;
    fn extensions(&self) -> &axum::http::Extensions;
}

impl HasHeadersAndExtensions for Parts {
    fn headers(&self) -> &axum::http::HeaderMap {
        &self.headers
    }
    fn extensions(&self) -> &axum::http::Extensions {
        &self.extensions
    }
}

impl<B> HasHeadersAndExtensions for axum::extract::Request<B> {
    fn headers(&self) -> &axum::http::HeaderMap {
        axum::extract::Request::headers(self)
    }
    fn extensions(&self) -> &axum::http::Extensions {
        axum::extract::Request::extensions(self)
    }
}

/// Client IP: the peer address from `ConnectInfo`, else the first
/// `X-Forwarded-For` entry. `None` when neither is available.
pub fn extract_client_ip<T: HasHeadersAndExtensions>(source: &T) -> Option<String> {
    if let Some(ci) = source.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(ci.0.ip().to_string());
    }

    source
        .headers()
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}
