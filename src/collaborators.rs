//! Extension points consulted by the server and by [`Context`](crate::Context).
//!
//! Every trait has a no-op implementation for `()`, which is what a
//! [`ServerBuilder`](crate::ServerBuilder) uses until told otherwise.

use crate::{Method, StatusCode};
use std::{collections::HashMap, hash::BuildHasher};

/// Decides whether a connection may proceed once its request is parsed.
///
/// A denied connection is logged and closed without a response.
///
/// # Examples
/// ```
/// use handoff_web::AccessControl;
///
/// struct Blacklist(Vec<&'static str>);
///
/// impl AccessControl for Blacklist {
///     fn permit(&self, address: &str) -> bool {
///         !self.0.contains(&address)
///     }
/// }
///
/// let filter = Blacklist(vec!["192.0.2.1", "10.0.0.1"]);
/// assert!(filter.permit("127.0.0.1"));
/// assert!(!filter.permit("10.0.0.1"));
/// ```
pub trait AccessControl: Sync + Send + 'static {
    /// `address` is the remote address without the port.
    fn permit(&self, address: &str) -> bool;
}

impl AccessControl for () {
    #[inline(always)]
    fn permit(&self, _: &str) -> bool {
        true
    }
}

/// Receives the size of every successful write on a [`Response`](crate::Response).
pub trait Statistics: Sync + Send + 'static {
    fn record_bytes_sent(&self, bytes: u64);
}

impl Statistics for () {
    #[inline(always)]
    fn record_bytes_sent(&self, _: u64) {}
}

/// Supplies bodies for the canned error responses.
///
/// Returning `None` falls back to the built-in page (JSON or empty,
/// depending on `json_errors`).
pub trait DefaultPages: Sync + Send + 'static {
    /// Returns `(content_type, body)` for `status`.
    fn default_page(&self, status: StatusCode) -> Option<(String, Vec<u8>)>;
}

impl DefaultPages for () {
    #[inline(always)]
    fn default_page(&self, _: StatusCode) -> Option<(String, Vec<u8>)> {
        None
    }
}

/// Maps a method and an URL path to a handler of the consumer's choosing.
///
/// The server never dispatches on its own; see [`Context::route`](crate::Context::route).
///
/// # Examples
/// ```
/// use handoff_web::{Method, RouteTable};
/// use std::collections::HashMap;
///
/// let mut routes = HashMap::new();
/// routes.insert((Method::Get, "/health".to_string()), "health");
///
/// assert_eq!(routes.match_route(Method::Get, "/health"), Some(&"health"));
/// assert_eq!(routes.match_route(Method::Post, "/health"), None);
/// ```
pub trait RouteTable {
    type Handler;

    fn match_route(&self, method: Method, path: &str) -> Option<&Self::Handler>;
}

impl<H, S: BuildHasher> RouteTable for HashMap<(Method, String), H, S> {
    type Handler = H;

    #[inline]
    fn match_route(&self, method: Method, path: &str) -> Option<&H> {
        self.get(&(method, path.to_string()))
    }
}

impl<'a, H> RouteTable for [(Method, &'a str, H)] {
    type Handler = H;

    #[inline]
    fn match_route(&self, method: Method, path: &str) -> Option<&H> {
        self.iter()
            .find(|(m, p, _)| *m == method && *p == path)
            .map(|(_, _, handler)| handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_defaults() {
        assert!(().permit("203.0.113.7"));
        assert!(().permit(""));
        assert_eq!(().default_page(StatusCode::BadRequest), None);
        ().record_bytes_sent(42);
    }

    #[test]
    fn slice_routes() {
        #[rustfmt::skip]
        let routes: &[(Method, &str, u8)] = &[
            (Method::Get,  "/",      0),
            (Method::Get,  "/users", 1),
            (Method::Post, "/users", 2),
        ];

        #[rustfmt::skip]
        let cases = [
            (Method::Get,    "/",       Some(&0)),
            (Method::Get,    "/users",  Some(&1)),
            (Method::Post,   "/users",  Some(&2)),
            (Method::Delete, "/users",  None),
            (Method::Get,    "/users/", None),
        ];

        for (method, path, expected) in cases {
            assert_eq!(routes.match_route(method, path), expected, "{method} {path}");
        }
    }
}
