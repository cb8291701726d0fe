use axum::http::Method;
use tracing::{debug, warn};

use crate::pattern::PathPattern;

/// Documentation paths added to the public GET bucket when OpenAPI is exposed.
pub const OPENAPI_PATHS: [&str; 2] = ["/swagger-ui**/**", "/v3/api-docs**/**"];

/// RouteRegistration
///
/// One row of the declarative route table: the verb, the path pattern the route
/// was registered under, and whether it may be called without credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRegistration {
    pub method: Method,
    pub path: String,
    pub public: bool,
}

impl RouteRegistration {
    pub fn new(method: Method, path: impl Into<String>, public: bool) -> Self {
        Self {
            method,
            path: path.into(),
            public,
        }
    }
}

/// PublicEndpoints
///
/// The allow-list of public path patterns, bucketed per verb.
/// Only GET, POST, PUT and DELETE have buckets; every other verb is always secured.
#[derive(Debug, Default)]
struct PublicEndpoints {
    get: Vec<PathPattern>,
    post: Vec<PathPattern>,
    put: Vec<PathPattern>,
    delete: Vec<PathPattern>,
}

impl PublicEndpoints {
    fn bucket(&self, method: &Method) -> &[PathPattern] {
        if method == Method::GET {
            &self.get
        } else if method == Method::POST {
            &self.post
        } else if method == Method::PUT {
            &self.put
        } else if method == Method::DELETE {
            &self.delete
        } else {
            &[]
        }
    }

    fn bucket_mut(&mut self, method: &Method) -> Option<&mut Vec<PathPattern>> {
        if method == Method::GET {
            Some(&mut self.get)
        } else if method == Method::POST {
            Some(&mut self.post)
        } else if method == Method::PUT {
            Some(&mut self.put)
        } else if method == Method::DELETE {
            Some(&mut self.delete)
        } else {
            None
        }
    }

    fn insert(&mut self, method: &Method, path: &str) {
        let Some(bucket) = self.bucket_mut(method) else {
            warn!(%method, path, "Route is marked public but its verb cannot be public; it stays secured");
            return;
        };

        match PathPattern::new(path) {
            Ok(pattern) => bucket.push(pattern),
            Err(err) => warn!(%method, path, error = %err, "Skipping public route with an invalid path pattern"),
        }
    }
}

/// EndpointClassifier
///
/// Decides whether an incoming request targets a public endpoint.
///
/// Built exactly once by the composition root from the route table, before the
/// listener accepts traffic. There is no way to mutate it afterwards, so it is
/// shared behind an `Arc` and read without locking.
#[derive(Debug)]
pub struct EndpointClassifier {
    endpoints: PublicEndpoints,
}

impl EndpointClassifier {
    /// initialize
    ///
    /// Scans every route registration and records the public ones in the bucket of
    /// their verb. When `openapi_enabled` is set, the Swagger UI and OpenAPI JSON
    /// paths are also made public for GET.
    pub fn initialize<'a, I>(routes: I, openapi_enabled: bool) -> Self
    where
        I: IntoIterator<Item = &'a RouteRegistration>,
    {
        let mut endpoints = PublicEndpoints::default();

        for route in routes.into_iter().filter(|route| route.public) {
            endpoints.insert(&route.method, &route.path);
        }

        if openapi_enabled {
            for path in OPENAPI_PATHS {
                endpoints.insert(&Method::GET, path);
            }
        }

        let classifier = Self { endpoints };
        for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
            let patterns: Vec<&str> = classifier.public_patterns(&method).collect();
            debug!(%method, ?patterns, "Public endpoints registered");
        }

        classifier
    }

    pub fn is_public(&self, method: &Method, path: &str) -> bool {
        self.endpoints
            .bucket(method)
            .iter()
            .any(|pattern| pattern.matches(path))
    }

    /// The public patterns recorded for `method`, in registration order.
    pub fn public_patterns(&self, method: &Method) -> impl Iterator<Item = &str> {
        self.endpoints.bucket(method).iter().map(PathPattern::as_str)
    }
}
