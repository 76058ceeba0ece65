//! Route matching module
//!
//! Compiles manifest route records into anchored regular expressions and
//! resolves request paths against them in declaration order.

use regex::Regex;
use std::collections::BTreeMap;

use crate::manifest::RouteRule;

/// Route pattern compile failure
#[derive(Debug, thiserror::Error)]
#[error("route {index} has invalid pattern '{pattern}': {source}")]
pub struct RouteError {
    pub index: usize,
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Anchor a route pattern so it must match the whole path
///
/// Patterns that already carry `^` or `$` are left as written.
pub fn anchor_pattern(src: &str) -> String {
    if src.starts_with('^') || src.ends_with('$') {
        src.to_string()
    } else {
        format!("^(?:{src})$")
    }
}

#[derive(Debug)]
struct CompiledRoute {
    regex: Regex,
    rule: RouteRule,
}

impl CompiledRoute {
    fn allows(&self, method: &str) -> bool {
        self.rule
            .methods
            .as_ref()
            .is_none_or(|methods| methods.iter().any(|m| m.eq_ignore_ascii_case(method)))
    }
}

/// Outcome of a successful route lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Position of the matching rule in the manifest
    pub index: usize,
    /// Destination with capture references expanded
    pub dest: String,
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
}

/// Ordered, compiled routing table
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn compile(rules: &[RouteRule]) -> Result<Self, RouteError> {
        let routes = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                Regex::new(&anchor_pattern(&rule.src))
                    .map(|regex| CompiledRoute {
                        regex,
                        rule: rule.clone(),
                    })
                    .map_err(|source| RouteError {
                        index,
                        pattern: rule.src.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { routes })
    }

    /// Find the first route matching `path` that accepts `method`
    pub fn resolve(&self, method: &str, path: &str) -> Option<Resolved> {
        self.routes.iter().enumerate().find_map(|(index, route)| {
            if !route.allows(method) {
                return None;
            }
            let captures = route.regex.captures(path)?;
            let mut dest = String::new();
            captures.expand(&route.rule.dest, &mut dest);

            Some(Resolved {
                index,
                dest,
                status: route.rule.status,
                headers: route.rule.headers.clone().unwrap_or_default(),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rules: Vec<RouteRule>) -> RouteTable {
        RouteTable::compile(&rules).unwrap()
    }

    #[test]
    fn test_catch_all_matches_every_path() {
        let routes = table(vec![RouteRule::new("/(.*)", "app.py")]);
        for path in ["/", "/foo", "/foo/bar"] {
            let resolved = routes.resolve("GET", path).unwrap();
            assert_eq!(resolved.dest, "app.py", "path {path}");
            assert_eq!(resolved.index, 0);
        }
    }

    #[test]
    fn test_anchor_pattern() {
        assert_eq!(anchor_pattern("/(.*)"), "^(?:/(.*))$");
        assert_eq!(anchor_pattern("^/api"), "^/api");
        assert_eq!(anchor_pattern("/static/.*$"), "/static/.*$");
    }

    #[test]
    fn test_patterns_match_whole_path() {
        let routes = table(vec![RouteRule::new("/about", "about.html")]);
        assert!(routes.resolve("GET", "/about").is_some());
        assert!(routes.resolve("GET", "/about/team").is_none());
        assert!(routes.resolve("GET", "/x/about").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let routes = table(vec![
            RouteRule::new("/api/v1/(.*)", "v1.py"),
            RouteRule::new("/api/(.*)", "api.py"),
            RouteRule::new("/(.*)", "app.py"),
        ]);
        assert_eq!(routes.resolve("GET", "/api/v1/users").unwrap().dest, "v1.py");
        assert_eq!(routes.resolve("GET", "/api/v2/users").unwrap().dest, "api.py");
        let fallback = routes.resolve("GET", "/index.html").unwrap();
        assert_eq!(fallback.dest, "app.py");
        assert_eq!(fallback.index, 2);
    }

    #[test]
    fn test_capture_expansion() {
        let routes = table(vec![
            RouteRule::new("/static/(.*)", "/public/$1"),
            RouteRule::new("/user/(?P<name>[^/]+)", "profile.py?user=${name}"),
        ]);
        assert_eq!(
            routes.resolve("GET", "/static/css/site.css").unwrap().dest,
            "/public/css/site.css"
        );
        assert_eq!(
            routes.resolve("GET", "/user/kelsier").unwrap().dest,
            "profile.py?user=kelsier"
        );
    }

    #[test]
    fn test_method_filter() {
        let routes = table(vec![
            RouteRule {
                methods: Some(vec!["post".to_string()]),
                ..RouteRule::new("/upload", "upload.py")
            },
            RouteRule::new("/(.*)", "app.py"),
        ]);
        assert_eq!(routes.resolve("POST", "/upload").unwrap().dest, "upload.py");
        assert_eq!(routes.resolve("GET", "/upload").unwrap().dest, "app.py");
    }

    #[test]
    fn test_status_and_headers_are_carried() {
        let mut headers = BTreeMap::new();
        headers.insert("Location".to_string(), "/new".to_string());
        let routes = table(vec![RouteRule {
            status: Some(308),
            headers: Some(headers),
            ..RouteRule::new("/old", "/new")
        }]);
        let resolved = routes.resolve("GET", "/old").unwrap();
        assert_eq!(resolved.status, Some(308));
        assert_eq!(resolved.headers.get("Location").unwrap(), "/new");
    }

    #[test]
    fn test_invalid_pattern_reports_index() {
        let err = RouteTable::compile(&[
            RouteRule::new("/(.*)", "app.py"),
            RouteRule::new("/(broken", "app.py"),
        ])
        .unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.pattern, "/(broken");
    }

    #[test]
    fn test_no_routes_resolves_nothing() {
        let routes = table(vec![]);
        assert!(routes.is_empty());
        assert!(routes.resolve("GET", "/").is_none());
    }
}
