// Manifest validation module
// Structural checks over builds and routes

use hyper::Method;

use super::types::{BuildDescriptor, Manifest, RouteRule};
use crate::routing::anchor_pattern;

/// Collect every structural issue in the manifest
pub fn collect_issues(manifest: &Manifest) -> Vec<String> {
    let mut issues = Vec::new();

    if manifest.builds.is_empty() {
        issues.push("builds must contain at least one entry".to_string());
    }
    for (index, build) in manifest.builds.iter().enumerate() {
        check_build(index, build, &mut issues);
    }

    if manifest.routes.is_empty() {
        issues.push("routes must contain at least one entry".to_string());
    }
    for (index, route) in manifest.routes.iter().enumerate() {
        check_route(index, route, &mut issues);
    }

    issues
}

fn check_build(index: usize, build: &BuildDescriptor, issues: &mut Vec<String>) {
    if build.src.trim().is_empty() {
        issues.push(format!("builds[{index}].src is empty"));
    }
    if build.builder.trim().is_empty() {
        issues.push(format!("builds[{index}].use is empty"));
    }
}

fn check_route(index: usize, route: &RouteRule, issues: &mut Vec<String>) {
    if route.src.is_empty() {
        issues.push(format!("routes[{index}].src is empty"));
    } else if let Err(e) = regex::Regex::new(&anchor_pattern(&route.src)) {
        issues.push(format!(
            "routes[{index}].src '{}' is not a valid pattern: {e}",
            route.src
        ));
    }

    if route.dest.trim().is_empty() {
        issues.push(format!("routes[{index}].dest is empty"));
    }

    if let Some(methods) = &route.methods {
        if methods.is_empty() {
            issues.push(format!("routes[{index}].methods is empty"));
        }
        for method in methods {
            if Method::from_bytes(method.as_bytes()).is_err() {
                issues.push(format!(
                    "routes[{index}].methods contains invalid method '{method}'"
                ));
            }
        }
    }

    if let Some(status) = route.status {
        if !(100..=599).contains(&status) {
            issues.push(format!("routes[{index}].status {status} is out of range"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_manifest() -> Manifest {
        Manifest {
            builds: vec![BuildDescriptor::new("app.py", "@vercel/python")],
            routes: vec![RouteRule::new("/(.*)", "app.py")],
            ..Manifest::default()
        }
    }

    #[test]
    fn test_valid_manifest_has_no_issues() {
        assert!(collect_issues(&valid_manifest()).is_empty());
    }

    #[test]
    fn test_empty_sections_are_reported() {
        let issues = collect_issues(&Manifest::default());
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("builds"));
        assert!(issues[1].contains("routes"));
    }

    #[test]
    fn test_all_issues_are_collected() {
        let mut manifest = valid_manifest();
        manifest.builds.push(BuildDescriptor::new("", " "));
        manifest.routes.push(RouteRule {
            methods: Some(vec!["GET".to_string(), "BAD METHOD".to_string()]),
            status: Some(99),
            ..RouteRule::new("/(unclosed", "")
        });

        let issues = collect_issues(&manifest);
        assert_eq!(issues.len(), 6, "{issues:?}");
        assert!(issues.iter().any(|i| i == "builds[1].src is empty"));
        assert!(issues.iter().any(|i| i == "builds[1].use is empty"));
        assert!(issues.iter().any(|i| i.starts_with("routes[1].src")));
        assert!(issues.iter().any(|i| i == "routes[1].dest is empty"));
        assert!(issues.iter().any(|i| i.contains("'BAD METHOD'")));
        assert!(issues.iter().any(|i| i.contains("status 99")));
    }

    #[test]
    fn test_validate_error_lists_issues() {
        let err = Manifest::default().validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("builds must contain at least one entry"));
        assert!(message.contains("routes must contain at least one entry"));
    }
}
