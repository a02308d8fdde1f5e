// packages/interceptor/src/interception/matcher.rs
//! Match evaluator
//!
//! Decides, without I/O or state, whether an outbound request is rerouted
//! through the proxy. Checks run in a fixed order and the first that applies
//! decides:
//!
//! 1. Path starts with `/proxy`: never rerouted. Keeps proxied requests from
//!    being intercepted a second time.
//! 2. Host is the proxy's own host: never rerouted.
//! 3. Host contains an allow-listed fragment: rerouted.

use crate::interception::allow_list::DomainAllowList;
use crate::interception::origin::{ProxyOrigin, PROXY_PATH};
use crate::interception::request::InterceptedRequest;
use crate::interception::rewriter::{self, ProxiedRequest};

/// Outcome of evaluating one request
#[derive(Debug, Clone)]
pub enum InterceptionDecision {
    /// Let the request reach the network unchanged
    PassThrough,
    /// Issue this request instead of the original
    Redirect(ProxiedRequest),
}

impl InterceptionDecision {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect(_))
    }
}

/// Allow-list fragment that makes `request` eligible for rerouting, if any
pub fn matching_fragment<'a>(
    request: &InterceptedRequest,
    allow_list: &'a DomainAllowList,
    proxy_origin: &ProxyOrigin,
) -> Option<&'a str> {
    if request.path().starts_with(PROXY_PATH) {
        return None;
    }

    let host = request.host()?;
    if host == proxy_origin.host() {
        return None;
    }

    allow_list.find_match(host)
}

pub fn should_redirect(
    request: &InterceptedRequest,
    allow_list: &DomainAllowList,
    proxy_origin: &ProxyOrigin,
) -> bool {
    matching_fragment(request, allow_list, proxy_origin).is_some()
}

/// Evaluate `request` and build the proxied request when it matches
pub fn evaluate(
    request: &InterceptedRequest,
    allow_list: &DomainAllowList,
    proxy_origin: &ProxyOrigin,
) -> InterceptionDecision {
    if should_redirect(request, allow_list, proxy_origin) {
        InterceptionDecision::Redirect(rewriter::rewrite(request, proxy_origin))
    } else {
        InterceptionDecision::PassThrough
    }
}

/// Evaluate a raw URL; anything unparseable passes through
pub fn evaluate_url(
    method: hyper::Method,
    raw_url: &str,
    allow_list: &DomainAllowList,
    proxy_origin: &ProxyOrigin,
) -> InterceptionDecision {
    match InterceptedRequest::parse(method, raw_url) {
        Ok(request) => evaluate(&request, allow_list, proxy_origin),
        Err(_) => InterceptionDecision::PassThrough,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::DEFAULT_DOMAINS;
    use hyper::Method;

    fn setup() -> (DomainAllowList, ProxyOrigin) {
        (
            DomainAllowList::new(DEFAULT_DOMAINS).unwrap(),
            ProxyOrigin::parse("https://myproxy.example").unwrap(),
        )
    }

    fn get(url: &str) -> InterceptedRequest {
        InterceptedRequest::parse(Method::GET, url).unwrap()
    }

    #[test]
    fn test_redirects_listed_domain() {
        let (list, origin) = setup();

        match evaluate(&get("https://www.netflix.com/title/123"), &list, &origin) {
            InterceptionDecision::Redirect(proxied) => assert_eq!(
                proxied.target().as_str(),
                "https://myproxy.example/proxy?url=https%3A%2F%2Fwww.netflix.com%2Ftitle%2F123"
            ),
            InterceptionDecision::PassThrough => panic!("expected redirect"),
        }
    }

    #[test]
    fn test_proxy_path_passes_through() {
        let (list, origin) = setup();

        let req = get("https://myproxy.example/proxy?url=https%3A%2F%2Fwww.netflix.com");
        assert!(!should_redirect(&req, &list, &origin));

        // Loop prevention applies regardless of host
        let req = get("https://www.netflix.com/proxy/anything");
        assert!(!should_redirect(&req, &list, &origin));
    }

    #[test]
    fn test_unlisted_domain_passes_through() {
        let (list, origin) = setup();
        assert!(!evaluate(&get("https://example.org/page"), &list, &origin).is_redirect());
    }

    #[test]
    fn test_substring_match_on_cdn() {
        let (list, origin) = setup();
        assert!(should_redirect(&get("https://cdn.nflximg.net/img.png"), &list, &origin));
        assert_eq!(
            matching_fragment(&get("https://cdn.nflximg.net/img.png"), &list, &origin),
            Some("nflximg.net")
        );
    }

    #[test]
    fn test_proxy_host_passes_through() {
        // Origin name contains an allow-listed fragment
        let list = DomainAllowList::new(DEFAULT_DOMAINS).unwrap();
        let origin = ProxyOrigin::parse("http://netflix.com.local:5000").unwrap();

        let same_port = get("http://netflix.com.local:5000/browse");
        assert!(!should_redirect(&same_port, &list, &origin));

        // Port does not matter, only the host
        let other_port = get("https://netflix.com.local/browse");
        assert!(!should_redirect(&other_port, &list, &origin));
    }

    #[test]
    fn test_over_permissive_match_is_preserved() {
        let (list, origin) = setup();
        for host in ["evil-netflix.com.example.org", "notnetflix.com.attacker.net"] {
            let req = get(&format!("https://{}/", host));
            assert!(should_redirect(&req, &list, &origin));
        }
    }

    #[test]
    fn test_redirect_is_not_redirected_again() {
        let (list, origin) = setup();

        let decision = evaluate(&get("https://www.netflix.com/title/123"), &list, &origin);
        let InterceptionDecision::Redirect(proxied) = decision else {
            panic!("expected redirect");
        };

        let second = evaluate(&proxied.to_intercepted(), &list, &origin);
        assert!(!second.is_redirect());
    }

    #[test]
    fn test_hostless_and_malformed_urls_pass_through() {
        let (list, origin) = setup();

        for raw in [
            "data:text/plain,netflix.com",
            "not a url",
            "/relative/netflix.com",
        ] {
            assert!(!evaluate_url(Method::GET, raw, &list, &origin).is_redirect());
        }
    }
}
