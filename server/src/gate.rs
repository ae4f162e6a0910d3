//! Request gate: evaluates route-declared policies before any handler runs.
//!
//! Policies are attached to routes as metadata via [`PolicyLayer`]; the gate
//! reads the [`Principal`] a preceding session middleware placed in request
//! extensions and asks the policy engine for a decision. Denials are answered
//! right here — handlers are unreachable on deny. The gate itself performs no
//! writes, so an aborted request leaves nothing to unwind.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{
    Json,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use platform_authz::{Decision, Denial, DenyReason, Policy, Principal, evaluate};
use serde::Serialize;
use tower::{Layer, Service};

/// Route metadata: the policies a matched route requires, in evaluation
/// order. Constructed once at router build time.
#[derive(Copy, Clone, Debug)]
pub struct PolicyLayer {
    policies: &'static [Policy],
}

impl PolicyLayer {
    pub fn new(policies: &'static [Policy]) -> Self {
        Self { policies }
    }
}

impl<S> Layer<S> for PolicyLayer {
    type Service = PolicyGate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PolicyGate {
            inner,
            policies: self.policies,
        }
    }
}

#[derive(Clone)]
pub struct PolicyGate<S> {
    inner: S,
    policies: &'static [Policy],
}

impl<S> Service<Request<Body>> for PolicyGate<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Take the service that was polled ready, leave a clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let policies = self.policies;
        Box::pin(async move {
            let principal = req.extensions().get::<Principal>().cloned();
            match check(principal.as_ref(), policies, req.method()) {
                Decision::Allow => inner.call(req).await,
                Decision::Deny(denial) => Ok(deny_response(&req, denial)),
            }
        })
    }
}

/// Evaluate the declared policies in order, stopping at the first deny.
///
/// The `write` policy gates mutations only: it is skipped for safe methods,
/// so a view-only principal can still read a resource whose mutating verbs
/// are write-gated. Role policies apply to every method.
fn check(principal: Option<&Principal>, policies: &[Policy], method: &Method) -> Decision {
    let safe_method = matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);
    for &policy in policies {
        if policy == Policy::Write && safe_method {
            continue;
        }
        if let Decision::Deny(denial) = evaluate(principal, policy) {
            return Decision::Deny(denial);
        }
    }
    Decision::Allow
}

#[derive(Serialize)]
struct DenialBody {
    message: &'static str,
    error: &'static str,
}

const FORBIDDEN_PAGE: &str = "<!doctype html>\
<html><head><title>403 Forbidden</title></head>\
<body><h1>403 Forbidden</h1>\
<p>You do not have permission to access this page.</p></body></html>";

/// Machine clients get the structured denial; browser navigations get a
/// login redirect (unauthenticated) or a forbidden page.
fn deny_response(req: &Request<Body>, denial: Denial) -> Response {
    if wants_json(req) {
        let status = match denial.reason {
            DenyReason::Unauthenticated => StatusCode::UNAUTHORIZED,
            _ => StatusCode::FORBIDDEN,
        };
        let body = DenialBody {
            message: denial.message(),
            error: denial.reason.code(),
        };
        (status, Json(body)).into_response()
    } else if denial.reason == DenyReason::Unauthenticated {
        Redirect::to("/login").into_response()
    } else {
        (StatusCode::FORBIDDEN, Html(FORBIDDEN_PAGE)).into_response()
    }
}

fn wants_json(req: &Request<Body>) -> bool {
    if req.uri().path().starts_with("/api/") {
        return true;
    }
    req.headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("application/json") || accept.contains("+json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_authz::{PermissionLevel, Role};
    use uuid::Uuid;

    fn principal(role: Role, permission_level: PermissionLevel) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role,
            permission_level,
        }
    }

    #[test]
    fn write_policy_is_skipped_for_safe_methods() {
        let viewer = principal(Role::User, PermissionLevel::View);
        let policies = [Policy::None, Policy::Write];
        assert!(check(Some(&viewer), &policies, &Method::GET).is_allowed());
        assert!(check(Some(&viewer), &policies, &Method::HEAD).is_allowed());
        assert!(!check(Some(&viewer), &policies, &Method::POST).is_allowed());
        assert!(!check(Some(&viewer), &policies, &Method::PUT).is_allowed());
        assert!(!check(Some(&viewer), &policies, &Method::DELETE).is_allowed());
    }

    #[test]
    fn role_policies_apply_to_reads() {
        let user = principal(Role::User, PermissionLevel::Edit);
        let denial = check(Some(&user), &[Policy::None, Policy::Supervisor], &Method::GET)
            .denial()
            .unwrap();
        assert_eq!(denial.reason, DenyReason::InsufficientRole);
    }

    #[test]
    fn unauthenticated_get_is_denied_even_when_write_is_skipped() {
        let denial = check(None, &[Policy::None, Policy::Write], &Method::GET)
            .denial()
            .unwrap();
        assert_eq!(denial.reason, DenyReason::Unauthenticated);
    }

    #[test]
    fn first_failing_policy_wins() {
        let supervisor = principal(Role::Supervisor, PermissionLevel::Edit);
        let denial = check(
            Some(&supervisor),
            &[Policy::Admin, Policy::Write],
            &Method::POST,
        )
        .denial()
        .unwrap();
        assert_eq!(denial.reason, DenyReason::InsufficientRole);
        assert_eq!(denial.policy, Policy::Admin);
    }
}
