//! Effective schema of a route.

use crate::route::Route;
use tessera_core::schema::SchemaSet;

/// Folds every schema contribution of `route` into one set.
///
/// Named request interceptors contribute first, then named guards, then the
/// route itself. Bare callables contribute nothing. On conflict the earlier
/// contribution wins.
#[must_use]
pub fn aggregate_schema(route: &Route) -> SchemaSet {
    let interceptors = route
        .request_interceptors
        .iter()
        .filter_map(|step| step.schema());
    let guards = route.guards.iter().filter_map(|step| step.schema());

    SchemaSet::aggregate(
        interceptors
            .chain(guards)
            .chain(std::iter::once(&route.schema)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::guard_fn;
    use crate::interceptor::interceptor_fn;
    use crate::step::Named;
    use http::Method;
    use tessera_core::schema::{BodySchema, BodyType, FieldRule, FieldSchema, Validator};
    use tessera_core::Request;

    fn route() -> Route {
        Route::builder(Method::POST, "/orders")
            .headers(FieldSchema::new().present("x-trace").present("x-auth"))
            .body(BodySchema::object().field("total", BodyType::Number))
            .request_interceptor(
                Named::request_interceptor("tenant", interceptor_fn(|_: &Request, _| async {}))
                    .headers(FieldSchema::new().field("x-auth", Validator::non_empty()))
                    .body(BodySchema::object().field("total", BodyType::String)),
            )
            .request_interceptor(interceptor_fn(|_: &Request, _| async {}))
            .guard(
                Named::guard("auth", guard_fn(|_: &Request, _| async { true }))
                    .headers(FieldSchema::new().field("x-auth", Validator::integer()))
                    .cookies(FieldSchema::new().present("session")),
            )
            .build()
    }

    #[test]
    fn test_earlier_contribution_wins() {
        let effective = aggregate_schema(&route());
        let headers = effective.headers.as_ref().unwrap();
        assert!(matches!(headers.get("x-auth"), Some(FieldRule::Check(v)) if v.describe() == Validator::non_empty().describe()));
        assert!(matches!(headers.get("x-trace"), Some(FieldRule::Present)));
        assert!(effective.cookies.as_ref().unwrap().get("session").is_some());

        let body = effective.body.as_ref().unwrap();
        assert!(body.validate(&serde_json::json!({"total": "12"}), false).is_ok());
        assert!(body.validate(&serde_json::json!({"total": 12}), false).is_err());
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let route = route();
        let first = aggregate_schema(&route).describe();
        let second = aggregate_schema(&route).describe();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bare_steps_contribute_nothing() {
        let route = Route::builder(Method::GET, "/")
            .guard(guard_fn(|_: &Request, _| async { true }))
            .build();
        let effective = aggregate_schema(&route);
        assert!(effective.headers.is_none());
        assert!(!effective.expects_body());
    }
}
