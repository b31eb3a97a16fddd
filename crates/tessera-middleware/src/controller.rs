//! Controllers share interceptors, guards and schemas across routes.

use crate::guard::GuardStep;
use crate::interceptor::{RequestInterceptorStep, ResponseInterceptorStep};
use crate::route::Route;
use tessera_core::di::Binding;
use tessera_core::schema::{BodySchema, FieldSchema, SchemaSet};

/// A group of shared route settings.
///
/// [`Controller::apply_to_route`] prepends the controller's steps to the
/// route's and fills in schemas the route leaves out. Where both declare
/// the same field, the route's declaration is kept.
///
/// # Example
///
/// ```
/// use tessera_middleware::{guard_fn, Controller, Route, Services};
/// use tessera_core::schema::FieldSchema;
/// use tessera_core::Request;
/// use http::Method;
///
/// let admin = Controller::new()
///     .headers(FieldSchema::new().present("authorization"))
///     .guard(guard_fn(|req: &Request, _: Services| {
///         let ok = req.header("authorization").is_some();
///         async move { ok }
///     }));
///
/// let route = admin.apply_to_route(Route::builder(Method::DELETE, "/users/:id").build());
/// assert_eq!(route.guards().len(), 1);
/// assert!(route.schema().headers.is_some());
/// ```
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Controller {
    schema: SchemaSet,
    request_interceptors: Vec<RequestInterceptorStep>,
    response_interceptors: Vec<ResponseInterceptorStep>,
    guards: Vec<GuardStep>,
}

impl Controller {
    /// Creates an empty controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a body schema.
    pub fn body(mut self, body: BodySchema) -> Self {
        self.schema.body = Some(body);
        self
    }

    /// Declares a header schema.
    pub fn headers(mut self, headers: FieldSchema) -> Self {
        self.schema.headers = Some(headers);
        self
    }

    /// Declares a cookie schema.
    pub fn cookies(mut self, cookies: FieldSchema) -> Self {
        self.schema.cookies = Some(cookies);
        self
    }

    /// Declares a URL parameter schema.
    pub fn url_params(mut self, url_params: FieldSchema) -> Self {
        self.schema.url_params = Some(url_params);
        self
    }

    /// Declares a query parameter schema.
    pub fn query_params(mut self, query_params: FieldSchema) -> Self {
        self.schema.query_params = Some(query_params);
        self
    }

    /// Adds a binding to every route's scope.
    pub fn register(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.schema.register.insert(name.into(), binding);
        self
    }

    /// Appends a request interceptor.
    pub fn request_interceptor(mut self, interceptor: impl Into<RequestInterceptorStep>) -> Self {
        self.request_interceptors.push(interceptor.into());
        self
    }

    /// Appends a response interceptor.
    pub fn response_interceptor(
        mut self,
        interceptor: impl Into<ResponseInterceptorStep>,
    ) -> Self {
        self.response_interceptors.push(interceptor.into());
        self
    }

    /// Appends a guard.
    pub fn guard(mut self, guard: impl Into<GuardStep>) -> Self {
        self.guards.push(guard.into());
        self
    }

    /// Returns the schema contribution.
    #[must_use]
    pub const fn schema(&self) -> &SchemaSet {
        &self.schema
    }

    /// Applies the controller to a route.
    #[must_use]
    pub fn apply_to_route(&self, mut route: Route) -> Route {
        route.request_interceptors =
            prepend(&self.request_interceptors, route.request_interceptors);
        route.response_interceptors =
            prepend(&self.response_interceptors, route.response_interceptors);
        route.guards = prepend(&self.guards, route.guards);

        let mut schema = self.schema.clone();
        schema.overlay(&route.schema);
        route.schema = schema;
        route
    }

    /// Applies the controller to several routes.
    #[must_use]
    pub fn apply_to_routes<I>(&self, routes: I) -> Vec<Route>
    where
        I: IntoIterator<Item = Route>,
    {
        routes.into_iter().map(|r| self.apply_to_route(r)).collect()
    }
}

fn prepend<T: Clone>(head: &[T], tail: Vec<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(head.len() + tail.len());
    out.extend_from_slice(head);
    out.extend(tail);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::guard_fn;
    use crate::step::Named;
    use http::Method;
    use tessera_core::schema::{FieldRule, Validator};
    use tessera_core::Request;

    #[test]
    fn test_steps_are_prepended() {
        let controller = Controller::new()
            .guard(Named::guard("session", guard_fn(|_: &Request, _| async { true })));
        let route = Route::builder(Method::GET, "/")
            .guard(Named::guard("owner", guard_fn(|_: &Request, _| async { true })))
            .build();

        let route = controller.apply_to_route(route);
        let names: Vec<_> = route.guards().iter().filter_map(|g| g.name()).collect();
        assert_eq!(names, vec!["session", "owner"]);
    }

    #[test]
    fn test_route_declaration_wins() {
        let controller = Controller::new().headers(
            FieldSchema::new()
                .present("x-tenant")
                .field("x-version", Validator::integer()),
        );
        let route = Route::builder(Method::GET, "/")
            .headers(FieldSchema::new().present("x-version"))
            .build();

        let route = controller.apply_to_route(route);
        let headers = route.schema().headers.as_ref().unwrap();
        assert!(matches!(headers.get("x-version"), Some(FieldRule::Present)));
        assert!(headers.get("x-tenant").is_some());
    }

    #[test]
    fn test_controller_fills_missing_categories() {
        let controller = Controller::new()
            .query_params(FieldSchema::new().field("page", Validator::integer().optional()));
        let route = controller.apply_to_route(Route::builder(Method::GET, "/").build());
        assert!(route.schema().query_params.is_some());
        assert!(route.schema().body.is_none());
    }
}
