//! Method registry: the dispatch surface of a service.
//!
//! Methods are contributed during an explicit initialization phase through
//! [`MethodRegistryBuilder`]; `build()` freezes them into an immutable
//! [`MethodRegistry`] that the dispatcher reads for the life of the process.
//! Any module can contribute methods before the connection opens; after that
//! the table never changes.

use crate::error::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a method invocation; the `Ok` value is serialized as the
/// reply's `result`.
pub type MethodResult = Result<Value>;

/// A registered method: context plus call params in, result out.
pub type MethodHandler = Arc<dyn Fn(ApiContext, Value) -> BoxFuture<'static, MethodResult> + Send + Sync>;

/// Context handed to every method as its first argument.
#[derive(Clone)]
pub struct ApiContext {
    service: Arc<str>,
    methods: Arc<[String]>,
}

impl ApiContext {
    pub(crate) fn new(service: Arc<str>, methods: Arc<[String]>) -> Self {
        Self { service, methods }
    }

    /// Name of the service this method is running in.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Names of every method registered on this service, sorted.
    pub fn method_names(&self) -> &[String] {
        &self.methods
    }
}

// ## Methods for diagnostic purposes ##

async fn ping(ctx: ApiContext, _params: Value) -> MethodResult {
    Ok(json!({ "message": "pong", "service": ctx.service() }))
}

async fn test(ctx: ApiContext, _params: Value) -> MethodResult {
    Ok(json!({ "method": "test", "service": ctx.service() }))
}

async fn help(ctx: ApiContext, _params: Value) -> MethodResult {
    Ok(json!({ "methods": ctx.method_names() }))
}

/// Mutable method table used during process startup.
#[derive(Default)]
pub struct MethodRegistryBuilder {
    methods: HashMap<String, MethodHandler>,
}

impl MethodRegistryBuilder {
    /// Builder pre-loaded with the built-in diagnostic methods (`ping`,
    /// `test`, `help`).
    pub fn new() -> Self {
        Self::empty()
            .register("ping", ping)
            .register("test", test)
            .register("help", help)
    }

    /// Builder with no methods at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a method. Re-registering a name silently overwrites the previous
    /// entry (last writer wins); callers must avoid accidental collisions.
    pub fn register<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ApiContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        let name = name.into();
        let boxed: MethodHandler = Arc::new(move |ctx, params| handler(ctx, params).boxed());
        if self.methods.insert(name.clone(), boxed).is_some() {
            debug!(method = %name, "overwriting existing method registration");
        }
        self
    }

    /// Freeze the table.
    pub fn build(self) -> MethodRegistry {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        MethodRegistry {
            methods: self.methods,
            names: names.into(),
        }
    }
}

/// Immutable method table handed to the dispatcher.
#[derive(Clone)]
pub struct MethodRegistry {
    methods: HashMap<String, MethodHandler>,
    names: Arc<[String]>,
}

impl MethodRegistry {
    /// Look up a method by name. A failed lookup has no side effects.
    pub fn lookup(&self, name: &str) -> Option<MethodHandler> {
        self.methods.get(name).cloned()
    }

    /// Sorted names of every registered method.
    pub fn method_names(&self) -> Arc<[String]> {
        self.names.clone()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_for(registry: &MethodRegistry, service: &str) -> ApiContext {
        ApiContext::new(Arc::from(service), registry.method_names())
    }

    #[tokio::test]
    async fn test_builtin_ping() {
        let registry = MethodRegistryBuilder::new().build();
        let handler = registry.lookup("ping").unwrap();

        let result = handler(ctx_for(&registry, "login"), json!({})).await.unwrap();
        assert_eq!(result, json!({"message": "pong", "service": "login"}));
    }

    #[tokio::test]
    async fn test_builtin_help_lists_methods() {
        let registry = MethodRegistryBuilder::new()
            .register("get_user", |_ctx, _params| async { Ok(Value::Null) })
            .build();
        let handler = registry.lookup("help").unwrap();

        let result = handler(ctx_for(&registry, "login"), json!({})).await.unwrap();
        assert_eq!(
            result,
            json!({"methods": ["get_user", "help", "ping", "test"]})
        );
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let registry = MethodRegistryBuilder::empty()
            .register("version", |_ctx, _params| async { Ok(json!(1)) })
            .register("version", |_ctx, _params| async { Ok(json!(2)) })
            .build();
        assert_eq!(registry.len(), 1);

        let handler = registry.lookup("version").unwrap();
        let result = handler(ctx_for(&registry, "svc"), json!({})).await.unwrap();
        assert_eq!(result, json!(2));
    }

    #[test]
    fn test_lookup_miss_does_not_mutate() {
        let registry = MethodRegistryBuilder::new().build();
        let before = registry.len();
        assert!(registry.lookup("no_such_method").is_none());
        assert_eq!(registry.len(), before);
    }
}
