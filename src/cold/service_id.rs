//! Tenant resolution for cold reads

/// Service ID used when the deployment is single-tenant
pub const DEFAULT_SERVICE_ID: &str = "default";

/// Resolves the service (tenant) whose cold catalog a read should consult
pub trait ServiceIdProvider: Send + Sync {
    fn current_service_id(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultServiceIdProvider;

impl ServiceIdProvider for DefaultServiceIdProvider {
    fn current_service_id(&self) -> String {
        DEFAULT_SERVICE_ID.to_string()
    }
}

/// Always resolves to one configured service
#[derive(Debug, Clone)]
pub struct FixedServiceIdProvider(pub String);

impl ServiceIdProvider for FixedServiceIdProvider {
    fn current_service_id(&self) -> String {
        self.0.clone()
    }
}
